use log::{debug, error};

use crate::consultation::model::{GroupView, LeftGroup, SentMessage};
use crate::user;

use super::Subject;
use super::model::Notification;
use super::service::EventService;

async fn publish(events: &super::Service, subject: &Subject<'_>, noti: &Notification) {
    if let Err(e) = events.publish(subject, noti).await {
        error!("Failed to publish notification to {subject}: {e}");
    }
}

/// `message:new` goes to every member but the sender, `conversation:updated`
/// to every member.
pub async fn message_sent(events: &super::Service, sent: &SentMessage) {
    let message = sent.message();
    let new_message = Notification::new_message(message);
    let updated = Notification::conversation_updated(message);

    for p in sent.participants() {
        let subject = Subject::Notifications(p.user_id());
        if p.user_id() != message.sender_id() {
            publish(events, &subject, &new_message).await;
        }
        publish(events, &subject, &updated).await;
    }
    debug!(
        "Fanned out message {} to {} participants",
        message.id(),
        sent.participants().len()
    );
}

pub async fn group_created(events: &super::Service, group: &GroupView) {
    let noti = Notification::ConversationCreated(group.clone());

    for p in group.participants() {
        publish(events, &Subject::Notifications(p.user_id()), &noti).await;
    }
}

pub async fn member_left(events: &super::Service, user: &user::Id, left: &LeftGroup) {
    let noti = Notification::member_left(user, left);
    publish(events, &Subject::Conversation(left.conversation_id()), &noti).await;
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::StreamExt;

    use crate::consultation::model::MessageView;
    use crate::conversation::{self, Participant};
    use crate::event::model::NotificationStream;
    use crate::event::service::LocalEventService;
    use crate::event;
    use crate::message::model::{Message, NewMessage};
    use crate::user::Role;

    use super::*;

    async fn next(stream: &mut NotificationStream) -> Option<Notification> {
        tokio::time::timeout(Duration::from_millis(200), stream.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn should_skip_sender_when_fanning_out_message() {
        let events: event::Service = Arc::new(LocalEventService::default());
        let patient = Participant::new(user::Id::random(), Role::Patient);
        let doctor = Participant::new(user::Id::random(), Role::Doctor);
        let mut patient_stream = events
            .subscribe(&Subject::Notifications(patient.user_id()))
            .await
            .unwrap();
        let mut doctor_stream = events
            .subscribe(&Subject::Notifications(doctor.user_id()))
            .await
            .unwrap();

        let message = Message::from(NewMessage::new(
            conversation::Id::random(),
            &patient,
            "Xin chào",
            vec![],
        ));
        let view = MessageView::new(message, "jora".into(), patient.user_id());
        let sent = SentMessage::new(view.clone(), Some(*doctor.user_id()), vec![doctor, patient]);

        message_sent(&events, &sent).await;

        assert_eq!(
            next(&mut doctor_stream).await,
            Some(Notification::new_message(&view))
        );
        assert_eq!(
            next(&mut doctor_stream).await,
            Some(Notification::conversation_updated(&view))
        );
        assert_eq!(
            next(&mut patient_stream).await,
            Some(Notification::conversation_updated(&view))
        );
        assert_eq!(next(&mut patient_stream).await, None);
    }

    #[tokio::test]
    async fn should_announce_departure_in_room() {
        let events: event::Service = Arc::new(LocalEventService::default());
        let id = conversation::Id::random();
        let leaver = user::Id::random();
        let mut room = events
            .subscribe(&Subject::Conversation(&id))
            .await
            .unwrap();
        let left = LeftGroup::new(id, "Nhóm A", vec![]);

        member_left(&events, &leaver, &left).await;

        match next(&mut room).await {
            Some(Notification::MemberLeft {
                conversation_id,
                user_id,
                group_name,
                ..
            }) => {
                assert_eq!(conversation_id, id);
                assert_eq!(user_id, leaver);
                assert_eq!(group_name, "Nhóm A");
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }
}
