use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};

use crate::conversation::model::{Conversation, Details};
use crate::conversation::{self, GROUP_CREATED, Kind, Participant};
use crate::message::model::{Attachment, LastMessage, Message, NewMessage, Window};
use crate::message;
use crate::user::model::{DOCTOR_NAME, PATIENT_NAME, UNKNOWN_NAME};
use crate::user::{self, Role};

use super::model::{
    ConversationSummary, GroupView, LeftGroup, MessageView, ParticipantView, SentMessage,
};

const MIN_GROUP_PATIENTS: usize = 2;

#[async_trait]
pub trait ConsultationService {
    /// Sends into the direct conversation with the patient's assigned doctor,
    /// creating it on first contact.
    async fn send_as_patient(
        &self,
        patient: &user::Id,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> super::Result<SentMessage>;

    async fn send_as_doctor(
        &self,
        doctor: &user::Id,
        id: &conversation::Id,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> super::Result<SentMessage>;

    async fn send_message(
        &self,
        sender: &Participant,
        id: &conversation::Id,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> super::Result<SentMessage>;

    async fn create_group_conversation(
        &self,
        doctor: &user::Id,
        name: &str,
        patients: &[user::Id],
    ) -> super::Result<GroupView>;

    async fn get_doctor_inbox(&self, doctor: &user::Id)
    -> super::Result<Vec<ConversationSummary>>;

    async fn get_patient_conversations(
        &self,
        patient: &user::Id,
    ) -> super::Result<Vec<ConversationSummary>>;

    /// Returns the history as stored before this call and marks it read for
    /// the viewer afterwards.
    async fn get_messages(
        &self,
        viewer: &user::Id,
        id: &conversation::Id,
        window: &Window,
    ) -> super::Result<Vec<MessageView>>;

    async fn mark_as_read(&self, viewer: &user::Id, id: &conversation::Id)
    -> super::Result<usize>;

    async fn leave_group(&self, user: &user::Id, id: &conversation::Id)
    -> super::Result<LeftGroup>;

    async fn find_membership(
        &self,
        user: &user::Id,
        id: &conversation::Id,
    ) -> super::Result<Conversation>;
}

#[derive(Clone)]
pub struct ConsultationServiceImpl {
    conversation_repo: conversation::Repository,
    message_repo: message::Repository,
    user_service: user::Service,
}

impl ConsultationServiceImpl {
    pub fn new(
        conversation_repo: conversation::Repository,
        message_repo: message::Repository,
        user_service: user::Service,
    ) -> Self {
        Self {
            conversation_repo,
            message_repo,
            user_service,
        }
    }
}

#[async_trait]
impl ConsultationService for ConsultationServiceImpl {
    async fn send_as_patient(
        &self,
        patient: &user::Id,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> super::Result<SentMessage> {
        validate_content(content, &attachments)?;

        let doctor = self
            .user_service
            .find_assigned_doctor(patient)
            .await?
            .ok_or(super::Error::Unassigned(*patient))?;

        let seed = LastMessage::summarize(content, Utc::now());
        let conversation = self
            .conversation_repo
            .find_or_create_direct(patient, &doctor, &seed)?;

        let sender = Participant::new(*patient, Role::Patient);
        let message = self.store(&conversation, &sender, content, attachments)?;

        Ok(self.sent(message, Some(doctor), conversation.members()).await)
    }

    async fn send_as_doctor(
        &self,
        doctor: &user::Id,
        id: &conversation::Id,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> super::Result<SentMessage> {
        validate_content(content, &attachments)?;

        let conversation = self
            .conversation_repo
            .find_by_id(id)?
            .ok_or(super::Error::NotFound(*id))?;

        let patient = match conversation.details() {
            Details::Direct { patient, doctor: d } if d == doctor => *patient,
            _ => {
                return Err(super::Error::Forbidden(format!(
                    "conversation {id} does not belong to doctor {doctor}"
                )));
            }
        };

        let sender = Participant::new(*doctor, Role::Doctor);
        let message = self.store(&conversation, &sender, content, attachments)?;

        Ok(self.sent(message, Some(patient), conversation.members()).await)
    }

    async fn send_message(
        &self,
        sender: &Participant,
        id: &conversation::Id,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> super::Result<SentMessage> {
        validate_content(content, &attachments)?;

        let conversation = self.find_membership(sender.user_id(), id).await?;
        let message = self.store(&conversation, sender, content, attachments)?;

        let receiver = match conversation.details() {
            Details::Direct { patient, doctor } if patient == sender.user_id() => Some(*doctor),
            Details::Direct { patient, .. } => Some(*patient),
            Details::Group { .. } | Details::Unsupported(_) => None,
        };

        Ok(self.sent(message, receiver, conversation.members()).await)
    }

    async fn create_group_conversation(
        &self,
        doctor: &user::Id,
        name: &str,
        patients: &[user::Id],
    ) -> super::Result<GroupView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(super::Error::InvalidInput("group name is required"));
        }

        let mut unique = Vec::with_capacity(patients.len());
        for p in patients {
            if !unique.contains(p) {
                unique.push(*p);
            }
        }

        if unique.len() < MIN_GROUP_PATIENTS {
            return Err(super::Error::InvalidInput(
                "a group needs at least two patients",
            ));
        }

        for p in &unique {
            if !self.user_service.is_assigned(p, doctor).await? {
                return Err(super::Error::Forbidden(format!(
                    "patient {p} is not assigned to doctor {doctor}"
                )));
            }
        }

        let participants = std::iter::once(Participant::new(*doctor, Role::Doctor))
            .chain(unique.iter().map(|p| Participant::new(*p, Role::Patient)))
            .collect::<Vec<_>>();

        let seed = LastMessage::new(GROUP_CREATED, Utc::now());
        let conversation = self
            .conversation_repo
            .create_group(name, &participants, &seed)?;
        debug!(
            "Doctor {doctor} created group {} with {} patients",
            conversation.id(),
            unique.len()
        );

        let roster = self.roster(&participants).await;

        Ok(GroupView::new(
            *conversation.id(),
            name,
            roster,
            GROUP_CREATED,
            *conversation.created_at(),
        ))
    }

    async fn get_doctor_inbox(
        &self,
        doctor: &user::Id,
    ) -> super::Result<Vec<ConversationSummary>> {
        let conversations = self.conversation_repo.find_by_member(doctor)?;
        self.summarize_all(conversations, doctor).await
    }

    async fn get_patient_conversations(
        &self,
        patient: &user::Id,
    ) -> super::Result<Vec<ConversationSummary>> {
        let conversations = self.conversation_repo.find_by_member(patient)?;

        let placeholder = match self.user_service.find_assigned_doctor(patient).await? {
            Some(doctor) => {
                let has_direct = conversations.iter().any(|c| {
                    matches!(c.details(), Details::Direct { doctor: d, .. } if d == &doctor)
                });

                if has_direct {
                    None
                } else {
                    let view = self
                        .participant_view(&Participant::new(doctor, Role::Doctor), DOCTOR_NAME)
                        .await;
                    Some(ConversationSummary::placeholder(view))
                }
            }
            None => None,
        };

        let summaries = self.summarize_all(conversations, patient).await?;

        Ok(placeholder.into_iter().chain(summaries).collect())
    }

    async fn get_messages(
        &self,
        viewer: &user::Id,
        id: &conversation::Id,
        window: &Window,
    ) -> super::Result<Vec<MessageView>> {
        if window.limit().is_some_and(|limit| limit < 0) {
            return Err(super::Error::InvalidInput("limit must not be negative"));
        }

        let conversation = self.find_membership(viewer, id).await?;
        let kind = kind_of(&conversation)?;

        let history = self
            .message_repo
            .find_by_conversation(id, kind, viewer, window)?;

        let seen = history.iter().map(|m| *m.id()).collect::<Vec<_>>();
        let marked = self.message_repo.mark_seen(id, kind, viewer, &seen)?;
        debug!("Marked {marked} messages of {id} as read for {viewer}");

        let mut names: HashMap<user::Id, String> = HashMap::new();
        let mut views = Vec::with_capacity(history.len());
        for m in history {
            let name = match names.get(m.sender_id()) {
                Some(name) => name.clone(),
                None => {
                    let name = self.sender_name(m.sender_id()).await;
                    names.insert(*m.sender_id(), name.clone());
                    name
                }
            };
            views.push(MessageView::new(m, name, viewer));
        }

        Ok(views)
    }

    async fn mark_as_read(
        &self,
        viewer: &user::Id,
        id: &conversation::Id,
    ) -> super::Result<usize> {
        let conversation = self.find_membership(viewer, id).await?;
        let kind = kind_of(&conversation)?;

        let marked = self.message_repo.mark_as_read(id, kind, viewer)?;
        Ok(marked)
    }

    async fn leave_group(
        &self,
        user: &user::Id,
        id: &conversation::Id,
    ) -> super::Result<LeftGroup> {
        let conversation = self
            .conversation_repo
            .find_by_id(id)?
            .ok_or(super::Error::NotFound(*id))?;

        let Details::Group { name, participants } = conversation.details() else {
            return Err(super::Error::InvalidState("only group conversations can be left"));
        };

        if !conversation.is_member(user) {
            return Err(super::Error::Forbidden(format!(
                "{user} is not a member of conversation {id}"
            )));
        }

        self.conversation_repo.remove_participant(id, user)?;

        let remaining = participants
            .iter()
            .filter(|p| p.user_id() != user)
            .copied()
            .collect::<Vec<_>>();
        debug!("{user} left group {id}, {} members remain", remaining.len());

        Ok(LeftGroup::new(*id, name.as_str(), remaining))
    }

    async fn find_membership(
        &self,
        user: &user::Id,
        id: &conversation::Id,
    ) -> super::Result<Conversation> {
        let conversation = self
            .conversation_repo
            .find_by_id(id)?
            .ok_or(super::Error::NotFound(*id))?;

        if !conversation.is_member(user) {
            return Err(super::Error::Forbidden(format!(
                "{user} is not a member of conversation {id}"
            )));
        }

        Ok(conversation)
    }
}

impl ConsultationServiceImpl {
    fn store(
        &self,
        conversation: &Conversation,
        sender: &Participant,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> super::Result<Message> {
        let new_message = NewMessage::new(*conversation.id(), sender, content, attachments);
        let message = self.message_repo.insert(&new_message)?;
        debug!(
            "{} sent message {} into {}",
            sender.user_id(),
            message.id(),
            conversation.id()
        );
        Ok(message)
    }

    async fn sent(
        &self,
        message: Message,
        receiver: Option<user::Id>,
        participants: Vec<Participant>,
    ) -> SentMessage {
        let sender = *message.sender_id();
        let name = self.sender_name(&sender).await;

        SentMessage::new(MessageView::new(message, name, &sender), receiver, participants)
    }

    async fn sender_name(&self, id: &user::Id) -> String {
        self.user_service.find_card(id).await.name_or(UNKNOWN_NAME)
    }

    async fn participant_view(&self, p: &Participant, fallback: &str) -> ParticipantView {
        let card = self.user_service.find_card(p.user_id()).await;
        ParticipantView::new(p, &card, fallback)
    }

    async fn roster(&self, participants: &[Participant]) -> Vec<ParticipantView> {
        let mut roster = Vec::with_capacity(participants.len());
        for p in participants {
            let fallback = match p.role() {
                Role::Doctor => DOCTOR_NAME,
                Role::Patient => PATIENT_NAME,
            };
            roster.push(self.participant_view(p, fallback).await);
        }
        roster
    }

    /// Most recent activity first, ties in creation order. Records of an
    /// unknown kind are left out.
    async fn summarize_all(
        &self,
        mut conversations: Vec<Conversation>,
        viewer: &user::Id,
    ) -> super::Result<Vec<ConversationSummary>> {
        conversations.sort_by(|a, b| {
            let a_at = a.last_message().map(|m| *m.at());
            let b_at = b.last_message().map(|m| *m.at());
            b_at.cmp(&a_at).then(a.seq().cmp(&b.seq()))
        });

        let mut summaries = Vec::with_capacity(conversations.len());
        for c in &conversations {
            if let Some(summary) = self.summarize(c, viewer).await? {
                summaries.push(summary);
            }
        }

        Ok(summaries)
    }

    async fn summarize(
        &self,
        c: &Conversation,
        viewer: &user::Id,
    ) -> super::Result<Option<ConversationSummary>> {
        let last_message = c.last_message().map(|m| m.text().to_string());
        let last_message_at = c.last_message().map(|m| *m.at());

        let summary = match c.details() {
            Details::Direct { patient, doctor } => {
                let counterpart = if viewer == doctor {
                    let p = Participant::new(*patient, Role::Patient);
                    self.participant_view(&p, UNKNOWN_NAME).await
                } else {
                    let d = Participant::new(*doctor, Role::Doctor);
                    self.participant_view(&d, DOCTOR_NAME).await
                };

                ConversationSummary::Direct {
                    conversation_id: Some(*c.id()),
                    has_conversation: true,
                    counterpart,
                    last_message,
                    last_message_at,
                    unread_count: self.message_repo.count_unread(c.id(), Kind::Direct, viewer)?,
                }
            }
            Details::Group { name, participants } => ConversationSummary::Group {
                conversation_id: *c.id(),
                group_name: name.clone(),
                participants: self.roster(participants).await,
                last_message,
                last_message_at,
                unread_count: self.message_repo.count_unread(c.id(), Kind::Group, viewer)?,
            },
            Details::Unsupported(kind) => {
                warn!("Skipping conversation {} of unsupported kind {kind:?}", c.id());
                return Ok(None);
            }
        };

        Ok(Some(summary))
    }
}

fn validate_content(content: &str, attachments: &[Attachment]) -> super::Result<()> {
    if content.is_empty() && attachments.is_empty() {
        return Err(super::Error::InvalidInput(
            "message content or attachments required",
        ));
    }
    Ok(())
}

fn kind_of(c: &Conversation) -> super::Result<Kind> {
    c.kind()
        .ok_or(super::Error::InvalidState("unsupported conversation kind"))
}
