use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable, Selectable};
use log::warn;
use uuid::Uuid;

use crate::message::model::LastMessage;
use crate::user;

use super::{Id, Kind, Participant};

#[derive(Queryable, Selectable)]
#[diesel(table_name = crate::schema::conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConversationRecord {
    id: Uuid,
    seq: i64,
    kind: Option<String>,
    patient_id: Option<Uuid>,
    doctor_id: Option<Uuid>,
    group_name: Option<String>,
    last_message: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub const fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn is_group(&self) -> bool {
        self.kind.as_deref() == Some(Kind::Group.as_str())
    }

    /// Participants are only read for group records, direct membership lives
    /// on the record itself.
    pub fn into_conversation(self, participants: Vec<Participant>) -> Conversation {
        let details = match Kind::parse(self.kind.as_deref()) {
            Ok(Kind::Direct) => match (self.patient_id, self.doctor_id) {
                (Some(patient), Some(doctor)) => Details::Direct {
                    patient: user::Id::from(patient),
                    doctor: user::Id::from(doctor),
                },
                _ => {
                    warn!("Direct conversation {} misses a party", self.id);
                    Details::Unsupported(Kind::Direct.as_str().to_string())
                }
            },
            Ok(Kind::Group) => Details::Group {
                name: self.group_name.unwrap_or_default(),
                participants,
            },
            Err(super::Error::UnsupportedKind(kind)) => Details::Unsupported(kind),
            Err(e) => Details::Unsupported(e.to_string()),
        };

        let last_message = self
            .last_message_at
            .map(|at| LastMessage::new(self.last_message.unwrap_or_default(), at));

        Conversation {
            id: Id::from(self.id),
            seq: self.seq,
            details,
            last_message,
            created_at: self.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::conversations)]
pub struct NewConversation<'a> {
    id: &'a Uuid,
    kind: &'a str,
    patient_id: Option<&'a Uuid>,
    doctor_id: Option<&'a Uuid>,
    group_name: Option<&'a str>,
    last_message: &'a str,
    last_message_at: &'a DateTime<Utc>,
}

impl<'a> NewConversation<'a> {
    pub fn direct(
        id: &'a Id,
        patient: &'a user::Id,
        doctor: &'a user::Id,
        seed: &'a LastMessage,
    ) -> Self {
        Self {
            id: id.get(),
            kind: Kind::Direct.as_str(),
            patient_id: Some(patient.get()),
            doctor_id: Some(doctor.get()),
            group_name: None,
            last_message: seed.text(),
            last_message_at: seed.at(),
        }
    }

    pub fn group(id: &'a Id, name: &'a str, seed: &'a LastMessage) -> Self {
        Self {
            id: id.get(),
            kind: Kind::Group.as_str(),
            patient_id: None,
            doctor_id: None,
            group_name: Some(name),
            last_message: seed.text(),
            last_message_at: seed.at(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::conversation_participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ParticipantRecord {
    conversation_id: Uuid,
    user_id: Uuid,
    role: String,
    position: i32,
}

impl ParticipantRecord {
    pub fn new(conversation_id: &Id, p: &Participant, position: i32) -> Self {
        Self {
            conversation_id: *conversation_id.get(),
            user_id: *p.user_id().get(),
            role: p.role().as_str().to_string(),
            position,
        }
    }

    pub const fn conversation_id(&self) -> &Uuid {
        &self.conversation_id
    }
}

impl From<ParticipantRecord> for Participant {
    fn from(r: ParticipantRecord) -> Self {
        Participant::new(user::Id::from(r.user_id), user::Role::normalize(&r.role))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Details {
    Direct {
        patient: user::Id,
        doctor: user::Id,
    },
    Group {
        name: String,
        participants: Vec<Participant>,
    },
    /// Record of a kind this service does not know how to present.
    Unsupported(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    id: Id,
    seq: i64,
    details: Details,
    last_message: Option<LastMessage>,
    created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        id: Id,
        seq: i64,
        details: Details,
        last_message: Option<LastMessage>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seq,
            details,
            last_message,
            created_at,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    /// Creation order of the conversation in the store.
    pub const fn seq(&self) -> i64 {
        self.seq
    }

    pub const fn details(&self) -> &Details {
        &self.details
    }

    pub const fn last_message(&self) -> Option<&LastMessage> {
        self.last_message.as_ref()
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn kind(&self) -> Option<Kind> {
        match self.details {
            Details::Direct { .. } => Some(Kind::Direct),
            Details::Group { .. } => Some(Kind::Group),
            Details::Unsupported(_) => None,
        }
    }

    pub fn members(&self) -> Vec<Participant> {
        match &self.details {
            Details::Direct { patient, doctor } => vec![
                Participant::new(*doctor, user::Role::Doctor),
                Participant::new(*patient, user::Role::Patient),
            ],
            Details::Group { participants, .. } => participants.clone(),
            Details::Unsupported(_) => vec![],
        }
    }

    pub fn is_member(&self, user: &user::Id) -> bool {
        match &self.details {
            Details::Direct { patient, doctor } => patient == user || doctor == user,
            Details::Group { participants, .. } => {
                participants.iter().any(|p| p.user_id() == user)
            }
            Details::Unsupported(_) => false,
        }
    }

    pub fn with_last_message(self, last_message: LastMessage) -> Self {
        Self {
            last_message: Some(last_message),
            ..self
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(kind: Option<&str>) -> ConversationRecord {
        ConversationRecord {
            id: Uuid::new_v4(),
            seq: 1,
            kind: kind.map(String::from),
            patient_id: Some(Uuid::new_v4()),
            doctor_id: Some(Uuid::new_v4()),
            group_name: None,
            last_message: Some("Xin chào".into()),
            last_message_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn should_read_legacy_record_as_direct() {
        let c = record(None).into_conversation(vec![]);

        assert_eq!(c.kind(), Some(Kind::Direct));
        assert_eq!(c.members().len(), 2);
        assert_eq!(c.last_message().map(|m| m.text()), Some("Xin chào"));
    }

    #[test]
    fn should_keep_unknown_kind_without_members() {
        let c = record(Some("broadcast")).into_conversation(vec![]);

        assert_eq!(c.kind(), None);
        assert!(c.members().is_empty());
        assert!(matches!(c.details(), Details::Unsupported(k) if k == "broadcast"));
    }

    #[test]
    fn should_check_group_membership() {
        let doctor = user::Id::random();
        let patient = user::Id::random();
        let participants = vec![
            Participant::new(doctor, user::Role::Doctor),
            Participant::new(patient, user::Role::Patient),
        ];

        let c = record(Some("group")).into_conversation(participants);

        assert!(c.is_member(&doctor));
        assert!(c.is_member(&patient));
        assert!(!c.is_member(&user::Id::random()));
    }
}
