use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::{self, Participant};
use crate::message::model::{Attachment, LastMessage, Message};
use crate::message;
use crate::user::{self, model::Card};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    id: message::Id,
    conversation_id: conversation::Id,
    sender_id: user::Id,
    sender_name: String,
    sender_role: user::Role,
    content: String,
    attachments: Vec<Attachment>,
    read: bool,
    created_at: DateTime<Utc>,
    is_own: bool,
}

impl MessageView {
    pub fn new(m: Message, sender_name: String, viewer: &user::Id) -> Self {
        Self {
            id: *m.id(),
            conversation_id: *m.conversation_id(),
            sender_id: *m.sender_id(),
            sender_name,
            sender_role: m.sender_role(),
            content: m.content().to_string(),
            attachments: m.attachments().to_vec(),
            read: m.read(),
            created_at: *m.created_at(),
            is_own: m.sender_id() == viewer,
        }
    }

    pub const fn id(&self) -> &message::Id {
        &self.id
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub const fn sender_id(&self) -> &user::Id {
        &self.sender_id
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub const fn sender_role(&self) -> user::Role {
        self.sender_role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub const fn read(&self) -> bool {
        self.read
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub const fn is_own(&self) -> bool {
        self.is_own
    }

    pub fn summary(&self) -> LastMessage {
        LastMessage::summarize(&self.content, self.created_at)
    }
}

/// Result of a send: the stored message as seen by its sender, plus who has to
/// be notified about it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    #[serde(flatten)]
    message: MessageView,
    #[serde(skip_serializing_if = "Option::is_none")]
    receiver_id: Option<user::Id>,
    participants: Vec<Participant>,
}

impl SentMessage {
    pub fn new(
        message: MessageView,
        receiver_id: Option<user::Id>,
        participants: Vec<Participant>,
    ) -> Self {
        Self {
            message,
            receiver_id,
            participants,
        }
    }

    pub const fn message(&self) -> &MessageView {
        &self.message
    }

    pub const fn receiver_id(&self) -> Option<&user::Id> {
        self.receiver_id.as_ref()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    user_id: user::Id,
    role: user::Role,
    name: String,
    avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    specialty: Option<String>,
}

impl ParticipantView {
    /// Doctors always carry a specialty, patients never do.
    pub fn new(p: &Participant, card: &Card, fallback_name: &str) -> Self {
        let specialty = match p.role() {
            user::Role::Doctor => Some(card.specialty_or(user::model::DEFAULT_SPECIALTY)),
            user::Role::Patient => None,
        };

        Self {
            user_id: *p.user_id(),
            role: p.role(),
            name: card.name_or(fallback_name),
            avatar: card.avatar().map(String::from),
            specialty,
        }
    }

    pub const fn user_id(&self) -> &user::Id {
        &self.user_id
    }

    pub const fn role(&self) -> user::Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn specialty(&self) -> Option<&str> {
        self.specialty.as_deref()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConversationSummary {
    Direct {
        conversation_id: Option<conversation::Id>,
        has_conversation: bool,
        counterpart: ParticipantView,
        last_message: Option<String>,
        last_message_at: Option<DateTime<Utc>>,
        unread_count: usize,
    },
    Group {
        conversation_id: conversation::Id,
        group_name: String,
        participants: Vec<ParticipantView>,
        last_message: Option<String>,
        last_message_at: Option<DateTime<Utc>>,
        unread_count: usize,
    },
}

impl ConversationSummary {
    /// Placeholder offered to a patient whose assigned doctor has not been
    /// written to yet. Never persisted.
    pub fn placeholder(doctor: ParticipantView) -> Self {
        Self::Direct {
            conversation_id: None,
            has_conversation: false,
            counterpart: doctor,
            last_message: None,
            last_message_at: None,
            unread_count: 0,
        }
    }

    pub const fn conversation_id(&self) -> Option<&conversation::Id> {
        match self {
            Self::Direct {
                conversation_id, ..
            } => conversation_id.as_ref(),
            Self::Group {
                conversation_id, ..
            } => Some(conversation_id),
        }
    }

    pub const fn unread_count(&self) -> usize {
        match self {
            Self::Direct { unread_count, .. } | Self::Group { unread_count, .. } => *unread_count,
        }
    }

    pub fn last_message(&self) -> Option<&str> {
        match self {
            Self::Direct { last_message, .. } | Self::Group { last_message, .. } => {
                last_message.as_deref()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    conversation_id: conversation::Id,
    group_name: String,
    participants: Vec<ParticipantView>,
    last_message: String,
    created_at: DateTime<Utc>,
}

impl GroupView {
    pub fn new(
        conversation_id: conversation::Id,
        group_name: impl Into<String>,
        participants: Vec<ParticipantView>,
        last_message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id,
            group_name: group_name.into(),
            participants,
            last_message: last_message.into(),
            created_at,
        }
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn participants(&self) -> &[ParticipantView] {
        &self.participants
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeftGroup {
    success: bool,
    conversation_id: conversation::Id,
    group_name: String,
    participants: Vec<Participant>,
}

impl LeftGroup {
    pub fn new(
        conversation_id: conversation::Id,
        group_name: impl Into<String>,
        participants: Vec<Participant>,
    ) -> Self {
        Self {
            success: true,
            conversation_id,
            group_name: group_name.into(),
            participants,
        }
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Members left after the removal, in their original order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }
}
