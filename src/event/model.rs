use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::consultation::model::{GroupView, LeftGroup, MessageView};
use crate::conversation::{self, Participant};
use crate::message::model::Attachment;
use crate::{message, user};

pub type NotificationStream = Pin<Box<dyn Stream<Item = Notification> + Send>>;

/// Frames pushed to connected sessions. The `type` tag is the wire event name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Notification {
    #[serde(rename = "message:new")]
    NewMessage {
        message_id: message::Id,
        conversation_id: conversation::Id,
        sender_id: user::Id,
        sender_name: String,
        sender_role: user::Role,
        content: String,
        attachments: Vec<Attachment>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "conversation:updated")]
    ConversationUpdated {
        conversation_id: conversation::Id,
        last_message: String,
        last_message_at: DateTime<Utc>,
    },
    #[serde(rename = "conversation:created")]
    ConversationCreated(GroupView),
    #[serde(rename = "group:member_left")]
    MemberLeft {
        conversation_id: conversation::Id,
        user_id: user::Id,
        group_name: String,
        participants: Vec<Participant>,
    },
    #[serde(rename = "typing:start")]
    TypingStarted {
        conversation_id: conversation::Id,
        user_id: user::Id,
    },
    #[serde(rename = "typing:stop")]
    TypingStopped {
        conversation_id: conversation::Id,
        user_id: user::Id,
    },
}

impl Notification {
    pub fn new_message(m: &MessageView) -> Self {
        Self::NewMessage {
            message_id: *m.id(),
            conversation_id: *m.conversation_id(),
            sender_id: *m.sender_id(),
            sender_name: m.sender_name().to_string(),
            sender_role: m.sender_role(),
            content: m.content().to_string(),
            attachments: m.attachments().to_vec(),
            created_at: *m.created_at(),
        }
    }

    pub fn conversation_updated(m: &MessageView) -> Self {
        let summary = m.summary();
        Self::ConversationUpdated {
            conversation_id: *m.conversation_id(),
            last_message: summary.text().to_string(),
            last_message_at: *summary.at(),
        }
    }

    pub fn member_left(user_id: &user::Id, left: &LeftGroup) -> Self {
        Self::MemberLeft {
            conversation_id: *left.conversation_id(),
            user_id: *user_id,
            group_name: left.group_name().to_string(),
            participants: left.participants().to_vec(),
        }
    }
}

/// Inbound frames a client may send over the websocket.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Command {
    #[serde(rename = "join:conversation")]
    Join { conversation_id: conversation::Id },
    #[serde(rename = "leave:conversation")]
    Leave { conversation_id: conversation::Id },
    #[serde(rename = "typing:start")]
    TypingStart { conversation_id: conversation::Id },
    #[serde(rename = "typing:stop")]
    TypingStop { conversation_id: conversation::Id },
}
