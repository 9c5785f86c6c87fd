use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{conversation, user};

use super::Id;

/// Stored as the conversation summary when a message carries attachments only.
pub const ATTACHMENT_PLACEHOLDER: &str = "[Attachment]";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    url: String,
    name: String,
    size: u64,
    mime_type: String,
}

impl Attachment {
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageRecord {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    sender_role: String,
    content: String,
    attachments: serde_json::Value,
    read: bool,
    created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub const fn id(&self) -> &Uuid {
        &self.id
    }
}

impl TryFrom<MessageRecord> for Message {
    type Error = super::Error;

    fn try_from(r: MessageRecord) -> super::Result<Self> {
        let id = Id::from(r.id);
        let attachments = serde_json::from_value::<Vec<Attachment>>(r.attachments)
            .map_err(|_| super::Error::MalformedAttachments(id))?;

        Ok(Self {
            id,
            conversation_id: conversation::Id::from(r.conversation_id),
            sender_id: user::Id::from(r.sender_id),
            sender_role: user::Role::normalize(&r.sender_role),
            content: r.content,
            attachments,
            read: r.read,
            created_at: r.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessageRecord<'a> {
    id: &'a Uuid,
    conversation_id: &'a Uuid,
    sender_id: &'a Uuid,
    sender_role: &'a str,
    content: &'a str,
    attachments: serde_json::Value,
    read: bool,
    created_at: DateTime<Utc>,
}

impl<'a> NewMessageRecord<'a> {
    pub fn new(m: &'a NewMessage) -> super::Result<Self> {
        Ok(Self {
            id: m.id.get(),
            conversation_id: m.conversation_id.get(),
            sender_id: m.sender_id.get(),
            sender_role: m.sender_role.as_str(),
            content: &m.content,
            attachments: serde_json::to_value(&m.attachments)?,
            read: false,
            created_at: m.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::message_reads)]
pub struct NewReceipt {
    message_id: Uuid,
    user_id: Uuid,
    read_at: DateTime<Utc>,
}

impl NewReceipt {
    pub fn new(message_id: Uuid, user_id: &user::Id) -> Self {
        Self {
            message_id,
            user_id: *user_id.get(),
            read_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    id: Id,
    conversation_id: conversation::Id,
    sender_id: user::Id,
    sender_role: user::Role,
    content: String,
    attachments: Vec<Attachment>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl Message {
    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub const fn sender_id(&self) -> &user::Id {
        &self.sender_id
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

    pub fn with_read(self, read: bool) -> Self {
        Self { read, ..self }
    }
}

impl From<NewMessage> for Message {
    fn from(m: NewMessage) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            sender_role: m.sender_role,
            content: m.content,
            attachments: m.attachments,
            read: false,
            created_at: m.created_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewMessage {
    id: Id,
    conversation_id: conversation::Id,
    sender_id: user::Id,
    sender_role: user::Role,
    content: String,
    attachments: Vec<Attachment>,
    created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(
        conversation_id: conversation::Id,
        sender: &conversation::Participant,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            id: Id::random(),
            conversation_id,
            sender_id: *sender.user_id(),
            sender_role: sender.role(),
            content: content.into(),
            attachments,
            created_at: Utc::now(),
        }
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub fn summary(&self) -> LastMessage {
        LastMessage::summarize(&self.content, self.created_at)
    }
}

/// Denormalized summary of the most recent message of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    text: String,
    at: DateTime<Utc>,
}

impl LastMessage {
    pub fn new(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            at,
        }
    }

    pub fn summarize(content: &str, at: DateTime<Utc>) -> Self {
        if content.is_empty() {
            Self::new(ATTACHMENT_PLACEHOLDER, at)
        } else {
            Self::new(content, at)
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn at(&self) -> &DateTime<Utc> {
        &self.at
    }
}

/// Optional slice of a conversation history. An empty window is the full
/// history, oldest first.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Window {
    limit: Option<i64>,
    before: Option<DateTime<Utc>>,
}

impl Window {
    pub const fn new(limit: Option<i64>, before: Option<DateTime<Utc>>) -> Self {
        Self { limit, before }
    }

    pub const fn limit(&self) -> Option<i64> {
        self.limit
    }

    pub const fn before(&self) -> Option<&DateTime<Utc>> {
        self.before.as_ref()
    }

    /// Applies the window to a history already sorted oldest first.
    #[cfg(test)]
    pub fn apply<T>(&self, history: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
        let mut history: Vec<T> = match self.before {
            Some(before) => history
                .into_iter()
                .filter(|m| created_at(m) < before)
                .collect(),
            None => history,
        };

        if let Some(limit) = self.limit.and_then(|l| usize::try_from(l).ok()) {
            let skip = history.len().saturating_sub(limit);
            history.drain(..skip);
        }

        history
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    #[test]
    fn should_summarize_text() {
        let summary = LastMessage::summarize("Xin chào", Utc::now());
        assert_eq!(summary.text(), "Xin chào");
    }

    #[test]
    fn should_summarize_attachment_only_message() {
        let summary = LastMessage::summarize("", Utc::now());
        assert_eq!(summary.text(), ATTACHMENT_PLACEHOLDER);
    }

    #[test]
    fn should_keep_full_history_without_window() {
        let history = vec![1, 2, 3];
        let now = Utc::now();

        let actual = Window::default().apply(history, |_| now);

        assert_eq!(actual, vec![1, 2, 3]);
    }

    #[test]
    fn should_keep_latest_messages_within_limit() {
        let now = Utc::now();
        let history = vec![
            now - Duration::seconds(3),
            now - Duration::seconds(2),
            now - Duration::seconds(1),
        ];

        let actual = Window::new(Some(2), None).apply(history.clone(), |t| *t);

        assert_eq!(actual, history[1..].to_vec());
    }

    #[test]
    fn should_keep_messages_before_cursor() {
        let now = Utc::now();
        let history = vec![
            now - Duration::seconds(3),
            now - Duration::seconds(2),
            now - Duration::seconds(1),
        ];

        let actual = Window::new(Some(1), Some(history[2])).apply(history.clone(), |t| *t);

        assert_eq!(actual, vec![history[1]]);
    }

    #[test]
    fn should_serialize_attachment_in_camel_case() {
        let a = Attachment::new("https://cdn/a.png", "a.png", 42, "image/png");

        let json = serde_json::to_value(&a).unwrap();

        assert_eq!(json["mimeType"], "image/png");
        assert_eq!(json["size"], 42);
    }
}
