use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;

use crate::conversation::model::{Conversation, Details};
use crate::conversation::repository::ConversationRepository;
use crate::conversation::{self, Kind, Participant};
use crate::message;
use crate::message::model::{LastMessage, Message, NewMessage, Window};
use crate::message::repository::MessageRepository;
use crate::user::model::Profile;
use crate::user::repository::UserRepository;
use crate::user::{self, Role};

struct Entry {
    conversation: Conversation,
    members: Vec<user::Id>,
}

struct StoredMessage {
    message: Message,
    receipts: HashSet<user::Id>,
}

#[derive(Default)]
struct State {
    profiles: HashMap<user::Id, Profile>,
    full_names: HashMap<user::Id, String>,
    assignments: HashMap<user::Id, user::Id>,
    conversations: Vec<Entry>,
    messages: Vec<StoredMessage>,
    fail_user_lookups: bool,
}

/// In-memory stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn add_patient(&self, name: &str, full_name: Option<&str>) -> user::Id {
        let id = user::Id::random();
        let mut state = self.state.lock().unwrap();
        state.profiles.insert(
            id,
            Profile::new(id, Role::Patient)
                .with_display_name(name)
                .with_avatar(format!("https://cdn/{name}.png")),
        );
        if let Some(full_name) = full_name {
            state.full_names.insert(id, full_name.to_string());
        }
        id
    }

    pub fn add_doctor(&self, name: &str, specialty: Option<&str>) -> user::Id {
        let id = user::Id::random();
        let mut profile = Profile::new(id, Role::Doctor).with_display_name(name);
        if let Some(specialty) = specialty {
            profile = profile.with_specialty(specialty);
        }
        self.state.lock().unwrap().profiles.insert(id, profile);
        id
    }

    pub fn assign(&self, patient: &user::Id, doctor: &user::Id) {
        self.state
            .lock()
            .unwrap()
            .assignments
            .insert(*patient, *doctor);
    }

    pub fn fail_user_lookups(&self) {
        self.state.lock().unwrap().fail_user_lookups = true;
    }

    /// Stores a record of a kind the service does not present.
    pub fn add_unsupported(&self, kind: &str, members: &[user::Id]) -> conversation::Id {
        let mut state = self.state.lock().unwrap();
        let id = conversation::Id::random();
        let seq = state.conversations.len() as i64 + 1;
        state.conversations.push(Entry {
            conversation: Conversation::new(
                id,
                seq,
                Details::Unsupported(kind.to_string()),
                Some(LastMessage::new("?", Utc::now())),
                Utc::now(),
            ),
            members: members.to_vec(),
        });
        id
    }

    pub fn conversation_count(&self) -> usize {
        self.state.lock().unwrap().conversations.len()
    }

    pub fn stored_messages(&self, id: &conversation::Id) -> Vec<Message> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.message.conversation_id() == id)
            .map(|m| m.message.clone())
            .collect()
    }

    pub fn find_direct(
        &self,
        patient: &user::Id,
        doctor: &user::Id,
    ) -> Result<Option<Conversation>, conversation::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .iter()
            .map(|e| &e.conversation)
            .find(|c| {
                matches!(c.details(), Details::Direct { patient: p, doctor: d } if p == patient && d == doctor)
            })
            .cloned())
    }

    fn push(state: &mut State, details: Details, seed: &LastMessage) -> Conversation {
        let seq = state.conversations.len() as i64 + 1;
        let conversation = Conversation::new(
            conversation::Id::random(),
            seq,
            details,
            Some(seed.clone()),
            Utc::now(),
        );
        state.conversations.push(Entry {
            members: conversation
                .members()
                .iter()
                .map(|p| *p.user_id())
                .collect(),
            conversation: conversation.clone(),
        });
        conversation
    }
}

impl UserRepository for MemoryStore {
    fn find_profile(&self, id: &user::Id) -> Result<Option<Profile>, user::Error> {
        let state = self.state.lock().unwrap();
        if state.fail_user_lookups {
            return Err(user::Error::_Diesel(diesel::result::Error::NotFound));
        }
        Ok(state.profiles.get(id).cloned())
    }

    fn find_patient_full_name(&self, id: &user::Id) -> Result<Option<String>, user::Error> {
        let state = self.state.lock().unwrap();
        if state.fail_user_lookups {
            return Err(user::Error::_Diesel(diesel::result::Error::NotFound));
        }
        Ok(state.full_names.get(id).cloned())
    }

    fn find_assigned_doctor(&self, patient: &user::Id) -> Result<Option<user::Id>, user::Error> {
        Ok(self.state.lock().unwrap().assignments.get(patient).copied())
    }
}

impl ConversationRepository for MemoryStore {
    fn find_by_id(&self, id: &conversation::Id) -> Result<Option<Conversation>, conversation::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .iter()
            .find(|e| e.conversation.id() == id)
            .map(|e| e.conversation.clone()))
    }

    fn find_or_create_direct(
        &self,
        patient: &user::Id,
        doctor: &user::Id,
        seed: &LastMessage,
    ) -> Result<Conversation, conversation::Error> {
        if let Some(c) = self.find_direct(patient, doctor)? {
            return Ok(c);
        }

        let mut state = self.state.lock().unwrap();
        let details = Details::Direct {
            patient: *patient,
            doctor: *doctor,
        };
        Ok(Self::push(&mut state, details, seed))
    }

    fn find_by_member(&self, user: &user::Id) -> Result<Vec<Conversation>, conversation::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .iter()
            .filter(|e| e.members.contains(user))
            .map(|e| e.conversation.clone())
            .collect())
    }

    fn create_group(
        &self,
        name: &str,
        participants: &[Participant],
        seed: &LastMessage,
    ) -> Result<Conversation, conversation::Error> {
        let mut state = self.state.lock().unwrap();
        let details = Details::Group {
            name: name.to_string(),
            participants: participants.to_vec(),
        };
        Ok(Self::push(&mut state, details, seed))
    }

    fn remove_participant(
        &self,
        id: &conversation::Id,
        user: &user::Id,
    ) -> Result<bool, conversation::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state
            .conversations
            .iter_mut()
            .find(|e| e.conversation.id() == id)
        else {
            return Ok(false);
        };

        let Details::Group { name, participants } = entry.conversation.details().clone() else {
            return Ok(false);
        };

        let remaining = participants
            .iter()
            .filter(|p| p.user_id() != user)
            .copied()
            .collect::<Vec<_>>();
        let removed = remaining.len() != participants.len();

        entry.conversation = Conversation::new(
            *entry.conversation.id(),
            entry.conversation.seq(),
            Details::Group {
                name,
                participants: remaining,
            },
            entry.conversation.last_message().cloned(),
            *entry.conversation.created_at(),
        );
        entry.members.retain(|m| m != user);

        Ok(removed)
    }
}

impl MessageRepository for MemoryStore {
    fn insert(&self, msg: &NewMessage) -> Result<Message, crate::message::Error> {
        let mut state = self.state.lock().unwrap();

        let message = Message::from(msg.clone());
        if let Some(entry) = state
            .conversations
            .iter_mut()
            .find(|e| e.conversation.id() == msg.conversation_id())
        {
            entry.conversation = entry.conversation.clone().with_last_message(msg.summary());
        }

        state.messages.push(StoredMessage {
            message: message.clone(),
            receipts: HashSet::new(),
        });

        Ok(message)
    }

    fn find_by_conversation(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
        window: &Window,
    ) -> Result<Vec<Message>, crate::message::Error> {
        let state = self.state.lock().unwrap();

        let history = state
            .messages
            .iter()
            .filter(|m| m.message.conversation_id() == id)
            .map(|m| match kind {
                Kind::Direct => m.message.clone(),
                Kind::Group => {
                    let read =
                        m.receipts.contains(viewer) || m.message.sender_id() == viewer;
                    m.message.clone().with_read(read)
                }
            })
            .collect::<Vec<_>>();

        Ok(window.apply(history, |m| *m.created_at()))
    }

    fn count_unread(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
    ) -> Result<usize, crate::message::Error> {
        let state = self.state.lock().unwrap();

        Ok(state
            .messages
            .iter()
            .filter(|m| m.message.conversation_id() == id && m.message.sender_id() != viewer)
            .filter(|m| match kind {
                Kind::Direct => !m.message.read(),
                Kind::Group => !m.receipts.contains(viewer),
            })
            .count())
    }

    fn mark_as_read(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
    ) -> Result<usize, crate::message::Error> {
        let mut state = self.state.lock().unwrap();

        let mut marked = 0;
        for m in state
            .messages
            .iter_mut()
            .filter(|m| m.message.conversation_id() == id && m.message.sender_id() != viewer)
        {
            match kind {
                Kind::Direct if !m.message.read() => {
                    m.message = m.message.clone().with_read(true);
                    marked += 1;
                }
                Kind::Group if m.receipts.insert(*viewer) => marked += 1,
                _ => {}
            }
        }

        Ok(marked)
    }

    fn mark_seen(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
        seen: &[message::Id],
    ) -> Result<usize, message::Error> {
        let mut state = self.state.lock().unwrap();

        let mut marked = 0;
        for m in state.messages.iter_mut().filter(|m| {
            m.message.conversation_id() == id
                && m.message.sender_id() != viewer
                && seen.contains(m.message.id())
        }) {
            match kind {
                Kind::Direct if !m.message.read() => {
                    m.message = m.message.clone().with_read(true);
                    marked += 1;
                }
                Kind::Group if m.receipts.insert(*viewer) => marked += 1,
                _ => {}
            }
        }

        Ok(marked)
    }
}
