use std::fmt::Display;
use std::sync::Arc;

use repository::ConversationRepository;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user;

pub mod model;
pub mod repository;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn ConversationRepository + Send + Sync>;

/// Marker stored as the last message of a freshly created group.
pub const GROUP_CREATED: &str = "Nhóm đã được tạo";

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Id(Uuid);

impl Id {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn get(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Direct,
    Group,
}

impl Kind {
    /// Records written before group chats existed carry no kind and are
    /// direct conversations.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None | Some("direct") => Ok(Self::Direct),
            Some("group") => Ok(Self::Group),
            Some(other) => Err(Error::UnsupportedKind(other.to_string())),
        }
    }

    pub const fn as_str(&self) -> &str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    user_id: user::Id,
    role: user::Role,
}

impl Participant {
    pub const fn new(user_id: user::Id, role: user::Role) -> Self {
        Self { user_id, role }
    }

    pub const fn user_id(&self) -> &user::Id {
        &self.user_id
    }

    pub const fn role(&self) -> user::Role {
        self.role
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unsupported conversation kind: {0:?}")]
    UnsupportedKind(String),

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}
