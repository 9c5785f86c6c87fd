use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{conversation, user};

pub mod middleware;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn service::AuthService + Send + Sync>;

#[derive(Serialize, Deserialize, Clone)]
struct TokenClaims {
    sub: user::Id,
    role: String,
    exp: u64,
}

/// Caller identity resolved from a bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct User {
    id: user::Id,
    role: user::Role,
}

impl User {
    pub const fn new(id: user::Id, role: user::Role) -> Self {
        Self { id, role }
    }

    pub const fn id(&self) -> &user::Id {
        &self.id
    }

    pub const fn role(&self) -> user::Role {
        self.role
    }

    pub const fn is_doctor(&self) -> bool {
        matches!(self.role, user::Role::Doctor)
    }

    pub const fn participant(&self) -> conversation::Participant {
        conversation::Participant::new(self.id, self.role)
    }
}

#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible = self.0.chars().take(4).collect::<String>();
        write!(f, "Token({visible}***)")
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("caller identity cannot be resolved")]
    Unauthenticated,
    #[error("token is malformed")]
    TokenMalformed,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_redact_token() {
        let token = Token::new("eyJhbGciOiJIUzI1NiJ9.secret");
        assert_eq!(format!("{token:?}"), "Token(eyJh***)");
    }
}
