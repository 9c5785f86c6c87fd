use std::fmt::Display;
use std::sync::Arc;

use repository::UserRepository;
use serde::{Deserialize, Serialize};
use service::UserService;
use uuid::Uuid;

pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn UserRepository + Send + Sync>;
pub type Service = Arc<dyn UserService + Send + Sync>;

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

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Patient,
}

impl Role {
    /// Anything that is not exactly `doctor` takes part in consultations as a
    /// patient (`member`, `patient`, legacy values).
    pub fn normalize(raw: &str) -> Self {
        match raw {
            "doctor" => Self::Doctor,
            _ => Self::Patient,
        }
    }

    pub const fn as_str(&self) -> &str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_normalize_doctor() {
        assert_eq!(Role::normalize("doctor"), Role::Doctor);
    }

    #[test]
    fn should_normalize_everything_else_to_patient() {
        for raw in ["patient", "member", "", "Doctor", "admin"] {
            assert_eq!(Role::normalize(raw), Role::Patient, "raw role: {raw:?}");
        }
    }

    #[test]
    fn should_serialize_role_in_lowercase() {
        let json = serde_json::to_string(&Role::Doctor).unwrap();
        assert_eq!(json, "\"doctor\"");
    }
}
