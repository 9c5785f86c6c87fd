use diesel::prelude::{Queryable, Selectable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Id, Role};

pub const UNKNOWN_NAME: &str = "Unknown";
pub const DOCTOR_NAME: &str = "Doctor";
pub const PATIENT_NAME: &str = "Bệnh nhân";
pub const DEFAULT_SPECIALTY: &str = "General";

#[derive(Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    id: Uuid,
    role: String,
    display_name: Option<String>,
    user_name: Option<String>,
    avatar: Option<String>,
    specialty: Option<String>,
}

impl From<User> for Profile {
    fn from(u: User) -> Self {
        Self {
            id: Id::from(u.id),
            role: Role::normalize(&u.role),
            display_name: u.display_name,
            user_name: u.user_name,
            avatar: u.avatar,
            specialty: u.specialty,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    id: Id,
    role: Role,
    display_name: Option<String>,
    user_name: Option<String>,
    avatar: Option<String>,
    specialty: Option<String>,
}

impl Profile {
    pub fn new(id: Id, role: Role) -> Self {
        Self {
            id,
            role,
            display_name: None,
            user_name: None,
            avatar: None,
            specialty: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn role(&self) -> Role {
        self.role
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn specialty(&self) -> Option<&str> {
        self.specialty.as_deref()
    }
}

/// Display data resolved for a single user. Every enrichment site builds
/// names through [`Card::resolve`] so the precedence stays the same
/// everywhere: patient full name, then display name, then user name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    name: Option<String>,
    avatar: Option<String>,
    specialty: Option<String>,
}

impl Card {
    pub fn resolve(full_name: Option<String>, profile: Option<&Profile>) -> Self {
        let full_name = full_name.filter(|n| !n.trim().is_empty());
        let name = full_name.or_else(|| {
            profile.and_then(|p| {
                p.display_name()
                    .filter(|n| !n.trim().is_empty())
                    .or(p.user_name().filter(|n| !n.trim().is_empty()))
                    .map(String::from)
            })
        });

        Self {
            name,
            avatar: profile.and_then(|p| p.avatar().map(String::from)),
            specialty: profile.and_then(|p| p.specialty().map(String::from)),
        }
    }

    pub fn name_or(&self, fallback: &str) -> String {
        self.name.clone().unwrap_or_else(|| fallback.to_string())
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn specialty_or(&self, fallback: &str) -> String {
        self.specialty
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn profile() -> Profile {
        Profile::new(Id::random(), Role::Patient)
            .with_display_name("jora")
            .with_user_name("jora_99")
            .with_avatar("https://cdn/jora.png")
    }

    #[test]
    fn should_prefer_full_name() {
        let card = Card::resolve(Some("Nguyễn Văn A".into()), Some(&profile()));

        assert_eq!(card.name_or(UNKNOWN_NAME), "Nguyễn Văn A");
        assert_eq!(card.avatar(), Some("https://cdn/jora.png"));
    }

    #[test]
    fn should_fall_back_to_display_name() {
        let card = Card::resolve(None, Some(&profile()));
        assert_eq!(card.name_or(UNKNOWN_NAME), "jora");
    }

    #[test]
    fn should_skip_blank_full_name() {
        let card = Card::resolve(Some("  ".into()), Some(&profile()));
        assert_eq!(card.name_or(UNKNOWN_NAME), "jora");
    }

    #[test]
    fn should_fall_back_to_user_name() {
        let p = Profile::new(Id::random(), Role::Doctor).with_user_name("dr_house");
        let card = Card::resolve(None, Some(&p));
        assert_eq!(card.name_or(DOCTOR_NAME), "dr_house");
    }

    #[test]
    fn should_use_fallback_when_nothing_resolved() {
        let card = Card::resolve(None, None);

        assert_eq!(card.name_or(DOCTOR_NAME), DOCTOR_NAME);
        assert_eq!(card.specialty_or(DEFAULT_SPECIALTY), DEFAULT_SPECIALTY);
        assert!(card.avatar().is_none());
    }
}
