use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::integration::cache;

use super::model::{Card, Profile};
use super::{Id, Repository};

#[async_trait]
pub trait UserService {
    async fn find_profile(&self, id: &Id) -> Option<Profile>;

    async fn find_patient_full_name(&self, id: &Id) -> Option<String>;

    async fn find_card(&self, id: &Id) -> Card;

    async fn find_assigned_doctor(&self, patient: &Id) -> super::Result<Option<Id>>;

    async fn is_assigned(&self, patient: &Id, doctor: &Id) -> super::Result<bool> {
        let assigned = self.find_assigned_doctor(patient).await?;
        Ok(assigned.as_ref() == Some(doctor))
    }
}

#[derive(Clone)]
pub struct UserServiceImpl {
    repo: Repository,
    redis: Option<cache::Redis>,
    ttl: Duration,
}

impl UserServiceImpl {
    pub fn new(repo: Repository, redis: Option<cache::Redis>, ttl: Duration) -> Self {
        Self { repo, redis, ttl }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn find_profile(&self, id: &Id) -> Option<Profile> {
        match self.repo.find_profile(id) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to resolve profile of {id}: {e:?}");
                None
            }
        }
    }

    async fn find_patient_full_name(&self, id: &Id) -> Option<String> {
        match self.repo.find_patient_full_name(id) {
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to resolve full name of {id}: {e:?}");
                None
            }
        }
    }

    async fn find_card(&self, id: &Id) -> Card {
        if let Some(redis) = &self.redis {
            if let Some(card) = redis.json_get::<Card>(cache::Key::Card(id)).await {
                return card;
            }
        }

        let profile = self.find_profile(id).await;
        let full_name = self.find_patient_full_name(id).await;
        let card = Card::resolve(full_name, profile.as_ref());

        match (&self.redis, &profile) {
            (Some(redis), Some(_)) => {
                redis
                    .json_set_ex(cache::Key::Card(id), &card, self.ttl)
                    .await
            }
            (_, None) => debug!("No profile found for {id}, card is not cached"),
            _ => {}
        }

        card
    }

    async fn find_assigned_doctor(&self, patient: &Id) -> super::Result<Option<Id>> {
        self.repo.find_assigned_doctor(patient)
    }
}
