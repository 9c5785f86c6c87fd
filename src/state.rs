use std::sync::Arc;

use axum::extract::FromRef;
use log::info;

use crate::consultation::service::ConsultationServiceImpl;
use crate::conversation::repository::PgConversationRepository;
use crate::event::service::{LocalEventService, NatsEventService};
use crate::event::typing;
use crate::integration;
use crate::message::repository::PgMessageRepository;
use crate::user::repository::PgUserRepository;
use crate::user::service::UserServiceImpl;
use crate::{auth, consultation, event, user};

#[derive(Clone)]
pub struct AppState {
    auth_service: auth::Service,
    consultation_service: consultation::Service,
    event_service: event::Service,
    typing: typing::Config,
}

impl AppState {
    pub fn new(
        auth_service: auth::Service,
        consultation_service: consultation::Service,
        event_service: event::Service,
        typing: typing::Config,
    ) -> Self {
        Self {
            auth_service,
            consultation_service,
            event_service,
            typing,
        }
    }

    pub async fn init(config: &integration::Config) -> crate::Result<Self> {
        let pool = config.pg.connect()?;

        let redis = match &config.redis {
            Some(redis) => Some(redis.connect().await?),
            None => None,
        };

        let event_service: event::Service = match &config.pubsub {
            Some(pubsub) => Arc::new(NatsEventService::new(pubsub.connect().await)),
            None => {
                info!("Using in-process event bus");
                Arc::new(LocalEventService::default())
            }
        };

        let user_service: user::Service = Arc::new(UserServiceImpl::new(
            Arc::new(PgUserRepository::new(pool.clone())),
            redis,
            config.profile_ttl,
        ));

        let consultation_service = Arc::new(ConsultationServiceImpl::new(
            Arc::new(PgConversationRepository::new(pool.clone())),
            Arc::new(PgMessageRepository::new(pool)),
            user_service,
        ));

        Ok(Self::new(
            Arc::new(auth::service::AuthServiceImpl::new(&config.jwt_secret)),
            consultation_service,
            event_service,
            config.typing,
        ))
    }
}

impl FromRef<AppState> for auth::Service {
    fn from_ref(s: &AppState) -> Self {
        s.auth_service.clone()
    }
}

impl FromRef<AppState> for consultation::Service {
    fn from_ref(s: &AppState) -> Self {
        s.consultation_service.clone()
    }
}

impl FromRef<AppState> for event::Service {
    fn from_ref(s: &AppState) -> Self {
        s.event_service.clone()
    }
}

impl FromRef<AppState> for typing::Config {
    fn from_ref(s: &AppState) -> Self {
        s.typing
    }
}
