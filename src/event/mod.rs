use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;
use crate::{consultation, conversation, user};

mod context;
mod handler;
pub mod model;
pub mod notify;
pub mod service;
pub mod typing;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn service::EventService + Send + Sync>;

pub fn endpoints<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/ws", get(handler::ws))
        .with_state(state)
}

/// Addressable channels of the bus: one per user, one per conversation room.
#[derive(Clone, Copy, Debug)]
pub enum Subject<'a> {
    Notifications(&'a user::Id),
    Conversation(&'a conversation::Id),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("conversation {0} is not joined")]
    NotJoined(conversation::Id),

    #[error(transparent)]
    _Consultation(#[from] consultation::Error),
    #[error(transparent)]
    _Axum(#[from] axum::Error),
    #[error(transparent)]
    _SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    _NatsPublish(#[from] async_nats::PublishError),
    #[error(transparent)]
    _NatsSubscribe(#[from] async_nats::SubscribeError),
}
