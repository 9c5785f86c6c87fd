use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use service::ConsultationService;

use crate::state::AppState;
use crate::{conversation, message, user};

mod handler;
pub mod model;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn ConsultationService + Send + Sync>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/messages", post(handler::api::send))
        .route("/messages/{conversation_id}", get(handler::api::find_messages))
        .route(
            "/messages/{conversation_id}/read",
            put(handler::api::mark_as_read),
        )
        .route("/conversations/group", post(handler::api::create_group))
        .route("/conversations/doctor", get(handler::api::doctor_inbox))
        .route(
            "/conversations/patient",
            get(handler::api::patient_conversations),
        )
        .route("/conversations/{id}/messages", post(handler::api::reply))
        .route("/conversations/{id}/leave", post(handler::api::leave_group))
        .with_state(s)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("patient {0} has no assigned doctor")]
    Unassigned(user::Id),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("conversation not found: {0}")]
    NotFound(conversation::Id),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _Conversation(#[from] conversation::Error),
    #[error(transparent)]
    _Message(#[from] message::Error),
}
