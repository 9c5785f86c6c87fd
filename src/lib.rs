use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
pub mod consultation;
pub mod conversation;
pub mod error;
pub mod event;
pub mod integration;
pub mod message;
mod schema;
pub mod state;
pub mod user;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

/// Every route except `/health` requires a caller token.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/api", consultation::api(state.clone()))
        .merge(event::endpoints(state.clone()))
        .route_layer(from_fn_with_state(state, auth::middleware::authorize));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
}
