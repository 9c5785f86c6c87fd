use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};
use serde::Serialize;

use crate::{auth, consultation, event, integration};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _Auth(#[from] auth::Error),
    #[error(transparent)]
    _Consultation(#[from] consultation::Error),
    #[error(transparent)]
    _Event(#[from] event::Error),
    #[error(transparent)]
    _Integration(#[from] integration::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let message = self.to_string();
        let status = match self {
            Self::_Auth(e) => StatusCode::from(e),
            Self::_Consultation(e) => StatusCode::from(e),
            Self::_Event(_) | Self::_Integration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            error!("{message}");
            "Internal server error".to_owned()
        } else {
            warn!("{status}: {message}");
            message
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}
