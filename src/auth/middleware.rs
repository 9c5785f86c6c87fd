use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use log::debug;
use serde::Deserialize;

use crate::auth::{self, Token};

impl From<auth::Error> for StatusCode {
    fn from(e: auth::Error) -> Self {
        match e {
            auth::Error::Unauthenticated | auth::Error::TokenMalformed => Self::UNAUTHORIZED,
        }
    }
}

/// Browsers cannot set headers on a websocket handshake, so the token may
/// also arrive as a `token` query parameter.
#[derive(Deserialize)]
pub struct TokenParams {
    token: Option<String>,
}

pub async fn authorize(
    auth_service: State<auth::Service>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(params): Query<TokenParams>,
    mut req: Request,
    next: Next,
) -> crate::Result<Response> {
    let token = bearer
        .map(|TypedHeader(Authorization(b))| b.token().to_string())
        .or(params.token)
        .map(Token::new)
        .ok_or(auth::Error::Unauthenticated)?;

    let auth_user = auth_service.validate(&token).await?;
    debug!("Authorized {auth_user:?}");

    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}
