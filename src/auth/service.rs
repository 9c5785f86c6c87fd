use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use log::{debug, warn};

use crate::user;

use super::{Token, TokenClaims, User};

#[async_trait]
pub trait AuthService {
    async fn validate(&self, token: &Token) -> super::Result<User>;
}

#[derive(Clone)]
pub struct AuthServiceImpl {
    decoding_key: Arc<DecodingKey>,
    jwt_validator: Arc<Validation>,
}

impl AuthServiceImpl {
    pub fn new(secret: &str) -> Self {
        let jwt_validator = {
            let mut v = Validation::new(Algorithm::HS256);
            v.set_required_spec_claims(&["exp", "sub"]);
            v
        };

        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            jwt_validator: Arc::new(jwt_validator),
        }
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn validate(&self, token: &Token) -> super::Result<User> {
        let claims = decode::<TokenClaims>(token.raw(), &self.decoding_key, &self.jwt_validator)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("Failed to decode {token:?}: {e:?}");
                super::Error::TokenMalformed
            })?;

        let role = user::Role::normalize(&claims.role);
        debug!("Resolved caller {} as {role}", claims.sub);

        Ok(User::new(claims.sub, role))
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, id: &user::Id, role: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let claims = TokenClaims {
        sub: *id,
        role: role.to_string(),
        exp: jsonwebtoken::get_current_timestamp() + 3600,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
