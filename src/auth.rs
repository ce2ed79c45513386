use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request, StatusCode},
    response::{IntoResponse, Response},
    Json, RequestPartsExt as _,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejectionReason,
    TypedHeader,
};
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    api,
    app::SharedAppState,
    config,
    db::{self, user::Role},
};

/// Signs and verifies bearer tokens. Keys and the expiration window come
/// from configuration at startup; nothing here is process-global.
pub struct Tokens {
    expiration_time: std::time::Duration,
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
}

impl Tokens {
    pub fn new(config: &config::Jwt) -> Self {
        Self {
            expiration_time: config.expiration_time,
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
        }
    }

    pub fn issue(
        &self,
        user: &db::User,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let expires_at = OffsetDateTime::now_utc() + self.expiration_time;
        encode(
            &Header::default(),
            &AuthClaims {
                user_id: user.id,
                role: user.role,
                exp: expires_at.unix_timestamp(),
            },
            &self.encoding_key,
        )
    }

    pub fn verify(
        &self,
        token: &str,
    ) -> Result<AuthClaims, jsonwebtoken::errors::Error> {
        decode::<AuthClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
    }
}

/// Identity carried by a verified token: the subject and its role claim.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    pub user_id: db::user::Id,
    pub role: Role,
    pub exp: i64,
}

impl AuthClaims {
    /// Exact-equality role check. There is no hierarchy: a `SuperAdmin`
    /// claim does not satisfy a route requiring `Admin`.
    pub fn require_role(&self, required: Role) -> Result<(), AuthError> {
        if self.role == required {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|e| match e.reason() {
                TypedHeaderRejectionReason::Missing => {
                    AuthError::Unauthenticated
                }
                _ => AuthError::InvalidToken,
            })?;

        state
            .tokens
            .verify(bearer.token())
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum AuthError {
    /// No credentials at all, as opposed to bad ones.
    Unauthenticated,
    InvalidToken,
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "No token provided")
            }
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Access denied"),
        };
        (status, Json(api::Message::new(message))).into_response()
    }
}
