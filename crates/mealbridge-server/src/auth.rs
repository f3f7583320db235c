//! Authenticated-identity extraction.
//!
//! Authentication itself lives upstream (reverse proxy / gateway); the
//! contract with this service is a single trusted header carrying the
//! authenticated user's UUID. The core never sees tokens or credentials.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use mealbridge_shared::UserId;

use crate::error::ServerError;

/// Header the upstream auth layer injects after verifying the caller.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for endpoints that require an authenticated caller.
pub struct AuthUser(pub UserId);

/// Extractor for endpoints where identity is optional (public listings).
/// A present-but-malformed header is still rejected.
pub struct MaybeUser(pub Option<UserId>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match user_id_from_headers(&parts.headers)? {
            Some(id) => Ok(AuthUser(id)),
            None => Err(ServerError::Unauthorized(format!(
                "missing {USER_ID_HEADER} header"
            ))),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(user_id_from_headers(&parts.headers)?))
    }
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<Option<UserId>, ServerError> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let text = value.to_str().map_err(|_| {
        ServerError::Unauthorized(format!("{USER_ID_HEADER} header is not valid text"))
    })?;

    let uuid = Uuid::parse_str(text.trim()).map_err(|_| {
        ServerError::Unauthorized(format!("{USER_ID_HEADER} header is not a valid UUID"))
    })?;

    Ok(Some(UserId(uuid)))
}
