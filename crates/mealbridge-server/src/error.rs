use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use mealbridge_engine::EngineError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many claim attempts, slow down")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ServerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound => ServerError::NotFound("no such record".to_string()),
            EngineError::Validation(v) => ServerError::BadRequest(v.to_string()),
            EngineError::OwnDonation => {
                ServerError::Forbidden("you cannot claim your own donation".to_string())
            }
            EngineError::NotOwner => {
                ServerError::Forbidden("only the posting donor may cancel".to_string())
            }
            EngineError::Stale { actual } => {
                ServerError::Conflict(format!("donation is already {actual}"))
            }
            EngineError::Storage(e) => ServerError::Internal(e.to_string()),
            EngineError::Task(e) => ServerError::Internal(e),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealbridge_shared::DonationState;

    #[test]
    fn engine_errors_map_to_statuses() {
        let e: ServerError = EngineError::NotFound.into();
        assert!(matches!(e, ServerError::NotFound(_)));

        let e: ServerError = EngineError::OwnDonation.into();
        assert!(matches!(e, ServerError::Forbidden(_)));

        let e: ServerError = EngineError::Stale {
            actual: DonationState::Claimed,
        }
        .into();
        match e {
            ServerError::Conflict(msg) => assert!(msg.contains("claimed")),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }
}
