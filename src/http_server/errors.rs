//! HTTP error bodies

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::coordinator::CoordinatorError;

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,

    /// Machine-readable detail, e.g. `stale_version`
    pub code: String,

    /// Failure class: `conflict`, `validation`, `auth_expired`, ...
    pub kind: String,

    /// Form field for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: message.into(),
                code: "bad_request".to_string(),
                kind: "bad_request".to_string(),
                field: None,
            },
        }
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                code: err.code().to_string(),
                kind: err.kind().to_string(),
                field: err.field().map(str::to_string),
            },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
        let kind = match status {
            StatusCode::UNAUTHORIZED => "auth_expired",
            StatusCode::FORBIDDEN => "forbidden",
            _ => "auth",
        };
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                code: err.code().to_string(),
                kind: kind.to_string(),
                field: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::ConflictReason;
    use crate::review::{ReviewStatus, ValidationError};

    #[test]
    fn test_conflict_body() {
        let err = ApiError::from(CoordinatorError::Conflict(ConflictReason::HeldByOther));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.body.kind, "conflict");
        assert_eq!(err.body.code, "held_by_other");
        assert!(err.body.field.is_none());
    }

    #[test]
    fn test_validation_body_has_field() {
        let err = ApiError::from(CoordinatorError::Validation(ValidationError::MissingNote(
            ReviewStatus::Fds,
        )));
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.body.field.as_deref(), Some("reviewer_note"));

        let json = serde_json::to_value(&err.body).unwrap();
        assert_eq!(json["code"], "blocked:missing_comment");
    }

    #[test]
    fn test_auth_bodies() {
        let expired = ApiError::from(AuthError::TokenExpired);
        assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
        assert_eq!(expired.body.kind, "auth_expired");

        let forbidden = ApiError::from(AuthError::Forbidden);
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    }
}
