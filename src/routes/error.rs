use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::services::auth::AuthError;
use crate::services::store::StoreError;
use crate::services::submission::SubmissionError;

/// Error body shared by every API endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        error: String,
        details: Option<String>,
    },
    Unauthorized(AuthError),
    NotFound(String),
    /// Logged server-side; the client only sees a generic message.
    Internal(String),
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>, details: Option<String>) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            details,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Unauthorized(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<SubmissionError> for ApiError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Invalid(details) => {
                ApiError::bad_request("Validation failed", Some(details))
            }
            SubmissionError::NoEmployees => ApiError::bad_request(e.to_string(), None),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::BadRequest { error, details } => {
                warn!(error = %error, details = ?details, "Rejected request");
                (StatusCode::BAD_REQUEST, error, details)
            }
            ApiError::Unauthorized(e) => {
                warn!(error = %e, "Unauthorized request");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None)
            }
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what, None),
            ApiError::Internal(e) => {
                error!(error = %e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process request".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error,
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::queue::QueueError;
    use uuid::Uuid;

    #[test]
    fn submission_errors_map_to_status_codes() {
        let cases = [
            (SubmissionError::Invalid("title".into()), StatusCode::BAD_REQUEST),
            (SubmissionError::NoEmployees, StatusCode::BAD_REQUEST),
            (
                SubmissionError::Schedule {
                    job_id: Uuid::new_v4(),
                    source: QueueError::Serialize(
                        serde_json::from_str::<u32>("x").unwrap_err(),
                    ),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                SubmissionError::JobCreation(StoreError::Database(sqlx::Error::PoolTimedOut)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                SubmissionError::RollbackFailed {
                    job_id: Uuid::new_v4(),
                    cause: Box::new(SubmissionError::TaskCreation {
                        job_id: Uuid::new_v4(),
                        source: StoreError::Database(sqlx::Error::PoolClosed),
                    }),
                    source: StoreError::Database(sqlx::Error::PoolTimedOut),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        let response = ApiError::from(AuthError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
