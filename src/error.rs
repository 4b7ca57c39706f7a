use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_valid::ValidRejection;
use service::{FieldErrors, ServiceError};
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::schemas::ErrorResponse;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The body, query string or path could not be parsed into the expected shape
    #[error("{0}")]
    MalformedRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl From<ValidRejection<ApiError>> for ApiError {
    fn from(rejection: ValidRejection<ApiError>) -> Self {
        match rejection {
            ValidRejection::Valid(errors) => ServiceError::Validation(field_errors(&errors)).into(),
            ValidRejection::Inner(inner) => inner,
        }
    }
}

fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();
    for (field, failures) in errors.field_errors() {
        let field: &str = field.as_ref();
        for failure in failures {
            let message = match &failure.message {
                Some(message) => message.to_string(),
                None => format!("Invalid value ({}).", failure.code),
            };
            fields.add(field, message);
        }
    }
    fields
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MalformedRequest(_) => (StatusCode::BAD_REQUEST, "MALFORMED_REQUEST"),
            ApiError::Service(err) => match err {
                ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                ServiceError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                ServiceError::NotAuthenticated(_) => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED"),
                ServiceError::AuthenticationFailed(_) => {
                    (StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED")
                }
                ServiceError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
                ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                ServiceError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                ServiceError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                ServiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let (message, fields) = match self {
            ApiError::Service(ServiceError::Validation(errors)) => {
                ("Invalid input.".to_string(), Some(errors.into_map()))
            }
            ApiError::Service(ServiceError::Database(ref db_error)) => {
                error!("Database error while handling request: {}", db_error);
                ("Internal server error".to_string(), None)
            }
            ApiError::Service(ServiceError::Internal(ref message)) => {
                error!("Internal error while handling request: {}", message);
                ("Internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        if status.is_client_error() {
            warn!(%status, code, "Request rejected: {}", message);
        }

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            success: false,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
