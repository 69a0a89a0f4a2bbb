/// Error handling for the API server
///
/// Every handler returns `Result<T, ApiError>`. Component errors from
/// `camp_shared` convert into `ApiError` with `?`, which fixes the HTTP
/// status for each failure in one place:
///
/// | Failure | Status |
/// |---|---|
/// | missing/invalid credential, unknown identity, bad refresh token, wrong password | 401 |
/// | not a member, insufficient role | 403 |
/// | resource or user not found | 404 |
/// | malformed id, invalid or expired link token, weak password | 400 |
/// | already registered, already verified | 409 |
/// | request field validation | 422 |
/// | store, hashing, signing or mail failure | 500 |
///
/// The body is always `{ "error": code, "message": text }`; 500 responses
/// carry a generic message and the details go to the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use camp_shared::{
    auth::{
        authorization::AuthzError, guard::AuthError, jwt::JwtError, lifecycle::LifecycleError,
        password::PasswordError,
    },
    mail::MailError,
    store::StoreError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Unprocessable entity (422)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Per-field validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => ApiError::Conflict(format!("Already exists: {}", what)),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(e) => e.into(),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::MalformedResourceId { .. } => ApiError::BadRequest(err.to_string()),
            AuthzError::ResourceNotFound(_) => ApiError::NotFound(err.to_string()),
            AuthzError::NotAMember | AuthzError::InsufficientRole => {
                ApiError::Forbidden(err.to_string())
            }
            AuthzError::Store(e) => e.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(msg) => ApiError::BadRequest(msg),
            other => ApiError::InternalError(format!("Password operation failed: {}", other)),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Encode(msg) => ApiError::InternalError(format!("Token signing failed: {}", msg)),
            _ => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::AlreadyExists | LifecycleError::AlreadyVerified => {
                ApiError::Conflict(err.to_string())
            }
            LifecycleError::UserNotFound => ApiError::NotFound(err.to_string()),
            LifecycleError::InvalidCredentials | LifecycleError::InvalidRefreshToken => {
                ApiError::Unauthorized(err.to_string())
            }
            LifecycleError::TokenInvalidOrExpired => ApiError::BadRequest(err.to_string()),
            LifecycleError::Password(e) => e.into(),
            LifecycleError::Jwt(e) => e.into(),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camp_shared::auth::authorization::ResourceKind;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_authz_statuses() {
        let cases = [
            (
                AuthzError::MalformedResourceId {
                    kind: ResourceKind::Task,
                    raw: "x".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (AuthzError::ResourceNotFound(ResourceKind::Subtask), StatusCode::NOT_FOUND),
            (AuthzError::NotAMember, StatusCode::FORBIDDEN),
            (AuthzError::InsufficientRole, StatusCode::FORBIDDEN),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_lifecycle_statuses() {
        let cases = [
            (LifecycleError::AlreadyExists, StatusCode::CONFLICT),
            (LifecycleError::AlreadyVerified, StatusCode::CONFLICT),
            (LifecycleError::UserNotFound, StatusCode::NOT_FOUND),
            (LifecycleError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (LifecycleError::InvalidRefreshToken, StatusCode::UNAUTHORIZED),
            (LifecycleError::TokenInvalidOrExpired, StatusCode::BAD_REQUEST),
            (
                LifecycleError::Password(PasswordError::Weak("too short".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                LifecycleError::Store(StoreError::Internal("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_auth_errors_are_unauthorized() {
        assert_eq!(
            ApiError::from(AuthError::MissingCredential).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidCredential(JwtError::Expired)).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::IdentityNotFound).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let response = ApiError::InternalError("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
