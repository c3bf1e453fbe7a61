// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::panic::Location;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::database::DatabaseError;
use crate::services::ServiceError;

/// Category of an API error; decides the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // 400 Bad Request
    BadRequest,
    Validation,
    // 401 Unauthorized
    Unauthorized,
    // 403 Forbidden
    Forbidden,
    // 404 Not Found
    NotFound,
    // 409 Conflict
    Conflict,
    // 500 Internal Server Error
    InternalServerError,
    // 503 Service Unavailable
    ServiceUnavailable,
}

/// HTTP API error with a client-safe message and the source location that raised it
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    field_errors: Option<BTreeMap<String, String>>,
    location: &'static Location<'static>,
}

impl ApiError {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: None,
            location: Location::caller(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self.kind {
            ErrorKind::BadRequest | ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::InternalServerError => 500,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        self.field_errors.as_ref()
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "type": self.error_code(),
            "message": self.message,
            "file": self.location.file(),
            "line": self.location.line(),
        });
        if let Some(field_errors) = &self.field_errors {
            error["field_errors"] = json!(field_errors);
        }
        json!({ "error": error })
    }
}

// Static constructor methods
impl ApiError {
    #[track_caller]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    #[track_caller]
    pub fn validation_error(message: impl Into<String>, field_errors: BTreeMap<String, String>) -> Self {
        let mut error = Self::new(ErrorKind::Validation, message);
        error.field_errors = Some(field_errors);
        error
    }

    #[track_caller]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    #[track_caller]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[track_caller]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    #[track_caller]
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    #[track_caller]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }
}

// Convert other error types to ApiError
impl From<AuthError> for ApiError {
    #[track_caller]
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::InvalidToken(detail) => {
                tracing::debug!("Rejected token: {}", detail);
                ApiError::unauthorized("Invalid token")
            }
            AuthError::AbsentToken
            | AuthError::ExpiredToken
            | AuthError::InvalidCredentials
            | AuthError::RefreshTooEarly { .. } => ApiError::unauthorized(err.to_string()),
            AuthError::InsufficientPrivileges { .. } => ApiError::forbidden(err.to_string()),
            AuthError::MissingSecret | AuthError::Signing(_) => {
                tracing::error!("Token issuance failed: {}", err);
                ApiError::internal_server_error("Unable to issue token")
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    #[track_caller]
    fn from(err: DatabaseError) -> Self {
        match &err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg.clone()),
            DatabaseError::UnknownColumn { column, .. } => {
                ApiError::bad_request(format!("Unknown field '{}'", column))
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::Io(_)) => {
                tracing::error!("Database unavailable: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            _ => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database error: {}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    #[track_caller]
    fn from(err: ConfigError) -> Self {
        tracing::error!("Configuration error while handling request: {}", err);
        ApiError::internal_server_error("Service misconfigured")
    }
}

impl From<ServiceError> for ApiError {
    #[track_caller]
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Auth(e) => ApiError::from(e),
            ServiceError::Database(e) => ApiError::from(e),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_carries_type_message_and_location() {
        let error = ApiError::unauthorized("Absent authorization token");
        let body = error.to_json();

        assert_eq!(body["error"]["type"], "UNAUTHORIZED");
        assert_eq!(body["error"]["message"], "Absent authorization token");
        assert_eq!(body["error"]["file"], file!());
        assert!(body["error"]["line"].as_u64().unwrap() > 0);
        assert_eq!(error.status_code(), 401);
    }

    #[test]
    fn validation_errors_list_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("/field".to_string(), "\"field\" is a required property".to_string());
        let body = ApiError::validation_error("Request body does not match schema", fields).to_json();
        assert_eq!(body["error"]["type"], "VALIDATION_ERROR");
        assert!(body["error"]["field_errors"]["/field"].is_string());
    }

    #[test]
    fn auth_errors_map_to_status_codes() {
        assert_eq!(ApiError::from(AuthError::AbsentToken).status_code(), 401);
        assert_eq!(ApiError::from(AuthError::ExpiredToken).status_code(), 401);
        let forbidden = ApiError::from(AuthError::InsufficientPrivileges { required: "admin".into() });
        assert_eq!(forbidden.status_code(), 403);
        assert!(forbidden.message().contains("Insufficient privileges"));
    }

    #[test]
    fn invalid_token_detail_is_not_leaked() {
        let error = ApiError::from(AuthError::InvalidToken("InvalidSignature at byte 12".into()));
        assert_eq!(error.message(), "Invalid token");
    }

    #[test]
    fn database_errors_hide_internals() {
        let error = ApiError::from(DatabaseError::Sqlx(sqlx::Error::RowNotFound));
        assert_eq!(error.status_code(), 500);
        assert!(!error.message().contains("RowNotFound"));
        assert_eq!(ApiError::from(DatabaseError::NotFound("dummy".into())).status_code(), 404);
    }
}
