/// Application Error Handling
///
/// One error type flows through the whole service:
/// 1. Domain errors raised by the session lifecycle (validation, credentials, tokens)
/// 2. Infrastructure errors (hashing engine, user store, revocation store)
/// 3. HTTP response mapping with structured logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for caller-supplied input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(&'static str),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(&'static str, usize),
    #[error("{0} is too long (maximum {1} bytes)")]
    TooLong(&'static str, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(&'static str),
    #[error("password must contain an uppercase letter, a lowercase letter, a digit and a symbol")]
    WeakPassword,
    #[error("passwords do not match")]
    PasswordMismatch,
}

/// Why a token was refused.
///
/// Never shown to clients, all variants surface as the same `InvalidToken`
/// response. Kept apart so logs and tests can tell a revoked token from a
/// forged one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token class")]
    WrongClass,
    #[error("token revoked")]
    Revoked,
}

/// Persistence failures reported by the user and revocation stores
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("duplicate entry: {0}")]
    Conflict(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // 23505: unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return StorageError::Conflict(db_err.message().to_string());
            }
        }
        StorageError::Backend(err.to_string())
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Email already registered")]
    Duplicate,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(TokenRejection),
    #[error("User not found")]
    UserNotFound,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the failure is attributable to the caller rather than to
    /// the service's own infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::Duplicate
                | AppError::InvalidCredentials
                | AppError::MissingToken
                | AppError::InvalidToken(_)
                | AppError::UserNotFound
        )
    }
}

impl From<TokenRejection> for AppError {
    fn from(reason: TokenRejection) -> Self {
        AppError::InvalidToken(reason)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let status = ResponseError::status_code(self);
        let (code, message) = match self {
            AppError::Validation(e) => ("VALIDATION_ERROR", e.to_string()),
            AppError::Duplicate => ("DUPLICATE_ENTRY", self.to_string()),
            AppError::InvalidCredentials => ("INVALID_CREDENTIALS", self.to_string()),
            AppError::MissingToken => ("MISSING_TOKEN", self.to_string()),
            // Rejection reason stays in the logs
            AppError::InvalidToken(_) => ("TOKEN_INVALID", "Invalid or expired token".to_string()),
            AppError::UserNotFound => ("NOT_FOUND", self.to_string()),
            AppError::Storage(_) => (
                "SERVICE_UNAVAILABLE",
                "Storage service temporarily unavailable".to_string(),
            ),
            AppError::Hashing(_) | AppError::Internal(_) => {
                ("INTERNAL_ERROR", "Internal server error".to_string())
            }
            AppError::Config(_) => ("CONFIG_ERROR", "Server configuration error".to_string()),
        };

        let error_response =
            ErrorResponse::new(request_id.to_string(), message, code.to_string(), status.as_u16());

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::InvalidToken(reason) => {
                tracing::warn!(request_id = request_id, reason = %reason, "Token rejected");
            }
            AppError::InvalidCredentials => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            e if e.is_client_error() => {
                tracing::warn!(request_id = request_id, error = %e, "Request rejected");
            }
            e => {
                tracing::error!(request_id = request_id, error = %e, "Request failed");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Duplicate => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::MissingToken | AppError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Hashing(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Request-scoped context attached to lifecycle log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        if error.is_client_error() {
            tracing::warn!(
                request_id = %self.request_id,
                operation = %self.operation,
                user_id = ?self.user_id,
                error = %error,
                "Operation rejected"
            );
        } else {
            tracing::error!(
                request_id = %self.request_id,
                operation = %self.operation,
                user_id = ?self.user_id,
                error = %error,
                "Operation failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email");
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = ValidationError::InvalidFormat("email").into();
        assert!(matches!(app_err, AppError::Validation(_)));

        let app_err: AppError = TokenRejection::Revoked.into();
        assert!(matches!(app_err, AppError::InvalidToken(TokenRejection::Revoked)));
    }

    #[test]
    fn test_invalid_token_hides_reason() {
        let forged = AppError::InvalidToken(TokenRejection::BadSignature);
        let revoked = AppError::InvalidToken(TokenRejection::Revoked);

        let (status_a, body_a) = ErrorHandler::error_response(&forged, "req-1");
        let (status_b, body_b) = ErrorHandler::error_response(&revoked, "req-2");

        assert_eq!(status_a, StatusCode::UNAUTHORIZED);
        assert_eq!(status_a, status_b);
        assert_eq!(body_a.message, body_b.message);
        assert_eq!(body_a.code, body_b.code);
    }

    #[test]
    fn test_infrastructure_errors_are_not_client_errors() {
        assert!(!AppError::Storage(StorageError::Backend("down".into())).is_client_error());
        assert!(!AppError::Hashing("exhausted".into()).is_client_error());
        assert!(AppError::InvalidCredentials.is_client_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Storage(StorageError::Backend("x".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Validation(ValidationError::WeakPassword).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("test_operation");
        assert_eq!(ctx.operation, "test_operation");
        assert!(ctx.user_id.is_none());

        let ctx_with_user = ctx.with_user_id("user-123".to_string());
        assert_eq!(ctx_with_user.user_id, Some("user-123".to_string()));
    }
}
