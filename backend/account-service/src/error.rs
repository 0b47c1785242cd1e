/// Error types for Account Service
///
/// Every failure a handler can return is an `AccountError`. Token authority and
/// session errors arrive here unchanged in kind; the HTTP mapping lives in the
/// `ResponseError` impl so use-case code never deals with status codes.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use crypto_core::jwt::TokenError;
use redis_utils::CacheError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccountError>;

/// One invalid input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid Email or Password.")]
    InvalidCredentials,

    #[error("Your account is not active yet, please verify your email.")]
    AccountNotVerified,

    #[error("Your account is already verified.")]
    AccountAlreadyVerified,

    #[error("Invalid verification code or user doesn't exists")]
    InvalidCode,

    #[error("You are not logged in")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    /// Signature was fine but the token id is no longer in the session cache
    #[error("Token is invalid or session has expired")]
    SessionExpired,

    /// Revocation found no cache entry to delete
    #[error("Token is invalid or session has expired")]
    NothingToRevoke,

    #[error("the user belonging to this token no longer exists")]
    TokenOwnerMissing,

    #[error("{0}")]
    Forbidden(String),

    #[error("No account found with that email or username")]
    AccountNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    NotFound(String),

    #[error("OTP code not found")]
    OtpNotFound,

    #[error("Reference number not found")]
    ReferenceNotFound,

    #[error("OTP code has expired")]
    OtpExpired,

    #[error("Unable to process, this account exists in the database")]
    AccountNotDeleted,

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Token signing error: {0}")]
    Signing(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AccountError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AccountError::Validation(vec![FieldError::new(field, message)])
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            AccountError::SessionStore(_)
                | AccountError::Signing(_)
                | AccountError::Database(_)
                | AccountError::Internal(_)
        )
    }
}

impl ResponseError for AccountError {
    fn status_code(&self) -> StatusCode {
        match self {
            AccountError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AccountError::BadRequest(_)
            | AccountError::InvalidCredentials
            | AccountError::AccountNotVerified
            | AccountError::AccountAlreadyVerified
            | AccountError::InvalidCode => StatusCode::BAD_REQUEST,
            AccountError::Conflict(_) => StatusCode::CONFLICT,
            AccountError::MissingToken
            | AccountError::InvalidToken
            | AccountError::SessionExpired
            | AccountError::NothingToRevoke
            | AccountError::TokenOwnerMissing => StatusCode::UNAUTHORIZED,
            AccountError::Forbidden(_) => StatusCode::FORBIDDEN,
            AccountError::AccountNotFound
            | AccountError::UserNotFound
            | AccountError::NotFound(_)
            | AccountError::OtpNotFound
            | AccountError::ReferenceNotFound => StatusCode::NOT_FOUND,
            AccountError::OtpExpired | AccountError::AccountNotDeleted => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AccountError::SessionStore(_)
            | AccountError::Signing(_)
            | AccountError::Database(_)
            | AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = if self.is_internal() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = serde_json::json!({
            "code": status.as_u16(),
            "message": message,
        });
        if let AccountError::Validation(errors) = self {
            body["errors"] = serde_json::json!(errors);
        }

        HttpResponse::build(status).json(body)
    }
}

// Conversions from external error types
impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        AccountError::Database(err.to_string())
    }
}

impl From<CacheError> for AccountError {
    fn from(err: CacheError) -> Self {
        AccountError::SessionStore(err.to_string())
    }
}

impl From<TokenError> for AccountError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidKey(msg) | TokenError::Signing(msg) => AccountError::Signing(msg),
            TokenError::Expired | TokenError::InvalidToken(_) => AccountError::InvalidToken,
        }
    }
}

impl From<validator::ValidationErrors> for AccountError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                let field = field.to_string();
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AccountError::Validation(fields)
    }
}
