use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// What a one-time code authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    PasswordReset,
    AccountDeletion,
}

impl OtpPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            OtpPurpose::PasswordReset => "password_reset",
            OtpPurpose::AccountDeletion => "account_deletion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "password_reset" => Some(OtpPurpose::PasswordReset),
            "account_deletion" => Some(OtpPurpose::AccountDeletion),
            _ => None,
        }
    }
}

/// A stored one-time code. Code and reference number are kept as SHA-256 hex;
/// `reference_hash` stays empty until the code is verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRequest {
    pub id: Uuid,
    pub email: String,
    pub code_hash: String,
    pub purpose: OtpPurpose,
    pub reference_hash: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, max = 16, message = "is required"))]
    pub otp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceResponse {
    pub reference_no: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub reference_no: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmDeletionRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub reference_no: String,
}
