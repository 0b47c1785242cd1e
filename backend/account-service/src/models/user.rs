use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Profile lifecycle status; stored as a small integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Active,
    Inactive,
    Pending,
}

impl ProfileStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            ProfileStatus::Active => 1,
            ProfileStatus::Inactive => 2,
            ProfileStatus::Pending => 3,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(ProfileStatus::Active),
            2 => Some(ProfileStatus::Inactive),
            3 => Some(ProfileStatus::Pending),
            _ => None,
        }
    }
}

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// 1:1 extension of a user, saved together with it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub phone: Option<String>,
    pub photo: Option<String>,
    pub role: String,
    pub status: ProfileStatus,
    pub birthday: Option<NaiveDate>,
}

impl UserProfile {
    pub fn pending(role: &str) -> Self {
        Self {
            phone: None,
            photo: None,
            role: role.to_string(),
            status: ProfileStatus::Pending,
            birthday: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_verified: bool,
    /// SHA-256 hex of the emailed verification code, cleared on verification
    pub verification_code: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub profile: UserProfile,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Staff and superusers cannot be deleted through the API
    pub fn is_privileged(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Public projection of a user
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_verified: bool,
    pub is_staff: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub profile: UserProfile,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_verified: user.is_verified,
            is_staff: user.is_staff,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            deleted_at: user.deleted_at,
            profile: user.profile.clone(),
        }
    }
}

fn validate_username(value: &str) -> Result<(), ValidationError> {
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("username")
            .with_message("may only contain letters, digits, '_' and '.'".into()))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "must be between 3 and 50 characters"))]
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email
    #[validate(length(min = 1, message = "is required"))]
    pub identity: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(min = 5, max = 20, message = "must be between 5 and 20 characters"))]
    pub phone: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub photo: Option<String>,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RestoreUserRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}
