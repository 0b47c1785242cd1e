//! Account lifecycle use cases.
//!
//! Orchestrates the credential store, the session manager and the OTP manager.
//! Email delivery is always detached; a mutation that succeeded is never turned
//! into an error by a failed send.

use crate::config::AccountSettings;
use crate::db::CredentialStore;
use crate::error::{AccountError, Result};
use crate::models::user::{ROLE_ADMIN, ROLE_USER};
use crate::models::{
    ChangePasswordRequest, OtpPurpose, Page, PageParams, ProfileStatus, RegisterRequest,
    ResetPasswordRequest, TokenPair, UpdateProfileRequest, User, UserProfile,
};
use crate::security::codes::verification_code;
use crate::security::{
    ensure_passwords_match, hash_password, verify_password, AuthenticatedUser, OtpManager,
    SessionManager,
};
use crate::services::email::{mask_email, EmailDispatcher};
use chrono::Utc;
use crypto_core::sha256_hex;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

/// Emails and usernames are compared trimmed and lower-cased
pub fn normalize_identity(value: &str) -> String {
    value.trim().to_lowercase()
}

pub struct AccountService {
    users: Arc<dyn CredentialStore>,
    sessions: Arc<SessionManager>,
    otp: Arc<OtpManager>,
    mailer: EmailDispatcher,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        sessions: Arc<SessionManager>,
        otp: Arc<OtpManager>,
        mailer: EmailDispatcher,
        settings: AccountSettings,
    ) -> Self {
        Self {
            users,
            sessions,
            otp,
            mailer,
            settings,
        }
    }

    /// Create an unverified account and email its verification link.
    pub async fn register(&self, mut request: RegisterRequest) -> Result<User> {
        request.username = normalize_identity(&request.username);
        request.email = normalize_identity(&request.email);
        request.validate()?;
        ensure_passwords_match(&request.password, &request.password_confirm)?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AccountError::Conflict("Email already exists".to_string()));
        }
        if self.users.find_by_username(&request.username).await?.is_some() {
            return Err(AccountError::Conflict("Username already exists".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let code = verification_code();
        let is_admin = self.settings.is_admin_username(&request.username);
        let now = Utc::now();

        let user = User {
            id: Uuid::new_v4(),
            username: request.username,
            email: request.email,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            password_hash,
            is_verified: false,
            verification_code: Some(sha256_hex(&code)),
            verified_at: None,
            is_staff: is_admin,
            is_superuser: is_admin,
            last_login_at: None,
            last_login_ip: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            profile: UserProfile::pending(if is_admin { ROLE_ADMIN } else { ROLE_USER }),
        };

        // Uniqueness is enforced again by the store for concurrent registrations
        self.users.create(&user).await?;

        info!(user_id = %user.id, email = %mask_email(&user.email), "user registered");
        self.mailer
            .send_verification(&user.email, &user.username, &code);

        Ok(user)
    }

    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        let email = normalize_identity(email);
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::AccountNotFound)?;

        if user.is_verified {
            return Err(AccountError::AccountAlreadyVerified);
        }

        let code = verification_code();
        user.verification_code = Some(sha256_hex(&code));
        self.users.save(&user).await?;

        info!(user_id = %user.id, "verification code reissued");
        self.mailer
            .send_verification(&user.email, &user.username, &code);
        Ok(())
    }

    pub async fn verify_email(&self, code: &str) -> Result<User> {
        let mut user = self
            .users
            .find_by_verification_code(&sha256_hex(code.trim()))
            .await?
            .ok_or(AccountError::InvalidCode)?;

        if user.is_verified {
            return Err(AccountError::AccountAlreadyVerified);
        }

        user.is_verified = true;
        user.verification_code = None;
        user.verified_at = Some(Utc::now());
        user.profile.status = ProfileStatus::Active;
        self.users.save(&user).await?;

        info!(user_id = %user.id, "email verified");
        Ok(user)
    }

    /// Authenticate by username or email and open a session.
    pub async fn login(
        &self,
        identity: &str,
        password: &str,
        client_ip: Option<String>,
    ) -> Result<(User, TokenPair)> {
        let identity = normalize_identity(identity);
        let mut user = self
            .users
            .find_by_identity(&identity)
            .await?
            .ok_or(AccountError::AccountNotFound)?;

        if !user.is_verified {
            return Err(AccountError::AccountNotVerified);
        }

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let now = Utc::now();
        self.users.record_login(user.id, now, client_ip.clone()).await?;
        user.last_login_at = Some(now);
        user.last_login_ip = client_ip;

        let pair = self.sessions.issue_pair(user.id).await?;
        info!(user_id = %user.id, "user logged in");
        Ok((user, pair))
    }

    pub async fn logout(&self, caller: &AuthenticatedUser) -> Result<()> {
        self.sessions.revoke(&caller.token_id, caller.id()).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.sessions.refresh(refresh_token).await
    }

    pub async fn change_password(&self, user: &User, request: ChangePasswordRequest) -> Result<()> {
        request.validate()?;
        ensure_passwords_match(&request.password, &request.password_confirm)?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AccountError::InvalidCredentials);
        }

        let mut updated = user.clone();
        updated.password_hash = hash_password(&request.password)?;
        self.users.save(&updated).await?;

        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Email a password reset code to a live account.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let email = normalize_identity(email);
        if self.users.find_by_email(&email).await?.is_none() {
            return Err(AccountError::AccountNotFound);
        }
        self.otp.request_otp(&email, OtpPurpose::PasswordReset).await
    }

    pub async fn verify_reset_otp(&self, code: &str) -> Result<String> {
        self.otp.verify_otp(code, OtpPurpose::PasswordReset).await
    }

    /// Set a new password using a verified reference number. Every OTP issued
    /// for the email is purged afterwards, so the reference works once.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<()> {
        request.validate()?;
        ensure_passwords_match(&request.password, &request.password_confirm)?;

        let email = self
            .otp
            .consume_by_reference(&request.reference_no, OtpPurpose::PasswordReset)
            .await?;

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::AccountNotFound)?;

        user.password_hash = hash_password(&request.password)?;
        self.users.save(&user).await?;
        self.otp.purge_all_for_email(&email).await?;

        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    pub async fn update_profile(&self, user: &User, request: UpdateProfileRequest) -> Result<User> {
        request.validate()?;

        let mut updated = user.clone();
        if let Some(first_name) = request.first_name {
            updated.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            updated.last_name = last_name.trim().to_string();
        }
        if let Some(phone) = request.phone {
            updated.profile.phone = Some(phone);
        }
        if let Some(photo) = request.photo {
            updated.profile.photo = Some(photo);
        }
        if let Some(birthday) = request.birthday {
            updated.profile.birthday = Some(birthday);
        }

        self.users.save(&updated).await?;
        updated.updated_at = Utc::now();
        Ok(updated)
    }

    pub async fn request_account_deletion(&self, user: &User) -> Result<()> {
        ensure_deletable(user)?;
        self.otp
            .request_otp(&user.email, OtpPurpose::AccountDeletion)
            .await
    }

    /// Exchange a deletion code for a reference number.
    ///
    /// Only codes issued to `user`'s own email are accepted.
    pub async fn verify_deletion_otp(&self, user: &User, code: &str) -> Result<String> {
        self.otp
            .verify_otp_for(code, OtpPurpose::AccountDeletion, &user.email)
            .await
    }

    /// Soft-delete the caller's account after the deletion OTP was verified.
    ///
    /// The reference must have been issued for the caller's own email.
    pub async fn delete_account(&self, caller: &AuthenticatedUser, reference_no: &str) -> Result<()> {
        let email = self
            .otp
            .consume_by_reference(reference_no, OtpPurpose::AccountDeletion)
            .await?;

        if email != caller.user.email {
            warn!(user_id = %caller.id(), "deletion reference belongs to another account");
            return Err(AccountError::Forbidden(
                "This reference number was not issued for your account".to_string(),
            ));
        }
        ensure_deletable(&caller.user)?;

        self.users.soft_delete(caller.id()).await?;
        self.otp.purge_all_for_email(&email).await?;

        if let Err(e) = self.sessions.revoke_all(caller.id()).await {
            warn!(user_id = %caller.id(), error = %e, "session revocation after account deletion failed");
        }

        info!(user_id = %caller.id(), "account soft-deleted by owner");
        Ok(())
    }

    pub async fn list_users(&self, params: &PageParams) -> Result<Page<User>> {
        self.users.list(params).await
    }

    pub async fn soft_delete_user(&self, id: Uuid) -> Result<()> {
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        ensure_deletable(&user)?;

        self.users.soft_delete(id).await?;
        if let Err(e) = self.sessions.revoke_all(id).await {
            warn!(user_id = %id, error = %e, "session revocation after account deletion failed");
        }
        info!(user_id = %id, "account soft-deleted by staff");
        Ok(())
    }

    /// Bring back the most recently deleted account for `email`.
    pub async fn restore_user(&self, email: &str) -> Result<User> {
        let email = normalize_identity(email);

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AccountError::AccountNotDeleted);
        }

        let deleted = self
            .users
            .find_deleted_by_email(&email)
            .await?
            .ok_or_else(|| AccountError::NotFound("No deleted account found with that email".to_string()))?;

        // Sessions that outlived the deletion must not come back with the account.
        self.sessions.revoke_all(deleted.id).await?;
        self.users.restore(deleted.id).await?;
        info!(user_id = %deleted.id, "account restored");

        self.users
            .find_by_id(deleted.id)
            .await?
            .ok_or(AccountError::UserNotFound)
    }

    pub async fn permanent_delete_user(&self, id: Uuid) -> Result<()> {
        let user = self
            .users
            .find_any_by_id(id)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        ensure_deletable(&user)?;

        self.users.permanent_delete(id).await?;
        if let Err(e) = self.sessions.revoke_all(id).await {
            warn!(user_id = %id, error = %e, "session revocation after account deletion failed");
        }
        info!(user_id = %id, "account permanently deleted");
        Ok(())
    }
}

fn ensure_deletable(user: &User) -> Result<()> {
    if user.is_privileged() {
        return Err(AccountError::Forbidden(
            "Staff and superuser accounts cannot be deleted".to_string(),
        ));
    }
    Ok(())
}
