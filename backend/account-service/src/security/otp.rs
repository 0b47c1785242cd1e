//! OTP Manager: time-boxed codes that gate password reset and account deletion.
//!
//! A code is emailed, verified once in exchange for a wider reference number,
//! and the reference number authorizes the final action. Codes and references
//! are stored as SHA-256 digests.

use crate::config::OtpSettings;
use crate::db::OtpStore;
use crate::error::{AccountError, Result};
use crate::models::{OtpPurpose, OtpRequest};
use crate::security::codes::numeric_code;
use crate::services::email::{mask_email, EmailDispatcher};
use chrono::{DateTime, TimeDelta, Utc};
use crypto_core::sha256_hex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

fn seconds(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
}

pub struct OtpManager {
    store: Arc<dyn OtpStore>,
    mailer: EmailDispatcher,
    settings: OtpSettings,
}

impl OtpManager {
    pub fn new(store: Arc<dyn OtpStore>, mailer: EmailDispatcher, settings: OtpSettings) -> Self {
        Self {
            store,
            mailer,
            settings,
        }
    }

    fn expiry(&self) -> Duration {
        Duration::from_secs(self.settings.expiry_secs)
    }

    /// Earliest of the absolute expiry and the usable window. A window past
    /// the representable range does not narrow the expiry.
    fn usable_until(&self, request: &OtpRequest) -> DateTime<Utc> {
        let window_end = seconds(self.settings.usable_window_secs)
            .and_then(|window| request.created_at.checked_add_signed(window));

        match window_end {
            Some(end) => request.expires_at.min(end),
            None => request.expires_at,
        }
    }

    fn ensure_usable(&self, request: &OtpRequest) -> Result<()> {
        if Utc::now() >= self.usable_until(request) {
            return Err(AccountError::OtpExpired);
        }
        Ok(())
    }

    /// Store a new code for `email` and email it.
    ///
    /// Delivery runs detached; a failed send leaves the stored code in place.
    pub async fn request_otp(&self, email: &str, purpose: OtpPurpose) -> Result<()> {
        let now = Utc::now();
        let expires_at = seconds(self.settings.expiry_secs)
            .and_then(|expiry| now.checked_add_signed(expiry))
            .ok_or_else(|| {
                AccountError::Internal(format!(
                    "OTP expiry of {}s is out of range",
                    self.settings.expiry_secs
                ))
            })?;
        let code = numeric_code(self.settings.code_length);

        let request = OtpRequest {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code_hash: sha256_hex(&code),
            purpose,
            reference_hash: None,
            expires_at,
            created_at: now,
        };
        self.store.create(&request).await?;

        info!(
            email = %mask_email(email),
            purpose = purpose.as_str(),
            "OTP issued"
        );

        self.mailer.send_otp(email, &code, purpose, self.expiry());
        Ok(())
    }

    /// Exchange a code for a reference number.
    ///
    /// ## Errors
    ///
    /// - `OtpNotFound` when no request of this purpose has the code
    /// - `OtpExpired` when the code is past its usable window
    pub async fn verify_otp(&self, code: &str, purpose: OtpPurpose) -> Result<String> {
        self.exchange(code, purpose, None).await
    }

    /// Same as [`verify_otp`](Self::verify_otp), but only codes issued to
    /// `email` match.
    pub async fn verify_otp_for(&self, code: &str, purpose: OtpPurpose, email: &str) -> Result<String> {
        self.exchange(code, purpose, Some(email)).await
    }

    async fn exchange(&self, code: &str, purpose: OtpPurpose, email: Option<&str>) -> Result<String> {
        let request = self
            .store
            .find_by_code(&sha256_hex(code.trim()), purpose, email)
            .await?
            .ok_or(AccountError::OtpNotFound)?;

        self.ensure_usable(&request)?;

        let reference_no = numeric_code(self.settings.reference_length);
        self.store
            .set_reference(request.id, &sha256_hex(&reference_no))
            .await?;

        info!(
            email = %mask_email(&request.email),
            purpose = purpose.as_str(),
            "OTP verified"
        );
        Ok(reference_no)
    }

    /// Resolve a reference number to the email it was issued for.
    pub async fn consume_by_reference(&self, reference_no: &str, purpose: OtpPurpose) -> Result<String> {
        let request = self
            .store
            .find_by_reference(&sha256_hex(reference_no.trim()), purpose)
            .await?
            .ok_or(AccountError::ReferenceNotFound)?;

        self.ensure_usable(&request)?;
        Ok(request.email)
    }

    /// Delete every code and reference issued for `email`.
    pub async fn purge_all_for_email(&self, email: &str) -> Result<u64> {
        let removed = self.store.delete_for_email(email).await?;
        info!(email = %mask_email(email), removed, "purged OTP requests");
        Ok(removed)
    }
}
