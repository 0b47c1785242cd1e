//! Shared fixtures: an `AppState` wired to in-memory stores, fixture RSA keys
//! and a recording email sender.
#![allow(dead_code)]

use account_service::config::{AccountSettings, OtpSettings};
use account_service::db::{
    InMemoryCredentialStore, InMemoryDriveStore, InMemoryOtpStore, InMemoryProductStore,
};
use account_service::models::{RegisterRequest, User};
use account_service::security::TokenConfig;
use account_service::services::email::SentEmail;
use account_service::services::{EmailDispatcher, RecordingEmailSender};
use account_service::{AppState, Stores};
use actix_web::web;
use crypto_core::KeyPair;
use redis_utils::{InMemorySessionCache, SessionCache};
use std::sync::Arc;
use std::time::Duration;

pub const STRONG_PASSWORD: &str = "Blue#Falcon42Rivers";
pub const NEW_PASSWORD: &str = "Quiet!Maple97Harbor";

pub const ACCESS_TTL: Duration = Duration::from_secs(900);
pub const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

pub fn access_keys() -> KeyPair {
    KeyPair::from_pem(
        include_str!("../fixtures/access_private.pem"),
        include_str!("../fixtures/access_public.pem"),
    )
    .expect("access fixture keys")
}

pub fn refresh_keys() -> KeyPair {
    KeyPair::from_pem(
        include_str!("../fixtures/refresh_private.pem"),
        include_str!("../fixtures/refresh_public.pem"),
    )
    .expect("refresh fixture keys")
}

pub fn token_configs() -> (TokenConfig, TokenConfig) {
    (
        TokenConfig::new(access_keys(), ACCESS_TTL),
        TokenConfig::new(refresh_keys(), REFRESH_TTL),
    )
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub cache: Arc<InMemorySessionCache>,
    pub users: Arc<InMemoryCredentialStore>,
    pub otps: Arc<InMemoryOtpStore>,
    pub mail: Arc<RecordingEmailSender>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(OtpSettings::default(), Arc::new(RecordingEmailSender::new()))
    }

    pub fn with_otp_settings(otp: OtpSettings) -> Self {
        Self::with_settings(otp, Arc::new(RecordingEmailSender::new()))
    }

    pub fn with_settings(otp: OtpSettings, mail: Arc<RecordingEmailSender>) -> Self {
        Self::build(otp, mail, None)
    }

    /// Same wiring but with a caller-supplied session cache
    pub fn with_cache(cache: Arc<dyn SessionCache>) -> Self {
        Self::build(
            OtpSettings::default(),
            Arc::new(RecordingEmailSender::new()),
            Some(cache),
        )
    }

    fn build(
        otp: OtpSettings,
        mail: Arc<RecordingEmailSender>,
        cache_override: Option<Arc<dyn SessionCache>>,
    ) -> Self {
        let cache = Arc::new(InMemorySessionCache::new());
        let users = Arc::new(InMemoryCredentialStore::new());
        let otps = Arc::new(InMemoryOtpStore::new());

        let stores = Stores {
            users: users.clone(),
            otps: otps.clone(),
            products: Arc::new(InMemoryProductStore::new()),
            drive: Arc::new(InMemoryDriveStore::new()),
        };
        let mailer = EmailDispatcher::new(mail.clone(), Duration::from_secs(2), "http://localhost:3000");
        let (access, refresh) = token_configs();

        let session_cache: Arc<dyn SessionCache> = match cache_override {
            Some(custom) => custom,
            None => cache.clone(),
        };

        let state = web::Data::new(AppState::new(
            stores,
            session_cache,
            access,
            refresh,
            mailer,
            otp,
            AccountSettings::default(),
        ));

        Self {
            state,
            cache,
            users,
            otps,
            mail,
        }
    }

    /// Wait until `recipient` has received `count` messages
    pub async fn wait_for_mail(&self, recipient: &str, count: usize) -> Vec<SentEmail> {
        for _ in 0..200 {
            let messages = self.mail.messages_to(recipient);
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} email(s) for {recipient}");
    }

    pub async fn verification_code_for(&self, recipient: &str, nth: usize) -> String {
        let messages = self.wait_for_mail(recipient, nth + 1).await;
        extract_verification_code(&messages[nth].html_body)
    }

    pub async fn otp_for(&self, recipient: &str, nth: usize) -> String {
        let messages = self.wait_for_mail(recipient, nth + 1).await;
        extract_otp(&messages[nth].html_body)
    }

    /// Register and verify `username`, returning the verified user
    pub async fn verified_user(&self, username: &str) -> User {
        let email = format!("{username}@example.com");
        self.state
            .accounts
            .register(register_request(username, &email))
            .await
            .expect("register");
        let code = self.verification_code_for(&email, 0).await;
        self.state.accounts.verify_email(&code).await.expect("verify")
    }
}

pub fn register_request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: STRONG_PASSWORD.to_string(),
        password_confirm: STRONG_PASSWORD.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
    }
}

pub fn extract_verification_code(html: &str) -> String {
    let start = html.find("/verify-email/").expect("verification link") + "/verify-email/".len();
    html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect()
}

pub fn extract_otp(html: &str) -> String {
    let start = html.find("<strong>").expect("otp markup") + "<strong>".len();
    let end = html[start..].find("</strong>").expect("otp markup") + start;
    html[start..end].to_string()
}
