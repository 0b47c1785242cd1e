//! Account service: registration, sessions, OTP-gated recovery and deletion,
//! and the user-owned product and drive resources.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod security;
pub mod services;

pub use error::{AccountError, Result};

use config::{AccountSettings, OtpSettings};
use db::{CredentialStore, DriveStore, OtpStore, ProductStore};
use redis_utils::SessionCache;
use security::{OtpManager, SessionManager, TokenConfig};
use services::{AccountService, DriveService, EmailDispatcher, ProductService};
use std::sync::Arc;

/// Persistence handles injected into the services
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn CredentialStore>,
    pub otps: Arc<dyn OtpStore>,
    pub products: Arc<dyn ProductStore>,
    pub drive: Arc<dyn DriveStore>,
}

/// Shared state handed to every handler through `web::Data`
pub struct AppState {
    pub accounts: AccountService,
    pub sessions: Arc<SessionManager>,
    pub products: ProductService,
    pub drive: DriveService,
}

impl AppState {
    pub fn new(
        stores: Stores,
        cache: Arc<dyn SessionCache>,
        access: TokenConfig,
        refresh: TokenConfig,
        mailer: EmailDispatcher,
        otp_settings: OtpSettings,
        account_settings: AccountSettings,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            access,
            refresh,
            cache,
            stores.users.clone(),
        ));
        let otp = Arc::new(OtpManager::new(stores.otps, mailer.clone(), otp_settings));

        Self {
            accounts: AccountService::new(
                stores.users,
                sessions.clone(),
                otp,
                mailer,
                account_settings,
            ),
            sessions,
            products: ProductService::new(stores.products),
            drive: DriveService::new(stores.drive),
        }
    }
}
