//! Persistence boundary.
//!
//! Each store is a trait so use cases receive their handles by injection; the
//! Postgres implementations run in production and the in-memory ones back tests.

pub mod drive;
pub mod memory;
pub mod otp;
pub mod products;
pub mod users;

pub use drive::PgDriveStore;
pub use memory::{InMemoryCredentialStore, InMemoryDriveStore, InMemoryOtpStore, InMemoryProductStore};
pub use otp::PgOtpStore;
pub use products::PgProductStore;
pub use users::PgCredentialStore;

use crate::error::Result;
use crate::models::{DriveFile, OtpPurpose, OtpRequest, Page, PageParams, Product, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Durable user records. Lookups return live (not soft-deleted) users unless
/// the method name says otherwise.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Includes soft-deleted users
    async fn find_any_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_verification_code(&self, code_hash: &str) -> Result<Option<User>>;

    /// Most recently deleted user holding `email`
    async fn find_deleted_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist a new user together with its profile
    async fn create(&self, user: &User) -> Result<()>;

    /// Persist user and profile changes as one write. Last-login fields are
    /// left alone; they change only through `record_login`.
    async fn save(&self, user: &User) -> Result<()>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>, ip: Option<String>) -> Result<()>;

    async fn soft_delete(&self, id: Uuid) -> Result<()>;

    async fn restore(&self, id: Uuid) -> Result<()>;

    async fn permanent_delete(&self, id: Uuid) -> Result<()>;

    /// All users, deleted ones included, newest first
    async fn list(&self, params: &PageParams) -> Result<Page<User>>;

    /// Resolve a login identity, which is either an email or a username
    async fn find_by_identity(&self, identity: &str) -> Result<Option<User>> {
        if identity.contains('@') {
            self.find_by_email(identity).await
        } else {
            self.find_by_username(identity).await
        }
    }
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn create(&self, otp: &OtpRequest) -> Result<()>;

    /// Newest request with this code and purpose, optionally limited to one email
    async fn find_by_code(
        &self,
        code_hash: &str,
        purpose: OtpPurpose,
        email: Option<&str>,
    ) -> Result<Option<OtpRequest>>;

    async fn set_reference(&self, id: Uuid, reference_hash: &str) -> Result<()>;

    async fn find_by_reference(
        &self,
        reference_hash: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRequest>>;

    /// Returns the number of rows removed
    async fn delete_for_email(&self, email: &str) -> Result<u64>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create(&self, product: &Product) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>>;

    async fn list_enabled(&self, params: &PageParams) -> Result<Page<Product>>;

    async fn list_by_owner(&self, owner_id: Uuid, params: &PageParams) -> Result<Page<Product>>;

    async fn update(&self, product: &Product) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait DriveStore: Send + Sync {
    async fn create(&self, file: &DriveFile) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DriveFile>>;

    async fn list_by_owner(&self, owner_id: Uuid, params: &PageParams) -> Result<Page<DriveFile>>;

    async fn update(&self, file: &DriveFile) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}
