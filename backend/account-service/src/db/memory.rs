//! Process-local stores used by tests and local experiments.
//!
//! They enforce the same live-uniqueness rules as the database indexes.

use super::{CredentialStore, DriveStore, OtpStore, ProductStore};
use crate::error::{AccountError, Result};
use crate::models::{DriveFile, OtpPurpose, OtpRequest, Page, PageParams, Product, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

fn paginate<T>(items: Vec<T>, params: &PageParams) -> Page<T> {
    let total = items.len() as i64;
    let offset = usize::try_from(params.offset()).unwrap_or(usize::MAX);
    let items: Vec<T> = items
        .into_iter()
        .skip(offset)
        .take(params.per_page() as usize)
        .collect();
    Page::new(items, total, params)
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(users: &HashMap<Uuid, User>, candidate: &User) -> Result<()> {
        for other in users.values() {
            if other.id == candidate.id || other.is_deleted() {
                continue;
            }
            if other.email == candidate.email {
                return Err(AccountError::Conflict("Email already exists".to_string()));
            }
            if other.username == candidate.username {
                return Err(AccountError::Conflict("Username already exists".to_string()));
            }
        }
        Ok(())
    }

    async fn find_live(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| !u.is_deleted() && predicate(u))
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find_live(|u| u.email == email).await)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.find_live(|u| u.username == username).await)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.find_live(|u| u.id == id).await)
    }

    async fn find_any_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_verification_code(&self, code_hash: &str) -> Result<Option<User>> {
        Ok(self
            .find_live(|u| u.verification_code.as_deref() == Some(code_hash))
            .await)
    }

    async fn find_deleted_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.email == email && u.is_deleted())
            .max_by_key(|u| u.deleted_at)
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        Self::check_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        Self::check_unique(&users, user)?;
        let entry = users.get_mut(&user.id).ok_or(AccountError::UserNotFound)?;
        let deleted_at = entry.deleted_at;
        let last_login = (entry.last_login_at, entry.last_login_ip.take());
        *entry = user.clone();
        // Soft-delete state and last login have their own writers
        entry.deleted_at = deleted_at;
        (entry.last_login_at, entry.last_login_ip) = last_login;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>, ip: Option<String>) -> Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_login_at = Some(at);
            user.last_login_ip = ip;
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if !user.is_deleted() => {
                user.deleted_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(AccountError::UserNotFound),
        }
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        let mut users = self.users.write().await;
        let candidate = match users.get(&id) {
            Some(user) if user.is_deleted() => user.clone(),
            _ => return Err(AccountError::UserNotFound),
        };
        Self::check_unique(&users, &candidate)?;
        if let Some(user) = users.get_mut(&id) {
            user.deleted_at = None;
        }
        Ok(())
    }

    async fn permanent_delete(&self, id: Uuid) -> Result<()> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(AccountError::UserNotFound)
    }

    async fn list(&self, params: &PageParams) -> Result<Page<User>> {
        let term = params.search_term();
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| match &term {
                Some(t) => u.username.contains(t.as_str()) || u.email.contains(t.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(users, params))
    }
}

#[derive(Default)]
pub struct InMemoryOtpStore {
    requests: RwLock<Vec<OtpRequest>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests currently stored for `email`
    pub async fn count_for_email(&self, email: &str) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.email == email)
            .count()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn create(&self, otp: &OtpRequest) -> Result<()> {
        self.requests.write().await.push(otp.clone());
        Ok(())
    }

    async fn find_by_code(
        &self,
        code_hash: &str,
        purpose: OtpPurpose,
        email: Option<&str>,
    ) -> Result<Option<OtpRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .iter()
            .filter(|r| r.code_hash == code_hash && r.purpose == purpose)
            .filter(|r| email.map_or(true, |e| r.email == e))
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn set_reference(&self, id: Uuid, reference_hash: &str) -> Result<()> {
        if let Some(request) = self.requests.write().await.iter_mut().find(|r| r.id == id) {
            request.reference_hash = Some(reference_hash.to_string());
        }
        Ok(())
    }

    async fn find_by_reference(
        &self,
        reference_hash: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .iter()
            .find(|r| r.reference_hash.as_deref() == Some(reference_hash) && r.purpose == purpose)
            .cloned())
    }

    async fn delete_for_email(&self, email: &str) -> Result<u64> {
        let mut requests = self.requests.write().await;
        let before = requests.len();
        requests.retain(|r| r.email != email);
        Ok((before - requests.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<Uuid, Product>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sorted(&self, filter: impl Fn(&Product) -> bool) -> Vec<Product> {
        let mut items: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| filter(p))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn create(&self, product: &Product) -> Result<()> {
        self.products.write().await.insert(product.id, product.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list_enabled(&self, params: &PageParams) -> Result<Page<Product>> {
        let term = params.search_term();
        let items = self
            .sorted(|p| {
                p.is_enable
                    && term
                        .as_deref()
                        .map_or(true, |t| p.title.to_lowercase().contains(t))
            })
            .await;
        Ok(paginate(items, params))
    }

    async fn list_by_owner(&self, owner_id: Uuid, params: &PageParams) -> Result<Page<Product>> {
        let items = self.sorted(|p| p.user_id == owner_id).await;
        Ok(paginate(items, params))
    }

    async fn update(&self, product: &Product) -> Result<()> {
        self.products.write().await.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.products.write().await.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDriveStore {
    files: RwLock<HashMap<Uuid, DriveFile>>,
}

impl InMemoryDriveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriveStore for InMemoryDriveStore {
    async fn create(&self, file: &DriveFile) -> Result<()> {
        self.files.write().await.insert(file.id, file.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DriveFile>> {
        Ok(self.files.read().await.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid, params: &PageParams) -> Result<Page<DriveFile>> {
        let term = params.search_term();
        let mut items: Vec<DriveFile> = self
            .files
            .read()
            .await
            .values()
            .filter(|f| {
                f.user_id == owner_id
                    && term
                        .as_deref()
                        .map_or(true, |t| f.name.to_lowercase().contains(t))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, params))
    }

    async fn update(&self, file: &DriveFile) -> Result<()> {
        self.files.write().await.insert(file.id, file.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.files.write().await.remove(&id);
        Ok(())
    }
}
