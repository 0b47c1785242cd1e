//! Session Manager: binds signed tokens to live entries in the session cache.
//!
//! A token is usable only while its id is present in the cache. The signature
//! check always runs first, then the cache lookup, then the user lookup; any
//! failure along the way rejects the token. Cache errors are never read as
//! "not revoked".

use crate::db::CredentialStore;
use crate::error::{AccountError, Result};
use crate::models::{TokenPair, User};
use chrono::{DateTime, Utc};
use crypto_core::jwt::{issue_token, issue_token_with_id, verify_token, KeyPair};
use redis_utils::SessionCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Key pair and lifetime for one token kind
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub keys: KeyPair,
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(keys: KeyPair, ttl: Duration) -> Self {
        Self { keys, ttl }
    }
}

/// Caller identity established by a validated access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token_id: String,
}

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Refresh token ids are derived from the paired access token id so logout
/// can revoke both from the access token alone.
pub fn refresh_token_id(access_token_id: &str, user_id: Uuid) -> String {
    format!("{access_token_id}++{user_id}")
}

/// Set of live access token ids per user, used to revoke every session at once
pub fn session_index_key(user_id: Uuid) -> String {
    format!("sessions:{user_id}")
}

/// Marker throttling last-login bookkeeping for authenticated requests
pub fn activity_marker_key(user_id: Uuid) -> String {
    format!("last-login:{user_id}")
}

/// How long a recorded activity suppresses the next write
pub const DEFAULT_ACTIVITY_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Cache TTL matching the token's remaining validity, at least one second
fn remaining_ttl(expires_at: DateTime<Utc>) -> Duration {
    (expires_at - Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(Duration::from_secs(1))
}

pub struct SessionManager {
    access: TokenConfig,
    refresh: TokenConfig,
    cache: Arc<dyn SessionCache>,
    users: Arc<dyn CredentialStore>,
    activity_interval: Duration,
}

impl SessionManager {
    pub fn new(
        access: TokenConfig,
        refresh: TokenConfig,
        cache: Arc<dyn SessionCache>,
        users: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            access,
            refresh,
            cache,
            users,
            activity_interval: DEFAULT_ACTIVITY_INTERVAL,
        }
    }

    /// Sign an access/refresh pair and register both ids in the cache.
    ///
    /// A failed second write leaves the first entry behind; it expires on its own.
    pub async fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let access = issue_token(user_id, self.access.ttl, &self.access.keys)?;
        let refresh = issue_token_with_id(
            user_id,
            refresh_token_id(&access.token_id, user_id),
            self.refresh.ttl,
            &self.refresh.keys,
        )?;

        let owner = user_id.to_string();

        // Indexed before the session exists so revoke_all can always find it
        self.cache
            .add_member(
                &session_index_key(user_id),
                &access.token_id,
                remaining_ttl(refresh.expires_at),
            )
            .await?;

        self.cache
            .set(&access.token_id, &owner, remaining_ttl(access.expires_at))
            .await?;

        if let Err(e) = self
            .cache
            .set(&refresh.token_id, &owner, remaining_ttl(refresh.expires_at))
            .await
        {
            warn!(
                user_id = %user_id,
                error = %e,
                "refresh session write failed after access session was stored"
            );
            return Err(e.into());
        }

        debug!(user_id = %user_id, "issued token pair");

        Ok(TokenPair {
            access_token: access.token,
            access_token_id: access.token_id,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_token_id: refresh.token_id,
            refresh_expires_at: refresh.expires_at,
            user_id,
        })
    }

    /// Resolve a bearer access token to its user.
    ///
    /// ## Errors
    ///
    /// - `InvalidToken`: bad signature, wrong algorithm, expired or malformed
    /// - `SessionExpired`: the token id is not in the cache (revoked or expired)
    /// - `TokenOwnerMissing`: the bound user no longer exists
    /// - `SessionStore`: the cache failed or timed out
    pub async fn validate_access_token(&self, token: &str) -> Result<AuthenticatedUser> {
        let verified = verify_token(token, &self.access.keys)?;

        let user_id = self.live_session_owner(&verified.token_id).await?;
        if user_id != verified.user_id {
            warn!(token_user = %verified.user_id, session_user = %user_id, "session owner mismatch");
            return Err(AccountError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AccountError::TokenOwnerMissing)?;

        Ok(AuthenticatedUser {
            user,
            token_id: verified.token_id,
        })
    }

    /// Delete the access session and its derived refresh session.
    ///
    /// `NothingToRevoke` when either entry was already gone; `SessionStore`
    /// when the cache itself failed.
    pub async fn revoke(&self, access_token_id: &str, user_id: Uuid) -> Result<()> {
        let access_removed = self.cache.delete(access_token_id).await?;
        let refresh_removed = self
            .cache
            .delete(&refresh_token_id(access_token_id, user_id))
            .await?;

        if let Err(e) = self
            .cache
            .remove_member(&session_index_key(user_id), access_token_id)
            .await
        {
            warn!(user_id = %user_id, error = %e, "failed to drop revoked session from index");
        }

        if access_removed == 0 || refresh_removed == 0 {
            debug!(
                user_id = %user_id,
                access_removed,
                refresh_removed,
                "revocation found missing session entries"
            );
            return Err(AccountError::NothingToRevoke);
        }

        info!(user_id = %user_id, "session revoked");
        Ok(())
    }

    /// Delete every session issued to `user_id`. Returns how many access
    /// sessions were still live.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        let index = session_index_key(user_id);
        let mut revoked = 0;

        for access_token_id in self.cache.members(&index).await? {
            revoked += self.cache.delete(&access_token_id).await?;
            self.cache
                .delete(&refresh_token_id(&access_token_id, user_id))
                .await?;
        }
        self.cache.delete(&index).await?;

        info!(user_id = %user_id, revoked, "revoked all sessions");
        Ok(revoked)
    }

    /// Record request activity as the user's last login, at most once per
    /// activity interval. Returns whether the user record was written.
    pub async fn record_activity(&self, user_id: Uuid, client_ip: Option<String>) -> Result<bool> {
        let marker = activity_marker_key(user_id);
        if self.cache.get(&marker).await?.is_some() {
            return Ok(false);
        }

        let now = Utc::now();
        self.cache
            .set(&marker, &now.to_rfc3339(), self.activity_interval)
            .await?;
        self.users.record_login(user_id, now, client_ip).await?;

        debug!(user_id = %user_id, "recorded user activity");
        Ok(true)
    }

    /// Mint a new pair from a live refresh token.
    ///
    /// The presented refresh session is left in place, so a replayed refresh
    /// token keeps working until it expires or its pair is logged out.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let verified = verify_token(refresh_token, &self.refresh.keys)?;

        let user_id = self.live_session_owner(&verified.token_id).await?;
        if user_id != verified.user_id {
            return Err(AccountError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AccountError::TokenOwnerMissing)?;

        let pair = self.issue_pair(user.id).await?;
        info!(
            user_id = %user.id,
            previous_refresh_token_id = %verified.token_id,
            new_access_token_id = %pair.access_token_id,
            "refreshed session; previous refresh session left active"
        );
        Ok(pair)
    }

    async fn live_session_owner(&self, token_id: &str) -> Result<Uuid> {
        let owner = self
            .cache
            .get(token_id)
            .await?
            .ok_or(AccountError::SessionExpired)?;

        Uuid::parse_str(&owner).map_err(|_| {
            warn!("session cache holds a malformed owner id");
            AccountError::SessionExpired
        })
    }
}
