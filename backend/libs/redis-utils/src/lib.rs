//! Redis plumbing for the account workspace: a shared connection manager,
//! bounded command execution, and the session cache used for token liveness.

mod session;

pub use session::{CacheError, InMemorySessionCache, RedisSessionCache, SessionCache};

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Upper bound applied when callers do not configure their own.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(500);

/// Redis connection pool backed by a reconnecting `ConnectionManager`.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("failed to parse REDIS_URL connection string")?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;
        info!("Redis connection manager initialized");

        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}

/// Run a Redis command future with an upper bound on its duration.
///
/// An elapsed timer is reported as `CacheError::Timeout`, never as an empty
/// result, so callers making authentication decisions fail closed.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, CacheError>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(CacheError::Backend(err.to_string())),
        Err(_) => Err(CacheError::Timeout(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_value_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, redis::RedisError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_with_timeout_maps_backend_error() {
        let result: Result<(), CacheError> = with_timeout(Duration::from_secs(1), async {
            Err(redis::RedisError::from((redis::ErrorKind::IoError, "connection reset")))
        })
        .await;
        assert!(matches!(result, Err(CacheError::Backend(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_elapsed() {
        let result: Result<(), CacheError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CacheError::Timeout(_))));
    }
}
