//! Redis cache module
//!
//! This module provides the [`KeyValueStore`] abstraction the session store is
//! built on, together with its Redis implementation. Keys written with a TTL
//! expire inside Redis; an expired key reads exactly like a missing one.

use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use tracing::info;

use crate::error::{CacheError, CacheResult};

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Self {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        RedisConfig { url }
    }
}

/// Key-value store with per-key expiration
///
/// Implementations must be safe to share between concurrent callers. Each
/// operation is a single store command, so no locking is done above it.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Set a key-value pair with optional TTL
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()>;

    /// Get a value by key; expired and absent keys both yield `None`
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Delete a key, succeeding when it does not exist
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Check if the store is reachable
    async fn health_check(&self) -> CacheResult<bool>;
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.clone()).map_err(CacheError::Connection)?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::Connection)
    }
}

#[async_trait]
impl KeyValueStore for RedisPool {
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;

        if let Some(ttl) = ttl_seconds {
            let _: () = conn
                .set_ex(key, value, ttl)
                .await
                .map_err(CacheError::Command)?;
        } else {
            let _: () = conn.set(key, value).await.map_err(CacheError::Command)?;
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await.map_err(CacheError::Command)?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key).await.map_err(CacheError::Command)?;
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Command)?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn local_pool() -> RedisPool {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
        };
        RedisPool::new(&config).expect("valid redis url")
    }

    #[test]
    #[serial]
    fn test_redis_config_from_env() {
        unsafe {
            std::env::remove_var("REDIS_URL");
        }
        assert_eq!(RedisConfig::from_env().url, "redis://localhost:6379");

        unsafe {
            std::env::set_var("REDIS_URL", "redis://cache:6380/1");
        }
        assert_eq!(RedisConfig::from_env().url, "redis://cache:6380/1");

        unsafe {
            std::env::remove_var("REDIS_URL");
        }
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
        };
        assert!(matches!(
            RedisPool::new(&config),
            Err(CacheError::Connection(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on localhost:6379"]
    async fn test_redis_connection() -> CacheResult<()> {
        let pool = local_pool();
        assert!(pool.health_check().await?);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on localhost:6379"]
    async fn test_expiring_key_round_trip() -> CacheResult<()> {
        let pool = local_pool();
        let key = "session:cache-module-check";

        pool.set(key, "{}", Some(1)).await?;
        assert_eq!(pool.get(key).await?.as_deref(), Some("{}"));

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert_eq!(pool.get(key).await?, None, "key should expire with its TTL");

        pool.set(key, "{}", None).await?;
        pool.delete(key).await?;
        pool.delete(key).await?;
        assert_eq!(pool.get(key).await?, None);

        Ok(())
    }
}
