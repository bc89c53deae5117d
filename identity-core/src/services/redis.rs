use redis::{aio::ConnectionManager, Client};
use std::time::Duration;

use crate::config::RedisConfig;
use crate::services::store::EphemeralStore;
use async_trait::async_trait;

/// Redis-backed ephemeral store shared across service instances, so cache
/// invalidation and rate counting stay coherent in multi-instance
/// deployments.
#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisService {
    pub async fn new(config: &RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
            op_timeout: Duration::from_millis(config.store_timeout_ms),
        })
    }

    /// Run a redis call under the configured deadline; a timed-out call is
    /// reported like any other backend failure.
    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, anyhow::Error>
    where
        F: std::future::Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|e| anyhow::anyhow!("Redis {} failed: {}", op, e)),
            Err(_) => Err(anyhow::anyhow!(
                "Redis {} timed out after {:?}",
                op,
                self.op_timeout
            )),
        }
    }
}

#[async_trait]
impl EphemeralStore for RedisService {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        self.bounded("GET", async move {
            redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, expiry_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        self.bounded("SET", async move {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(expiry_seconds)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        self.bounded("DEL", async move {
            redis::cmd("DEL").arg(key).query_async::<_, ()>(&mut conn).await
        })
        .await
    }

    async fn incr_with_expiry(
        &self,
        key: &str,
        expiry_seconds: i64,
    ) -> Result<i64, anyhow::Error> {
        let mut conn = self.manager.clone();
        self.bounded("INCR", async move {
            let count: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
            // First increment creates the key; arm its expiry then. INCR
            // itself is the atomic step; a lost EXPIRE only delays cleanup
            // because counter keys are window-bucketed.
            if count == 1 {
                redis::cmd("EXPIRE")
                    .arg(key)
                    .arg(expiry_seconds)
                    .query_async::<_, ()>(&mut conn)
                    .await?;
            }
            Ok(count)
        })
        .await
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        self.bounded("PING", async move {
            redis::cmd("PING").query_async(&mut conn).await
        })
        .await
    }
}
