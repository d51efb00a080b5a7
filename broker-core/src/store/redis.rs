use super::{SessionStore, StoreError};
use async_trait::async_trait;
use log::error;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Clone)]
pub struct RedisStore {
    _client: Client,
    conn_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Initialize a new Redis store instance
    pub async fn new(redis_url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)
            .map_err(|err| StoreError::Config(format!("Failed to connect to Redis: {}", err)))?;

        let conn_manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|err| {
                StoreError::Config(format!(
                    "Failed to create Redis connection manager: {}",
                    err
                ))
            })?;

        // Test the connection to ensure it's working
        let mut conn = conn_manager.clone();
        if let Err(err) = redis::cmd("PING").query_async::<String>(&mut conn).await {
            return Err(StoreError::Config(format!("Failed to ping Redis: {}", err)));
        }

        Ok(Self {
            conn_manager,
            key_prefix: key_prefix.to_string(),
            _client: client,
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let mut conn = self.conn_manager.clone();
        let key = self.prefixed(key);

        let result: Option<String> = conn.get(&key).await.map_err(|err| {
            error!("Redis error while getting key {}: {}", key, err);
            StoreError::Redis(err.to_string())
        })?;

        if let Some(value) = result {
            serde_json::from_str(&value)
                .map_err(|e| StoreError::Deserialization(e.to_string()))
                .map(Some)
        } else {
            Ok(None)
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(value)?;
        let mut conn = self.conn_manager.clone();
        let key = self.prefixed(key);

        // SET without EX clears any previous expiry, matching "zero means no expiry"
        let result = if ttl_secs > 0 {
            conn.set_ex::<_, _, ()>(&key, serialized, ttl_secs).await
        } else {
            conn.set::<_, _, ()>(&key, serialized).await
        };

        result.map_err(|err| {
            error!("Redis error while setting key {}: {}", key, err);
            StoreError::Redis(err.to_string())
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();
        let key = self.prefixed(key);

        match conn.del::<_, ()>(&key).await {
            Ok(_) => Ok(()),
            Err(err) => {
                error!("Redis error while deleting key {}: {}", key, err);
                Err(StoreError::Redis(err.to_string()))
            }
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        let mut conn = self.conn_manager.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Redis health check failed: {}", err)),
        }
    }
}
