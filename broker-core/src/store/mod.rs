use crate::config::{StoreBackend, StoreConfig};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod memory;
pub mod redis;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Key/value store with a per-key time to live.
///
/// All backends must behave the same way for callers, apart from whether
/// values survive a process restart:
/// - `get` and `delete` on a missing key succeed (`Ok(None)` / `Ok(())`).
/// - `set` overwrites atomically; a `ttl_secs` of zero means "no expiry".
/// - an expired key is indistinguishable from a key that was never set.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Retrieve a value
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError>;

    /// Store a value, replacing any previous value and its expiry
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), StoreError>;

    /// Delete a value
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Checks connectivity to the backend.
    ///
    /// Returns Ok(()) if healthy, or Err with a descriptive message if unhealthy.
    async fn health_check(&self) -> Result<(), String>;
}

/// Store implementation selected at startup.
///
/// Constructed once in `main` and shared (behind an `Arc`) by the token broker
/// and the login flow; there is no process-wide instance.
#[derive(Clone)]
pub enum Store {
    /// In-process store, lost on restart
    InMemory(memory::InMemoryStore),
    /// Redis-backed store, expiry enforced server side
    Redis(redis::RedisStore),
}

impl Store {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "in-memory",
            Self::Redis(_) => "redis",
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for Store {
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self {
            Self::InMemory(store) => store.get(key).await,
            Self::Redis(store) => store.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        match self {
            Self::InMemory(store) => store.set(key, value, ttl_secs).await,
            Self::Redis(store) => store.set(key, value, ttl_secs).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::InMemory(store) => store.delete(key).await,
            Self::Redis(store) => store.delete(key).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(store) => store.health_check().await,
            Self::Redis(store) => store.health_check().await,
        }
    }
}

/// Creates the store selected by configuration.
///
/// The Redis backend is pinged during construction so a bad connection
/// target fails at startup instead of on the first login.
pub async fn create_store(config: &StoreConfig) -> Result<Store, StoreError> {
    match config.backend {
        StoreBackend::InMemory => {
            let store = memory::InMemoryStore::new(config.memory_capacity)?;
            Ok(Store::InMemory(store))
        }
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .filter(|url| !url.is_empty())
                .ok_or_else(|| {
                    StoreError::Config("Redis URL is required for the Redis store".to_string())
                })?;
            let store = redis::RedisStore::new(url, &config.key_prefix).await?;
            Ok(Store::Redis(store))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct TestValue {
        field: String,
    }

    fn memory_store() -> Store {
        Store::InMemory(InMemoryStore::new(16).expect("Failed to create store"))
    }

    #[tokio::test]
    async fn test_store_basic_operations() {
        let store = memory_store();

        let test_value = TestValue {
            field: "test_value".to_string(),
        };
        store
            .set("test_key", &test_value, 60)
            .await
            .expect("Failed to set value");
        let value: Option<TestValue> = store.get("test_key").await.expect("Failed to get value");
        assert_eq!(value, Some(test_value));

        let value: Option<TestValue> = store
            .get("non_existent")
            .await
            .expect("Failed to get value");
        assert_eq!(value, None);

        store
            .delete("test_key")
            .await
            .expect("Failed to delete value");
        let value: Option<TestValue> = store.get("test_key").await.expect("Failed to get value");
        assert_eq!(value, None);

        // deleting again is not an error
        store
            .delete("test_key")
            .await
            .expect("Failed to delete missing value");
    }

    #[tokio::test]
    async fn test_store_per_key_ttl() {
        let store = memory_store();

        let short = TestValue {
            field: "short".to_string(),
        };
        let long = TestValue {
            field: "long".to_string(),
        };
        let forever = TestValue {
            field: "forever".to_string(),
        };
        store.set("short", &short, 1).await.unwrap();
        store.set("long", &long, 60).await.unwrap();
        store.set("forever", &forever, 0).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(store.get::<TestValue>("short").await.unwrap(), None);
        assert_eq!(store.get::<TestValue>("long").await.unwrap(), Some(long));
        assert_eq!(
            store.get::<TestValue>("forever").await.unwrap(),
            Some(forever)
        );
    }

    #[tokio::test]
    async fn test_store_overwrite_replaces_ttl() {
        let store = memory_store();
        let value = TestValue {
            field: "v1".to_string(),
        };
        store.set("key", &value, 1).await.unwrap();

        let renewed = TestValue {
            field: "v2".to_string(),
        };
        store.set("key", &renewed, 60).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.get::<TestValue>("key").await.unwrap(), Some(renewed));
    }

    #[tokio::test]
    async fn test_store_not_shared_between_instances() {
        let test_value = TestValue {
            field: "persist_value".to_string(),
        };

        let store = memory_store();
        store.set("persist_key", &test_value, 60).await.unwrap();
        let value: Option<TestValue> = store.get("persist_key").await.unwrap();
        assert_eq!(value, Some(test_value));

        let other = memory_store();
        let value: Option<TestValue> = other.get("persist_key").await.unwrap();
        assert_eq!(
            value, None,
            "Value should not persist in a new store instance since it is in-process only"
        );
    }

    #[tokio::test]
    async fn test_store_concurrent_operations() {
        let store = memory_store();
        let store_clone = store.clone();

        let set_task = tokio::spawn(async move {
            for i in 0..100 {
                let test_value = TestValue {
                    field: format!("value_{i}"),
                };
                store_clone
                    .set(&format!("key_{i}"), &test_value, 60)
                    .await
                    .expect("Failed to set value");
            }
        });

        let get_task = tokio::spawn(async move {
            for i in 0..100 {
                if let Ok(Some(value)) = store.get::<TestValue>(&format!("key_{i}")).await {
                    assert_eq!(value.field, format!("value_{i}"));
                }
            }
        });

        tokio::try_join!(set_task, get_task).expect("Tasks failed");
    }

    #[tokio::test]
    async fn test_create_store_requires_redis_url() {
        let config = StoreConfig {
            backend: StoreBackend::Redis,
            memory_capacity: 16,
            redis_url: None,
            key_prefix: "broker:".to_string(),
        };
        let result = create_store(&config).await;
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_create_in_memory_store() {
        let config = StoreConfig {
            backend: StoreBackend::InMemory,
            memory_capacity: 16,
            redis_url: None,
            key_prefix: "broker:".to_string(),
        };
        let store = create_store(&config).await.expect("Failed to create store");
        assert!(matches!(store, Store::InMemory(_)));
        assert_eq!(store.backend_name(), "in-memory");
        assert!(store.health_check().await.is_ok());
    }
}
