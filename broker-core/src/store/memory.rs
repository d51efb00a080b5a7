use super::{SessionStore, StoreError};
use async_trait::async_trait;
use moka::{future::Cache as MokaCache, Expiry};
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry {
    payload: String,
    ttl: Option<Duration>,
}

/// Gives every entry the TTL it was written with; an update resets it.
struct PerEntryExpiry;

impl Expiry<String, Entry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

#[derive(Clone)]
pub struct InMemoryStore {
    cache: MokaCache<String, Entry>,
}

impl InMemoryStore {
    /// Initialize a new in-memory store bounded to `capacity_mib` of payload
    pub fn new(capacity_mib: usize) -> Result<Self, StoreError> {
        // Convert MiB to bytes for max_capacity (1 MiB = 1024 * 1024 bytes)
        let max_capacity_bytes = u64::try_from(capacity_mib)
            .ok()
            .and_then(|mib| mib.checked_mul(1024 * 1024))
            .ok_or_else(|| StoreError::Config(format!("Capacity overflow: {capacity_mib} MiB")))?;

        let cache = MokaCache::builder()
            .expire_after(PerEntryExpiry)
            .weigher(|_key, value: &Entry| -> u32 {
                value.payload.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(max_capacity_bytes)
            .build();

        Ok(Self { cache })
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        if let Some(entry) = self.cache.get(key).await {
            serde_json::from_str(&entry.payload)
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
        let payload = serde_json::to_string(value)?;
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        self.cache
            .insert(key.to_string(), Entry { payload, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.cache.remove(key).await;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
