use confique::Config;
use serde::Deserialize;

/// Specifies which store implementation to use
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    InMemory,
    Redis,
}

/// Configuration for the session / token store
#[derive(Debug, Config, Clone)]
pub struct StoreConfig {
    /// Store type: "in-memory" (default) or "redis"
    #[config(env = "BROKER_STORE", default = "in-memory")]
    pub backend: StoreBackend,

    /// In-memory store capacity in MiB (default: 128 MiB)
    #[config(env = "BROKER_STORE_MEMORY_CAPACITY", default = 128)]
    pub memory_capacity: usize,

    /// Redis connection string, required for the Redis store
    #[config(env = "BROKER_STORE_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Prefix applied to every Redis key
    #[config(env = "BROKER_STORE_KEY_PREFIX", default = "broker:")]
    pub key_prefix: String,
}
