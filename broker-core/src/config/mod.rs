//! Environment driven configuration.
//!
//! Every section is a plain value handed to the component that needs it at
//! construction time; nothing reads the environment after startup.

use confique::Config;

pub mod platform;
pub mod session;
pub mod store;

pub use platform::PlatformConfig;
pub use session::SessionConfig;
pub use store::{StoreBackend, StoreConfig};

/// Main configuration structure for the broker
#[derive(Debug, Config, Clone)]
pub struct BrokerConfig {
    /// The port the broker server will listen to (default: 8080)
    #[config(env = "BROKER_PORT", default = 8080)]
    pub port: u16,

    /// Cloud platform identity and token endpoint settings
    #[config(nested)]
    pub platform: PlatformConfig,

    /// Browser session and login window settings
    #[config(nested)]
    pub session: SessionConfig,

    /// Session / token store settings
    #[config(nested)]
    pub store: StoreConfig,
}

impl BrokerConfig {
    /// Loads the configuration from environment variables
    pub fn load() -> Result<Self, confique::Error> {
        Self::builder().env().load()
    }
}
