use broker_core::{BrokerConfig, BrokerError, CredentialBroker, SessionStore, Store};
use http::header::COOKIE;
use http::HeaderMap;
use log::warn;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BrokerConfig>,
    pub broker: Arc<CredentialBroker>,
}

impl AppState {
    pub fn new(config: BrokerConfig, store: Store) -> Result<Self, BrokerError> {
        let broker = CredentialBroker::new(&config, store)?;
        Ok(Self {
            config: Arc::new(config),
            broker: Arc::new(broker),
        })
    }

    /// Session id carried by the request's cookies, if any.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        let cookie = self.broker.flow().cookie();
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| cookie.extract(value))
    }

    /// Check if all components are healthy
    pub async fn health_check(&self) -> bool {
        match self.broker.store().health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Session store health check failed: {}", e);
                false
            }
        }
    }
}
