//! Server-side credential broker for a cloud platform API.
//!
//! The broker hands out two kinds of bearer credentials:
//!
//! - application tokens from the client-credentials grant, cached in the
//!   [`store`] until shortly before they expire;
//! - delegated tokens obtained through the authorization-code flow
//!   ([`flow`]) and kept in a server-side [`session::BrowserSession`], which
//!   the browser references only through an opaque cookie.
//!
//! [`CredentialBroker`] wires the pieces together around one shared store.

pub mod config;
pub mod cookie;
pub mod error;
pub mod flow;
pub mod resolver;
pub mod scope;
pub mod session;
mod singleflight;
pub mod store;
pub mod token;

#[cfg(test)]
mod test_utils;

pub use config::BrokerConfig;
pub use error::{BrokerError, ErrorKind};
pub use flow::{LoginCompletion, LoginRedirect, OAuthFlowController};
pub use resolver::{AuthHeaderResolver, CredentialMode};
pub use scope::{Scope, ScopeSet};
pub use session::{BrowserSession, LoginStatus};
pub use store::{create_store, SessionStore, Store, StoreError};
pub use token::{CachedAppToken, DelegatedToken, TokenBroker};

use std::sync::Arc;

/// Token broker, login flow and header resolver sharing one store.
///
/// Built once at startup and shared by reference; there is no global
/// instance.
#[derive(Clone)]
pub struct CredentialBroker {
    store: Arc<Store>,
    tokens: TokenBroker,
    flow: OAuthFlowController,
    resolver: AuthHeaderResolver,
}

impl CredentialBroker {
    /// Fails with `InvalidScope` when a configured scope string does not
    /// resolve.
    pub fn new(config: &BrokerConfig, store: Store) -> Result<Self, BrokerError> {
        let store = Arc::new(store);
        let tokens = TokenBroker::new(config.platform.clone(), store.clone())?;
        let flow = OAuthFlowController::new(tokens.clone(), store.clone(), config.session.clone());
        let resolver = AuthHeaderResolver::new(tokens.clone(), flow.clone());
        Ok(Self {
            store,
            tokens,
            flow,
            resolver,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn tokens(&self) -> &TokenBroker {
        &self.tokens
    }

    pub fn flow(&self) -> &OAuthFlowController {
        &self.flow
    }

    pub fn resolver(&self) -> &AuthHeaderResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StoreBackend, StoreConfig};
    use crate::test_utils::TestFixture;

    fn config(base_url: &str) -> BrokerConfig {
        BrokerConfig {
            port: 8080,
            platform: TestFixture::platform_config(base_url),
            session: TestFixture::session_config(),
            store: StoreConfig {
                backend: StoreBackend::InMemory,
                memory_capacity: 16,
                redis_url: None,
                key_prefix: "broker:".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_components_share_the_store() {
        let fixture = TestFixture::new().await;
        fixture
            .mock_grant("authorization_code", 200, TestFixture::delegated_body("t1", Some("r1"), 3600), 1)
            .await;
        let config = config(&fixture.platform.uri());
        let store = create_store(&config.store).await.unwrap();
        let broker = CredentialBroker::new(&config, store).unwrap();

        let redirect = broker.flow().begin_login(None, None).await.unwrap();
        let state = broker
            .store()
            .get::<BrowserSession>(&format!("session:{}", redirect.session_id))
            .await
            .unwrap()
            .unwrap()
            .state
            .unwrap();

        broker
            .flow()
            .complete_login(Some(&redirect.session_id), Some("c1"), Some(&state))
            .await
            .unwrap();
        let header = broker
            .resolver()
            .resolve_user_header(Some(&redirect.session_id))
            .await
            .unwrap();
        assert_eq!(header, "Bearer t1");
    }

    #[tokio::test]
    async fn test_bad_scope_configuration_is_rejected() {
        let mut config = config("http://127.0.0.1:1");
        config.platform.oauth_scopes = "data:read, nope".to_string();
        let store = create_store(&config.store).await.unwrap();
        assert!(matches!(
            CredentialBroker::new(&config, store),
            Err(BrokerError::InvalidScope(_))
        ));
    }
}
