use crate::config::{PlatformConfig, SessionConfig};
use crate::flow::OAuthFlowController;
use crate::resolver::AuthHeaderResolver;
use crate::session::BrowserSession;
use crate::store::memory::InMemoryStore;
use crate::store::{SessionStore, Store};
use crate::token::{DelegatedToken, TokenBroker};
use chrono::{Duration, Utc};
use log::LevelFilter;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers;
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

/// Mocked platform token endpoint plus an in-memory store.
///
/// Components built from one fixture share its store, so a session written
/// through [`TestFixture::put_session`] is visible to the flow and resolver.
pub struct TestFixture {
    pub platform: MockServer,
    pub store: Arc<Store>,
}

impl TestFixture {
    pub async fn new() -> Self {
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();

        Self {
            platform: MockServer::start().await,
            store: Arc::new(Self::memory_store()),
        }
    }

    pub fn memory_store() -> Store {
        Store::InMemory(InMemoryStore::new(16).unwrap())
    }

    pub fn platform_config(base_url: &str) -> PlatformConfig {
        PlatformConfig {
            client_id: Some("test-client".to_string()),
            client_secret: Some("test-secret".to_string()),
            callback_url: Some("http://localhost:8080/auth/callback".to_string()),
            base_url: base_url.to_string(),
            scopes: "data:read".to_string(),
            oauth_scopes: "data:read".to_string(),
            viewer_scopes: "viewables:read".to_string(),
            app_safety_window: 30,
            user_safety_window: 60,
            app_token_min_ttl: 1,
            http_timeout: 5,
        }
    }

    pub fn session_config() -> SessionConfig {
        SessionConfig {
            ttl: 86400,
            login_ttl: 600,
            cookie_name: "sid".to_string(),
            cookie_secure: false,
            rotate_on_login: false,
        }
    }

    pub fn broker(&self) -> TokenBroker {
        TokenBroker::new(Self::platform_config(&self.platform.uri()), self.store.clone()).unwrap()
    }

    pub fn flow(&self) -> OAuthFlowController {
        OAuthFlowController::new(self.broker(), self.store.clone(), Self::session_config())
    }

    pub fn resolver(&self) -> AuthHeaderResolver {
        let broker = self.broker();
        let flow = OAuthFlowController::new(broker.clone(), self.store.clone(), Self::session_config());
        AuthHeaderResolver::new(broker, flow)
    }

    /// Mounts a token endpoint response for one grant type.
    pub async fn mock_grant(
        &self,
        grant_type: &str,
        status: u16,
        body: Value,
        expected_calls: impl Into<Times>,
    ) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/authentication/v2/token"))
            .and(matchers::body_string_contains(format!("grant_type={}", grant_type)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(expected_calls)
            .mount(&self.platform)
            .await;
    }

    /// Like [`TestFixture::mock_grant`], answering 200 after `delay`.
    pub async fn mock_grant_delayed(
        &self,
        grant_type: &str,
        body: Value,
        delay: std::time::Duration,
        expected_calls: impl Into<Times>,
    ) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/authentication/v2/token"))
            .and(matchers::body_string_contains(format!("grant_type={}", grant_type)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(body)
                    .set_delay(delay),
            )
            .expect(expected_calls)
            .mount(&self.platform)
            .await;
    }

    pub fn app_token_body(access_token: &str, expires_in: u64) -> Value {
        json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        })
    }

    pub fn delegated_body(access_token: &str, refresh_token: Option<&str>, expires_in: u64) -> Value {
        let mut body = json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        });
        if let Some(refresh_token) = refresh_token {
            body["refresh_token"] = json!(refresh_token);
        }
        body
    }

    /// Signed-in session holding access token `t0`, version 1.
    pub fn authenticated_session(
        session_id: &str,
        refresh_token: Option<&str>,
        expires_in: i64,
    ) -> BrowserSession {
        BrowserSession {
            session_id: session_id.to_string(),
            state: None,
            return_to: None,
            delegated: Some(DelegatedToken {
                access_token: "t0".to_string(),
                refresh_token: refresh_token.map(str::to_string),
                expires_at: Utc::now() + Duration::seconds(expires_in),
                token_type: "Bearer".to_string(),
            }),
            version: 1,
        }
    }

    pub async fn put_session(&self, session: &BrowserSession) {
        self.store
            .set(&session.store_key(), session, 3600)
            .await
            .unwrap();
    }

    pub async fn session(&self, session_id: &str) -> Option<BrowserSession> {
        self.store
            .get(&format!("session:{}", session_id))
            .await
            .unwrap()
    }
}
