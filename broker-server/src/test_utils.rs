use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use broker_core::config::{PlatformConfig, SessionConfig, StoreBackend, StoreConfig};
use broker_core::{create_store, BrokerConfig};
use http::header::{HeaderName, COOKIE, SET_COOKIE};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers;
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

/// Test fixture for exercising the HTTP API against a mocked platform.
///
/// The platform's token endpoint is served by [`TestFixture::platform`];
/// responses are registered per grant type with [`TestFixture::mock_grant`].
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// State shared with the router, for inspecting the session store
    pub state: AppState,
    /// Mock server standing in for the platform's authentication API
    pub platform: MockServer,
}

impl TestFixture {
    pub async fn new() -> Self {
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();

        let platform = MockServer::start().await;
        let config = Self::config(&platform.uri());
        let store = create_store(&config.store)
            .await
            .expect("Failed to create test store");
        let state = AppState::new(config, store).expect("Failed to create app state");
        let app = create_app(state.clone()).await;

        Self {
            app,
            state,
            platform,
        }
    }

    pub fn config(base_url: &str) -> BrokerConfig {
        BrokerConfig {
            port: 8080,
            platform: PlatformConfig {
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
            },
            session: SessionConfig {
                ttl: 86400,
                login_ttl: 600,
                cookie_name: "sid".to_string(),
                cookie_secure: false,
                rotate_on_login: false,
            },
            store: StoreConfig {
                backend: StoreBackend::InMemory,
                memory_capacity: 16,
                redis_url: None,
                key_prefix: "broker:".to_string(),
            },
        }
    }

    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        self.send_with(Method::GET, uri, None).await
    }

    pub async fn get_with_session(&self, uri: impl AsRef<str>, session_id: &str) -> TestResponse {
        self.send_with(Method::GET, uri, Some(session_id)).await
    }

    pub async fn post_with_session(&self, uri: impl AsRef<str>, session_id: &str) -> TestResponse {
        self.send_with(Method::POST, uri, Some(session_id)).await
    }

    async fn send_with(
        &self,
        method: Method,
        uri: impl AsRef<str>,
        session_id: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri.as_ref());
        if let Some(session_id) = session_id {
            builder = builder.header(COOKIE, format!("sid={}", session_id));
        }
        let request = builder
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Redirects and 204s have no body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        TestResponse {
            status,
            headers,
            json,
        }
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
            .and(matchers::body_string_contains(format!(
                "grant_type={}",
                grant_type
            )))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(expected_calls)
            .mount(&self.platform)
            .await;
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn header(&self, name: HeaderName) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// Session id from the response's `Set-Cookie` header.
    pub fn session_cookie(&self) -> Option<String> {
        let cookie = self.header(SET_COOKIE)?;
        let (pair, _) = cookie.split_once(';')?;
        let (_, value) = pair.split_once('=')?;
        Some(value.to_string())
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
