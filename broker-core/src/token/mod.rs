//! Token acquisition against the platform's token endpoint.
//!
//! [`TokenBroker`] owns the application (client-credentials) token cache and
//! performs the delegated authorization-code exchange and refresh grants.
//! Delegated tokens are never cached here; the login flow persists them in
//! the browser session.

pub mod models;

pub use models::{CachedAppToken, DelegatedToken};

use crate::config::PlatformConfig;
use crate::error::BrokerError;
use crate::scope::ScopeSet;
use crate::singleflight::SingleFlight;
use crate::store::{SessionStore, Store};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use models::{TokenResponse, UpstreamErrorBody};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use url::Url;

/// Application and delegated token broker.
///
/// Cheap to clone; clones share the HTTP connection pool, the store and the
/// single-flight guards.
#[derive(Clone)]
pub struct TokenBroker {
    config: Arc<PlatformConfig>,
    store: Arc<Store>,
    client: Client,
    app_scopes: ScopeSet,
    oauth_scopes: ScopeSet,
    viewer_scopes: ScopeSet,
    flights: SingleFlight,
}

impl TokenBroker {
    /// Creates a broker, resolving every configured scope string up front so
    /// a bad scope is reported at startup rather than on first use.
    pub fn new(config: PlatformConfig, store: Arc<Store>) -> Result<Self, BrokerError> {
        let app_scopes = ScopeSet::resolve(&config.scopes)?;
        let oauth_scopes = ScopeSet::resolve(&config.oauth_scopes)?;
        let viewer_scopes = ScopeSet::resolve(&config.viewer_scopes)?;
        let client = Self::create_http_client(config.http_timeout)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            client,
            app_scopes,
            oauth_scopes,
            viewer_scopes,
            flights: SingleFlight::new(),
        })
    }

    fn create_http_client(timeout: u64) -> Result<Client, BrokerError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout))
            .connect_timeout(std::time::Duration::from_secs(2))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(std::time::Duration::from_secs(90)))
            .build()?;
        Ok(client)
    }

    pub fn app_scopes(&self) -> &ScopeSet {
        &self.app_scopes
    }

    pub fn oauth_scopes(&self) -> &ScopeSet {
        &self.oauth_scopes
    }

    pub fn viewer_scopes(&self) -> &ScopeSet {
        &self.viewer_scopes
    }

    pub fn app_safety_window(&self) -> Duration {
        Duration::seconds(saturating_secs(self.config.app_safety_window))
    }

    pub fn user_safety_window(&self) -> Duration {
        Duration::seconds(saturating_secs(self.config.user_safety_window))
    }

    /// Application token for the configured application scopes.
    pub async fn get_app_token(&self) -> Result<CachedAppToken, BrokerError> {
        self.app_token_for(&self.app_scopes).await
    }

    /// Application token for the configured viewer scopes.
    pub async fn viewer_token(&self) -> Result<CachedAppToken, BrokerError> {
        self.app_token_for(&self.viewer_scopes).await
    }

    /// Application token for `scopes`, served from the store while it is
    /// outside the safety window.
    ///
    /// Concurrent misses for the same client and scopes collapse into one
    /// token request.
    pub async fn app_token_for(&self, scopes: &ScopeSet) -> Result<CachedAppToken, BrokerError> {
        let (client_id, client_secret) = self.client_credentials()?;
        let cache_key = app_token_cache_key(client_id, scopes);

        if let Some(token) = self.cached_app_token(&cache_key).await {
            return Ok(token);
        }

        let _flight = self.flights.acquire(&cache_key).await;

        // another caller may have fetched while we waited
        if let Some(token) = self.cached_app_token(&cache_key).await {
            return Ok(token);
        }

        let scope_param = scopes.to_string();
        let response = self
            .request_token(
                client_id,
                client_secret,
                &[
                    ("grant_type", "client_credentials"),
                    ("scope", scope_param.as_str()),
                ],
            )
            .await?;

        let now = Utc::now();
        let token = CachedAppToken::from_response(response, now);
        info!(
            "Acquired application token for scopes '{}', expires in {}s",
            scope_param, token.expires_in
        );

        match app_token_ttl(
            token.expires_at,
            now,
            self.config.app_safety_window,
            self.config.app_token_min_ttl,
        ) {
            Some(ttl) => {
                if let Err(e) = self.store.set(&cache_key, &token, ttl).await {
                    warn!("Failed to cache application token for {}: {}", cache_key, e);
                }
            }
            None => debug!(
                "Application token lifetime too short to cache ({}s)",
                token.expires_in
            ),
        }

        Ok(token)
    }

    async fn cached_app_token(&self, cache_key: &str) -> Option<CachedAppToken> {
        match self.store.get::<CachedAppToken>(cache_key).await {
            Ok(Some(token)) if token.is_fresh(Utc::now(), self.app_safety_window()) => {
                debug!("Cache hit for key: {}", cache_key);
                Some(token)
            }
            Ok(Some(_)) => {
                debug!("Cached token inside safety window for key: {}", cache_key);
                None
            }
            Ok(None) => {
                debug!("Cache miss for key: {}", cache_key);
                None
            }
            Err(e) => {
                warn!("Cache error for key {}: {}", cache_key, e);
                None
            }
        }
    }

    /// Exchanges an authorization code for a delegated token.
    pub async fn exchange_code(&self, code: &str) -> Result<DelegatedToken, BrokerError> {
        let (client_id, client_secret) = self.client_credentials()?;
        let redirect_uri = self.redirect_uri()?;

        let response = self
            .request_token(
                client_id,
                client_secret,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                ],
            )
            .await?;

        let token = DelegatedToken::from_response(response, None, Utc::now());
        debug!(
            "Exchanged authorization code, delegated token expires at {}",
            token.expires_at
        );
        Ok(token)
    }

    /// Refreshes a delegated token with the configured delegated scopes.
    ///
    /// When the platform does not rotate the refresh token, the one passed
    /// in is carried over into the result.
    pub async fn refresh(&self, refresh_token: &str) -> Result<DelegatedToken, BrokerError> {
        let (client_id, client_secret) = self.client_credentials()?;
        self.redirect_uri()?;

        let scope_param = self.oauth_scopes.to_string();
        let response = self
            .request_token(
                client_id,
                client_secret,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("scope", scope_param.as_str()),
                ],
            )
            .await?;

        let rotated = response.refresh_token.is_some();
        let token =
            DelegatedToken::from_response(response, Some(refresh_token.to_string()), Utc::now());
        debug!(
            "Refreshed delegated token (refresh token rotated: {}), expires at {}",
            rotated, token.expires_at
        );
        Ok(token)
    }

    /// Authorization endpoint URL for a login carrying `state`.
    pub fn authorization_url(&self, state: &str) -> Result<Url, BrokerError> {
        let client_id = self.client_id()?;
        let redirect_uri = self.redirect_uri()?;

        let mut url = Url::parse(&self.config.authorize_url())
            .map_err(|_| BrokerError::MissingCredentials("a valid platform base URL"))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.oauth_scopes.to_string())
            .append_pair("state", state);
        Ok(url)
    }

    /// Fails with `MissingCredentials` unless everything the
    /// authorization-code flow needs is configured.
    pub fn ensure_delegated_config(&self) -> Result<(), BrokerError> {
        self.client_credentials()?;
        self.redirect_uri()?;
        Ok(())
    }

    async fn request_token(
        &self,
        client_id: &str,
        client_secret: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, BrokerError> {
        let response = self
            .client
            .post(self.config.token_url())
            .basic_auth(client_id, Some(client_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let upstream: UpstreamErrorBody = serde_json::from_str(&body).unwrap_or_default();
            warn!(
                "Token endpoint rejected {} request with status {}: {}",
                grant_type(form),
                status,
                upstream.code()
            );
            return Err(BrokerError::UpstreamAuthFailure {
                status: status.as_u16(),
                code: upstream.code(),
                detail: upstream.detail(),
            });
        }

        Ok(response.json::<TokenResponse>().await?)
    }

    fn client_id(&self) -> Result<&str, BrokerError> {
        non_empty(&self.config.client_id).ok_or(BrokerError::MissingCredentials("client_id"))
    }

    fn client_credentials(&self) -> Result<(&str, &str), BrokerError> {
        let client_id = self.client_id()?;
        let client_secret = non_empty(&self.config.client_secret)
            .ok_or(BrokerError::MissingCredentials("client_secret"))?;
        Ok((client_id, client_secret))
    }

    fn redirect_uri(&self) -> Result<&str, BrokerError> {
        non_empty(&self.config.callback_url).ok_or(BrokerError::MissingCredentials("callback_url"))
    }
}

/// Store key for an application token.
///
/// Hashing keeps the client id out of the store's key space.
fn app_token_cache_key(client_id: &str, scopes: &ScopeSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(scopes.to_string().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("app_token:{}", &hash[..16])
}

/// Store TTL (seconds) for an application token expiring at `expires_at`.
///
/// `max(min_ttl, remaining - margin)`, and `None` when that would not be
/// strictly shorter than the token's real remaining lifetime.
pub(crate) fn app_token_ttl(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    margin_secs: u64,
    min_ttl_secs: u64,
) -> Option<u64> {
    let remaining = u64::try_from((expires_at - now).num_seconds()).ok()?;
    let ttl = remaining.saturating_sub(margin_secs).max(min_ttl_secs);
    (ttl > 0 && ttl < remaining).then_some(ttl)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn grant_type<'a>(form: &[(&str, &'a str)]) -> &'a str {
    form.iter()
        .find(|(key, _)| *key == "grant_type")
        .map(|(_, value)| *value)
        .unwrap_or("token")
}

fn saturating_secs(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX / 1000)
}
