//! Authorization-code login flow bound to a browser session.
//!
//! A session moves through these states:
//!
//! ```text
//! NoSession -> PendingLogin -> Authenticated -> (Refreshing) -> Authenticated
//!                                                            \-> Expired
//! ```
//!
//! `PendingLogin` is a stored [`BrowserSession`] with a CSRF `state` and no
//! delegated token. The callback validates, in order, the session cookie,
//! the stored session, the code and the state, and only then exchanges the
//! code. Refreshing happens lazily when a caller asks for the delegated
//! token inside the safety window.

pub mod models;

pub use models::{LoginCompletion, LoginRedirect};

use crate::config::SessionConfig;
use crate::cookie::{self, SessionCookie};
use crate::error::BrokerError;
use crate::session::{self, BrowserSession, LoginStatus};
use crate::singleflight::SingleFlight;
use crate::store::{SessionStore, Store};
use crate::token::{DelegatedToken, TokenBroker};
use chrono::Utc;
use log::{debug, info, warn};
use models::sanitize_return_to;
use std::sync::Arc;

#[derive(Clone)]
pub struct OAuthFlowController {
    broker: TokenBroker,
    store: Arc<Store>,
    config: SessionConfig,
    cookie: SessionCookie,
    refreshes: SingleFlight,
    callbacks: SingleFlight,
}

impl OAuthFlowController {
    pub fn new(broker: TokenBroker, store: Arc<Store>, config: SessionConfig) -> Self {
        let cookie = SessionCookie::new(config.cookie_name.clone(), config.cookie_secure);
        Self {
            broker,
            store,
            config,
            cookie,
            refreshes: SingleFlight::new(),
            callbacks: SingleFlight::new(),
        }
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    /// Starts a login for the browser identified by `session_id`.
    ///
    /// A new id is minted when the browser has none, or presents one the
    /// store holds no record for. An already authenticated session keeps its
    /// delegated token until the new callback replaces it.
    pub async fn begin_login(
        &self,
        session_id: Option<&str>,
        return_to: Option<&str>,
    ) -> Result<LoginRedirect, BrokerError> {
        self.broker.ensure_delegated_config()?;

        let presented = session_id.filter(|id| cookie::is_valid_session_id(id));
        let existing = match presented {
            Some(id) => self
                .store
                .get::<BrowserSession>(&session::session_key(id))
                .await?
                .map(|session| (id.to_string(), session)),
            None => None,
        };

        let (session_id, existing, set_cookie) = match existing {
            Some((id, session)) => (id, Some(session), None),
            None => {
                if let Some(id) = presented {
                    debug!("No record for session {}, issuing a new id", session::log_id(id));
                }
                let id = cookie::generate_id();
                let set_cookie = self.cookie.issue(&id);
                (id, None, Some(set_cookie))
            }
        };

        let state = cookie::generate_id();
        let return_to = sanitize_return_to(return_to);
        let key = session::session_key(&session_id);

        let (session, ttl) = match existing {
            Some(mut session) if session.is_authenticated() => {
                session.state = Some(state.clone());
                session.return_to = return_to;
                (session, self.config.ttl)
            }
            _ => (
                BrowserSession::pending(session_id.clone(), state.clone(), return_to),
                self.config.login_ttl,
            ),
        };
        self.store.set(&key, &session, ttl).await?;

        let authorize_url = self.broker.authorization_url(&state)?;
        info!("Login started for session {}", session.log_id());

        Ok(LoginRedirect {
            authorize_url,
            session_id,
            set_cookie,
        })
    }

    /// Handles the provider callback.
    ///
    /// Nothing is exchanged unless the cookie, the stored session, the code
    /// and the state all check out. Callbacks for one session run one at a
    /// time, so a state value is consumed by exactly one of them.
    pub async fn complete_login(
        &self,
        session_id: Option<&str>,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<LoginCompletion, BrokerError> {
        let session_id =
            session_id.ok_or(BrokerError::InvalidSession("missing session cookie"))?;
        let key = session::session_key(session_id);
        let _flight = self.callbacks.acquire(&key).await;

        let mut session = self
            .store
            .get::<BrowserSession>(&key)
            .await?
            .ok_or(BrokerError::InvalidSession("login session expired or unknown"))?;

        let code = code
            .filter(|code| !code.is_empty())
            .ok_or(BrokerError::InvalidCallback("missing authorization code"))?;

        let expected = session.state.as_deref().unwrap_or_default();
        let received = state.unwrap_or_default();
        if expected.is_empty()
            || received.is_empty()
            || !cookie::constant_time_eq(expected.as_bytes(), received.as_bytes())
        {
            warn!(
                "Login callback state mismatch for session {}, possible CSRF attempt",
                session.log_id()
            );
            return Err(BrokerError::InvalidState);
        }

        let token = self.broker.exchange_code(code).await?;

        session.state = None;
        let return_to = session.return_to.take().unwrap_or_else(|| "/".to_string());
        session.delegated = Some(token);
        session.version += 1;

        let mut set_cookie = None;
        if self.config.rotate_on_login {
            let rotated = cookie::generate_id();
            if let Err(e) = self.store.delete(&key).await {
                warn!("Failed to remove pre-login session {}: {}", session.log_id(), e);
            }
            set_cookie = Some(self.cookie.issue(&rotated));
            session.session_id = rotated;
        }

        self.store
            .set(&session.store_key(), &session, self.config.ttl)
            .await?;
        info!("Login completed for session {}", session.log_id());

        Ok(LoginCompletion {
            session,
            return_to,
            set_cookie,
        })
    }

    /// Deletes the session and returns the `Set-Cookie` value clearing it.
    pub async fn logout(&self, session_id: Option<&str>) -> Result<String, BrokerError> {
        if let Some(session_id) = session_id {
            self.store.delete(&session::session_key(session_id)).await?;
            info!("Session {} logged out", session::log_id(session_id));
        }
        Ok(self.cookie.clear())
    }

    /// Reports whether the browser holds a usable delegated login.
    pub async fn login_status(&self, session_id: Option<&str>) -> Result<LoginStatus, BrokerError> {
        let Some(session_id) = session_id else {
            return Ok(LoginStatus::anonymous());
        };
        let session = self
            .store
            .get::<BrowserSession>(&session::session_key(session_id))
            .await?;

        let status = match session.and_then(|session| session.delegated) {
            Some(token) if !token.is_expired(Utc::now()) || token.can_refresh() => LoginStatus {
                authenticated: true,
                expires_at: Some(token.expires_at),
            },
            _ => LoginStatus::anonymous(),
        };
        Ok(status)
    }

    /// Delegated token for the session, refreshed first when it is inside
    /// the safety window.
    pub async fn delegated_token(
        &self,
        session_id: Option<&str>,
    ) -> Result<DelegatedToken, BrokerError> {
        let session_id = session_id.ok_or(BrokerError::NotAuthenticated)?;
        let session = self.load_session(session_id).await?;
        let token = session.delegated.ok_or(BrokerError::NotAuthenticated)?;

        if !token.needs_refresh(Utc::now(), self.broker.user_safety_window()) {
            return Ok(token);
        }
        self.refresh_session(session_id).await
    }

    /// Refreshes the session's delegated token.
    ///
    /// One refresh per session runs at a time; callers queued behind it pick
    /// up its result. The refreshed token is written back only if no other
    /// writer replaced the session meanwhile, and only if this future is
    /// still being polled when the platform answers.
    async fn refresh_session(&self, session_id: &str) -> Result<DelegatedToken, BrokerError> {
        let key = session::session_key(session_id);
        let _flight = self.refreshes.acquire(&key).await;

        let session = self.load_session(session_id).await?;
        let token = session
            .delegated
            .clone()
            .ok_or(BrokerError::NotAuthenticated)?;
        if !token.needs_refresh(Utc::now(), self.broker.user_safety_window()) {
            debug!("Session {} already refreshed", session.log_id());
            return Ok(token);
        }

        let refresh_token = token
            .refresh_token
            .as_deref()
            .filter(|refresh| !refresh.is_empty())
            .ok_or(BrokerError::ReauthRequired("no refresh token"))?;

        let refreshed = match self.broker.refresh(refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(BrokerError::UpstreamAuthFailure { status, code, .. })
                if status == 400 || status == 401 =>
            {
                warn!(
                    "Refresh rejected for session {} ({}), login required",
                    session.log_id(),
                    code
                );
                self.drop_delegated(&key, session.version).await?;
                return Err(BrokerError::ReauthRequired("refresh token rejected"));
            }
            Err(e) => return Err(e),
        };

        let mut current = self
            .store
            .get::<BrowserSession>(&key)
            .await?
            .ok_or(BrokerError::InvalidSession("session ended during refresh"))?;
        if current.version != session.version {
            debug!(
                "Session {} changed during refresh, keeping the newer record",
                current.log_id()
            );
            return current.delegated.ok_or(BrokerError::NotAuthenticated);
        }

        current.delegated = Some(refreshed.clone());
        current.version += 1;
        self.store.set(&key, &current, self.config.ttl).await?;
        info!(
            "Refreshed delegated token for session {}, expires at {}",
            current.log_id(),
            refreshed.expires_at
        );
        Ok(refreshed)
    }

    async fn drop_delegated(&self, key: &str, seen_version: u64) -> Result<(), BrokerError> {
        if let Some(mut current) = self.store.get::<BrowserSession>(key).await? {
            if current.version == seen_version {
                current.delegated = None;
                current.version += 1;
                self.store.set(key, &current, self.config.ttl).await?;
            }
        }
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> Result<BrowserSession, BrokerError> {
        self.store
            .get::<BrowserSession>(&session::session_key(session_id))
            .await?
            .ok_or(BrokerError::InvalidSession("session not found"))
    }
}
