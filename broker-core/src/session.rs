//! Browser session records.

use crate::token::DelegatedToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side state for one browser.
///
/// The browser only ever holds `session_id`; the delegated token stays in
/// the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserSession {
    pub session_id: String,
    /// CSRF value of the pending login, cleared once the callback succeeds
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub return_to: Option<String>,
    #[serde(default)]
    pub delegated: Option<DelegatedToken>,
    /// Bumped on every write that replaces the delegated token
    #[serde(default)]
    pub version: u64,
}

impl BrowserSession {
    /// A session waiting for the provider callback.
    pub fn pending(session_id: String, state: String, return_to: Option<String>) -> Self {
        Self {
            session_id,
            state: Some(state),
            return_to,
            delegated: None,
            version: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.delegated.is_some()
    }

    pub fn store_key(&self) -> String {
        session_key(&self.session_id)
    }

    /// Short, non-secret form of the id for log lines.
    pub fn log_id(&self) -> &str {
        log_id(&self.session_id)
    }
}

/// Login state reported to the browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginStatus {
    pub authenticated: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LoginStatus {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            expires_at: None,
        }
    }
}

pub(crate) fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

pub(crate) fn log_id(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}
