//! Token data models and token endpoint wire structures

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Application (two-legged) token as kept in the store.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedAppToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds as reported by the platform when issued
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

impl CachedAppToken {
    pub(crate) fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            expires_at: expiry(now, response.expires_in),
            expires_in: response.expires_in,
            access_token: response.access_token,
            token_type: response.token_type,
        }
    }

    /// True while `expires_at` lies more than `window` in the future.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expires_at - now > window
    }

    /// Whole seconds until expiry, zero once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((self.expires_at - now).num_seconds()).unwrap_or(0)
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for CachedAppToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedAppToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Delegated (three-legged) token bound to a browser session.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegatedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl DelegatedToken {
    /// Builds a token from an exchange or refresh response.
    ///
    /// `previous_refresh` is kept when the platform does not rotate the
    /// refresh token.
    pub(crate) fn from_response(
        response: TokenResponse,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            expires_at: expiry(now, response.expires_in),
            refresh_token: response
                .refresh_token
                .filter(|token| !token.is_empty())
                .or(previous_refresh),
            access_token: response.access_token,
            token_type: response.token_type,
        }
    }

    /// Never valid at or after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True once `expires_at` is within `window` of `now` (or already passed).
    pub fn needs_refresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expires_at - now <= window
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for DelegatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedToken")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Successful token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token endpoint error body.
///
/// Accepts both the OAuth shape (`error`, `error_description`) and the
/// platform's own shape (`errorCode`, `developerMessage`).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UpstreamErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default, rename = "errorCode")]
    pub error_code: Option<String>,
    #[serde(default, rename = "developerMessage")]
    pub developer_message: Option<String>,
}

impl UpstreamErrorBody {
    pub fn code(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.error_code.clone())
            .unwrap_or_else(|| "unknown_error".to_string())
    }

    pub fn detail(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.developer_message.clone())
            .unwrap_or_default()
    }
}

fn expiry(now: DateTime<Utc>, expires_in: u64) -> DateTime<Utc> {
    let secs = i64::try_from(expires_in).unwrap_or(i64::MAX / 1000);
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
