use crate::store::StoreError;
use thiserror::Error;

/// Every way a credential request can fail.
///
/// Configuration problems (`MissingCredentials`, `InvalidScope`) are raised
/// before any network call. Session and state problems are raised before any
/// token exchange. Upstream failures carry the platform's own error code and
/// description but never the request that produced them.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Missing credentials: {0} is not configured")]
    MissingCredentials(&'static str),

    #[error("Invalid scope: unrecognized {}", .0.join(", "))]
    InvalidScope(Vec<String>),

    #[error("Invalid session: {0}")]
    InvalidSession(&'static str),

    #[error("Invalid state: callback does not match the pending login")]
    InvalidState,

    #[error("Invalid callback: {0}")]
    InvalidCallback(&'static str),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Re-authentication required: {0}")]
    ReauthRequired(&'static str),

    #[error("Upstream authentication failure (status {status}): {code}: {detail}")]
    UpstreamAuthFailure {
        status: u16,
        code: String,
        detail: String,
    },

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Fieldless discriminant of [`BrokerError`] for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredentials,
    InvalidScope,
    InvalidSession,
    InvalidState,
    InvalidCallback,
    NotAuthenticated,
    ReauthRequired,
    UpstreamAuthFailure,
    Store,
    Transport,
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredentials(_) => ErrorKind::MissingCredentials,
            Self::InvalidScope(_) => ErrorKind::InvalidScope,
            Self::InvalidSession(_) => ErrorKind::InvalidSession,
            Self::InvalidState => ErrorKind::InvalidState,
            Self::InvalidCallback(_) => ErrorKind::InvalidCallback,
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::ReauthRequired(_) => ErrorKind::ReauthRequired,
            Self::UpstreamAuthFailure { .. } => ErrorKind::UpstreamAuthFailure,
            Self::Store(_) => ErrorKind::Store,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// True when the caller should be sent through the login flow again
    /// rather than shown an error.
    pub fn requires_login(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotAuthenticated | ErrorKind::InvalidSession | ErrorKind::ReauthRequired
        )
    }

    /// True for errors caused by configuration rather than by the request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MissingCredentials | ErrorKind::InvalidScope
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_scope_message_lists_every_token() {
        let err = BrokerError::InvalidScope(vec!["foo:bar".to_string(), "baz".to_string()]);
        assert_eq!(err.to_string(), "Invalid scope: unrecognized foo:bar, baz");
    }

    #[test]
    fn test_requires_login_distinguishes_failures() {
        assert!(BrokerError::NotAuthenticated.requires_login());
        assert!(BrokerError::InvalidSession("gone").requires_login());
        assert!(BrokerError::ReauthRequired("no refresh token").requires_login());
        assert!(!BrokerError::InvalidState.requires_login());
        assert!(!BrokerError::MissingCredentials("client_id").requires_login());
        assert!(!BrokerError::UpstreamAuthFailure {
            status: 401,
            code: "invalid_client".to_string(),
            detail: "bad secret".to_string(),
        }
        .requires_login());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(BrokerError::MissingCredentials("client_secret").is_configuration());
        assert!(BrokerError::InvalidScope(vec!["x".to_string()]).is_configuration());
        assert!(!BrokerError::InvalidState.is_configuration());
    }
}
