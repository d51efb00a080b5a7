//! Authorization header resolution for downstream platform calls.

use crate::error::BrokerError;
use crate::flow::OAuthFlowController;
use crate::token::TokenBroker;
use log::debug;

/// Which identity a downstream call should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialMode {
    /// Application token only
    #[default]
    App,
    /// The signed-in user's delegated token only
    User,
    /// Delegated token when the browser is signed in, application token otherwise
    PreferUser,
}

/// Turns the broker's tokens into `Authorization` header values.
#[derive(Clone)]
pub struct AuthHeaderResolver {
    broker: TokenBroker,
    flow: OAuthFlowController,
}

impl AuthHeaderResolver {
    pub fn new(broker: TokenBroker, flow: OAuthFlowController) -> Self {
        Self { broker, flow }
    }

    pub async fn resolve_app_header(&self) -> Result<String, BrokerError> {
        Ok(self.broker.get_app_token().await?.bearer())
    }

    /// Bearer header for the session's delegated token, refreshing it when
    /// it is about to expire.
    pub async fn resolve_user_header(
        &self,
        session_id: Option<&str>,
    ) -> Result<String, BrokerError> {
        Ok(self.flow.delegated_token(session_id).await?.bearer())
    }

    pub async fn resolve_header(
        &self,
        mode: CredentialMode,
        session_id: Option<&str>,
    ) -> Result<String, BrokerError> {
        match mode {
            CredentialMode::App => self.resolve_app_header().await,
            CredentialMode::User => self.resolve_user_header(session_id).await,
            CredentialMode::PreferUser => match self.resolve_user_header(session_id).await {
                Err(BrokerError::NotAuthenticated) | Err(BrokerError::InvalidSession(_)) => {
                    debug!("No signed-in user, falling back to the application token");
                    self.resolve_app_header().await
                }
                other => other,
            },
        }
    }
}
