//! Cloud platform configuration

use confique::Config;

const TOKEN_PATH: &str = "/authentication/v2/token";
const AUTHORIZE_PATH: &str = "/authentication/v2/authorize";

/// Application identity and token endpoint configuration
#[derive(Debug, Config, Clone)]
pub struct PlatformConfig {
    /// Application client id
    #[config(env = "APS_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Application client secret
    #[config(env = "APS_CLIENT_SECRET")]
    pub client_secret: Option<String>,

    /// Redirect URI registered for the authorization-code flow
    #[config(env = "APS_CALLBACK_URL")]
    pub callback_url: Option<String>,

    /// Platform API base URL
    #[config(env = "APS_BASE_URL", default = "https://developer.api.autodesk.com")]
    pub base_url: String,

    /// Scopes requested for the application token (comma or space separated)
    #[config(env = "APS_SCOPES", default = "data:read")]
    pub scopes: String,

    /// Scopes requested for delegated (user) tokens
    #[config(env = "APS_OAUTH_SCOPES", default = "data:read")]
    pub oauth_scopes: String,

    /// Scopes of the application token handed to browser viewers
    #[config(env = "APS_VIEWER_SCOPES", default = "viewables:read")]
    pub viewer_scopes: String,

    /// Seconds before expiry at which a cached application token is replaced
    #[config(env = "APS_APP_SAFETY_WINDOW", default = 30)]
    pub app_safety_window: u64,

    /// Seconds before expiry at which a delegated token is refreshed
    #[config(env = "APS_USER_SAFETY_WINDOW", default = 60)]
    pub user_safety_window: u64,

    /// Lower bound for the store TTL of a cached application token
    #[config(env = "APS_APP_TOKEN_MIN_TTL", default = 1)]
    pub app_token_min_ttl: u64,

    /// Token endpoint request timeout in seconds
    #[config(env = "APS_HTTP_TIMEOUT", default = 10)]
    pub http_timeout: u64,
}

impl PlatformConfig {
    pub fn token_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), TOKEN_PATH)
    }

    pub fn authorize_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), AUTHORIZE_PATH)
    }
}
