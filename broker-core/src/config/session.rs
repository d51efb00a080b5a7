use confique::Config;

/// Browser session configuration
#[derive(Debug, Config, Clone)]
pub struct SessionConfig {
    /// Lifetime of an authenticated session in seconds (default: 1 day)
    #[config(env = "BROKER_SESSION_TTL", default = 86400)]
    pub ttl: u64,

    /// Lifetime of a pending login in seconds (default: 10 minutes)
    #[config(env = "BROKER_LOGIN_TTL", default = 600)]
    pub login_ttl: u64,

    /// Name of the cookie carrying the session id
    #[config(env = "BROKER_SESSION_COOKIE", default = "sid")]
    pub cookie_name: String,

    /// Adds the `Secure` attribute to the session cookie
    #[config(env = "BROKER_COOKIE_SECURE", default = false)]
    pub cookie_secure: bool,

    /// Issue a fresh session id once the login callback succeeds
    #[config(env = "BROKER_ROTATE_SESSION_ON_LOGIN", default = false)]
    pub rotate_on_login: bool,
}
