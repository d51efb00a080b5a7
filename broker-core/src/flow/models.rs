use crate::session::BrowserSession;
use url::Url;

/// Result of starting a login.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Provider authorization URL carrying the new CSRF state
    pub authorize_url: Url,
    pub session_id: String,
    /// Present when a session id had to be minted for this browser
    pub set_cookie: Option<String>,
}

/// Result of a successful provider callback.
#[derive(Debug, Clone)]
pub struct LoginCompletion {
    pub session: BrowserSession,
    /// Where the browser goes next, `/` when the login carried no target
    pub return_to: String,
    /// Present when the session id was rotated
    pub set_cookie: Option<String>,
}

/// Normalises a post-login redirect target.
///
/// Accepts site-relative paths (`/x`, but not protocol-relative `//x`) and
/// absolute http(s) URLs. Anything else is dropped.
pub(crate) fn sanitize_return_to(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with('/') {
        if raw.starts_with("//") || raw.starts_with("/\\") {
            return None;
        }
        return Some(raw.to_string());
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            Some(url.to_string())
        }
        _ => None,
    }
}
