//! Session cookie formatting and parsing, plus random identifier generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use subtle::ConstantTimeEq;

const MIN_ID_LEN: usize = 16;
const MAX_ID_LEN: usize = 128;

/// Builds and reads the cookie carrying the opaque session id.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Set-Cookie` value binding the browser to `session_id`.
    pub fn issue(&self, session_id: &str) -> String {
        self.format(session_id, None)
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear(&self) -> String {
        self.format("", Some(0))
    }

    fn format(&self, value: &str, max_age: Option<u64>) -> String {
        let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", self.name, value);
        if let Some(max_age) = max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Session id from a `Cookie` request header.
    ///
    /// Values that could not have been issued by [`generate_id`] are ignored.
    pub fn extract(&self, header: &str) -> Option<String> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim().trim_matches('"'))
            .filter(|value| is_valid_session_id(value))
            .map(str::to_string)
    }
}

/// 256 random bits, base64url encoded.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn is_valid_session_id(value: &str) -> bool {
    (MIN_ID_LEN..=MAX_ID_LEN).contains(&value.len())
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Compares two secrets in time independent of where they differ.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
