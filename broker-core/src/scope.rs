//! Permission string parsing.
//!
//! Human supplied scope strings (from configuration or a route) are mapped
//! onto the platform's fixed vocabulary. Parsing is all-or-nothing: a single
//! unknown token rejects the whole string, and the error names every unknown
//! token so a broken configuration can be fixed in one pass.

use crate::error::BrokerError;
use std::fmt;
use std::str::FromStr;

/// A single platform permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    UserProfileRead,
    UserRead,
    UserWrite,
    ViewablesRead,
    DataRead,
    DataWrite,
    DataCreate,
    DataSearch,
    BucketCreate,
    BucketRead,
    BucketUpdate,
    BucketDelete,
    CodeAll,
    AccountRead,
    AccountWrite,
    OpenId,
}

impl Scope {
    pub const ALL: [Scope; 16] = [
        Scope::UserProfileRead,
        Scope::UserRead,
        Scope::UserWrite,
        Scope::ViewablesRead,
        Scope::DataRead,
        Scope::DataWrite,
        Scope::DataCreate,
        Scope::DataSearch,
        Scope::BucketCreate,
        Scope::BucketRead,
        Scope::BucketUpdate,
        Scope::BucketDelete,
        Scope::CodeAll,
        Scope::AccountRead,
        Scope::AccountWrite,
        Scope::OpenId,
    ];

    /// Least-privileged read scope, used when no scope is requested.
    pub const DEFAULT: Scope = Scope::DataRead;

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::UserProfileRead => "user-profile:read",
            Scope::UserRead => "user:read",
            Scope::UserWrite => "user:write",
            Scope::ViewablesRead => "viewables:read",
            Scope::DataRead => "data:read",
            Scope::DataWrite => "data:write",
            Scope::DataCreate => "data:create",
            Scope::DataSearch => "data:search",
            Scope::BucketCreate => "bucket:create",
            Scope::BucketRead => "bucket:read",
            Scope::BucketUpdate => "bucket:update",
            Scope::BucketDelete => "bucket:delete",
            Scope::CodeAll => "code:all",
            Scope::AccountRead => "account:read",
            Scope::AccountWrite => "account:write",
            Scope::OpenId => "openid",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| BrokerError::InvalidScope(vec![s.to_string()]))
    }
}

/// Ordered, duplicate free set of scopes.
///
/// Order is first-seen order of the input, which keeps the rendered form
/// stable and therefore usable as part of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeSet(Vec<Scope>);

impl ScopeSet {
    /// Parses a comma and/or whitespace separated scope string.
    pub fn resolve(raw: &str) -> Result<Self, BrokerError> {
        let mut scopes: Vec<Scope> = Vec::new();
        let mut unknown: Vec<String> = Vec::new();

        for token in raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            match token.parse::<Scope>() {
                Ok(scope) => {
                    if !scopes.contains(&scope) {
                        scopes.push(scope);
                    }
                }
                Err(_) => {
                    if !unknown.iter().any(|u| u == token) {
                        unknown.push(token.to_string());
                    }
                }
            }
        }

        if !unknown.is_empty() {
            return Err(BrokerError::InvalidScope(unknown));
        }

        if scopes.is_empty() {
            scopes.push(Scope::DEFAULT);
        }

        Ok(Self(scopes))
    }

    pub fn as_slice(&self) -> &[Scope] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.0.iter()
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Space separated, as the token endpoint expects it.
impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, scope) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(scope.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for ScopeSet {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

/// Resolves a raw permission string into a [`ScopeSet`].
pub fn resolve(raw: &str) -> Result<ScopeSet, BrokerError> {
    ScopeSet::resolve(raw)
}
