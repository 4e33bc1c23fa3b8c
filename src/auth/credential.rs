//! Bearer credential value and its shared, swappable handle

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Scheme prefix carried by every token before it is placed in a header
pub const TOKEN_SCHEME: &str = "AnaplanAuthToken ";

/// An issued token and its expiry
///
/// The token always carries the [`TOKEN_SCHEME`] prefix so it can be used as
/// an `Authorization` header value as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expiry: DateTime<Utc>,
}

impl Credential {
    /// Create a credential, adding the scheme prefix if it is missing
    pub fn new(token: impl Into<String>, expiry: DateTime<Utc>) -> Self {
        let token = token.into();
        let token = if token.starts_with(TOKEN_SCHEME) {
            token
        } else {
            format!("{TOKEN_SCHEME}{token}")
        };
        Self { token, expiry }
    }

    /// Prefixed token, ready for the `Authorization` header
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Token value without the scheme prefix
    pub fn token_value(&self) -> &str {
        self.token.strip_prefix(TOKEN_SCHEME).unwrap_or(&self.token)
    }

    /// When the service stops accepting this token
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Whether the token has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    /// Read `tokenInfo.tokenValue` and `tokenInfo.expiresAt` (epoch milliseconds)
    pub(crate) fn from_token_info(body: &Value, endpoint: &str) -> Result<Self> {
        let info = body
            .get("tokenInfo")
            .ok_or_else(|| Error::malformed(endpoint, "missing tokenInfo"))?;

        let token = info
            .get("tokenValue")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed(endpoint, "missing tokenInfo.tokenValue"))?;

        let expires_at = match info.get("expiresAt") {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| Error::malformed(endpoint, "missing or non-numeric tokenInfo.expiresAt"))?;

        let expiry = DateTime::<Utc>::from_timestamp_millis(expires_at).ok_or_else(|| {
            Error::malformed(endpoint, format!("expiresAt {expires_at} is out of range"))
        })?;

        Ok(Self::new(token, expiry))
    }
}

/// Shared handle to the current credential
///
/// Readers take an immutable snapshot; the refresh task swaps in a whole new
/// [`Credential`], so token and expiry are never seen from different
/// generations.
#[derive(Clone, Debug)]
pub struct CredentialHandle {
    inner: Arc<RwLock<Arc<Credential>>>,
}

impl CredentialHandle {
    /// Wrap an initial credential
    pub fn new(credential: Credential) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(credential))),
        }
    }

    /// The credential as of now
    pub fn snapshot(&self) -> Arc<Credential> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            // A panicked writer cannot leave a torn value behind: the slot
            // only ever holds a complete Arc.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace token and expiry together
    pub fn replace(&self, credential: Credential) {
        let credential = Arc::new(credential);
        match self.inner.write() {
            Ok(mut guard) => *guard = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }
}
