use std::fmt;

use bytes::Bytes;

use crate::error::Result;

/// Session token handed out by a successful login.
///
/// Treated as opaque credential material and redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token value.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building authenticated requests.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<redacted:{} bytes>)", self.0.len())
    }
}

/// The out-of-band HTTP side of the live-timing service.
///
/// All calls are blocking; async callers run them on a blocking worker.
pub trait TimingService: Send + Sync + 'static {
    /// Log on with `(identity, secret)` and return the session token.
    fn login(&self, email: &str, password: &str) -> Result<AuthToken>;

    /// Fetch the decryption key for an event, authenticated with `token`.
    fn fetch_session_key(&self, event: &str, token: &AuthToken) -> Result<u32>;

    /// Fetch the full-state blob for a snapshot id.
    fn fetch_snapshot(&self, snapshot_id: u16) -> Result<Bytes>;
}

/// A location in a hierarchical notification store.
///
/// Creating a child is local; only `push` talks to the server.
pub trait NotificationRef: Clone + Send + 'static {
    /// Reference to `path` relative to this location.
    fn child(&self, path: &str) -> Self;

    /// Append `value` under a server-generated key and return that key.
    fn push(&self, value: &serde_json::Value) -> Result<String>;

    /// Human-readable location, used in logs.
    fn location(&self) -> String;
}
