/// Errors that can occur while talking to the live-timing service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the live connection.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on a stream or response body.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request never produced a response (DNS, socket, TLS).
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with an unexpected status code.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Login did not answer with the expected redirect.
    #[error("login rejected (HTTP {status}, expected 302)")]
    LoginRejected { status: u16 },

    /// Login redirected but carried no session token.
    #[error("login response carried no {0} cookie")]
    MissingSessionToken(&'static str),

    /// The session key body is not a hex integer.
    #[error("invalid session key {body:?}: {source}")]
    InvalidKey {
        body: String,
        source: std::num::ParseIntError,
    },

    /// A snapshot body ran past the configured size limit.
    #[error("{url} exceeds {limit} bytes")]
    SnapshotTooLarge { url: String, limit: u64 },

    /// A notification push returned no generated key.
    #[error("push to {url} returned no key")]
    MissingPushKey { url: String },

    /// JSON encoding/decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether the error is an authentication failure rather than a transport fault.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            TransportError::LoginRejected { .. } | TransportError::MissingSessionToken(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
