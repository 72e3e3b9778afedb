use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{AuthToken, TimingService};

/// Host serving both the live stream and the HTTP endpoints.
pub const LIVE_TIMING_HOST: &str = "live-timing.formula1.com";

/// Port of the persistent live stream.
pub const LIVE_PORT: u16 = 4321;

/// Cookie carrying the session token after login.
const SESSION_COOKIE: &str = "USER";

/// Snapshots are a few hundred KiB; anything far larger is not a snapshot.
pub const MAX_SNAPSHOT_BYTES: u64 = 16 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("livetiming/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP client for login, session keys and snapshot blobs.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    agent: ureq::Agent,
    max_snapshot_bytes: u64,
}

impl HttpClient {
    /// Client for `http://{host}`.
    pub fn new(host: &str) -> Self {
        Self::with_base_url(format!("http://{host}"))
    }

    /// Client for an explicit base URL (scheme, host and optional port).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        // Login success is signalled by the redirect itself, so never follow one.
        let agent = ureq::AgentBuilder::new()
            .redirects(0)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
            max_snapshot_bytes: MAX_SNAPSHOT_BYTES,
        }
    }

    /// Reject snapshot bodies longer than `limit` bytes.
    pub fn with_max_snapshot_bytes(mut self, limit: u64) -> Self {
        self.max_snapshot_bytes = limit;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the full-state blob for `snapshot_id`.
    pub fn snapshot_url(&self, snapshot_id: u16) -> String {
        format!("{}/keyframe_{snapshot_id:05}.bin", self.base_url)
    }

    /// URL of the session key for `event`, without the auth parameter.
    pub fn session_key_url(&self, event: &str) -> String {
        format!("{}/reg/getkey/{event:0>5}.asp", self.base_url)
    }

    fn login_url(&self) -> String {
        format!("{}/reg/login", self.base_url)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("max_snapshot_bytes", &self.max_snapshot_bytes)
            .finish()
    }
}

impl TimingService for HttpClient {
    fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        let url = self.login_url();
        debug!(%url, "[POST] login");
        let response = match self
            .agent
            .post(&url)
            .send_form(&[("email", email), ("password", password)])
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(TransportError::LoginRejected { status })
            }
            Err(err) => return Err(request_error(&url, err)),
        };

        if response.status() != 302 {
            return Err(TransportError::LoginRejected {
                status: response.status(),
            });
        }

        session_token_from_cookies(&response.all("set-cookie"), SESSION_COOKIE)
            .map(AuthToken::new)
            .ok_or(TransportError::MissingSessionToken(SESSION_COOKIE))
    }

    fn fetch_session_key(&self, event: &str, token: &AuthToken) -> Result<u32> {
        let url = self.session_key_url(event);
        debug!(%url, "[GET] session key");
        let response = self
            .agent
            .get(&url)
            .query("auth", token.expose())
            .call()
            .map_err(|err| request_error(&url, err))?;
        let body = response.into_string()?;
        parse_session_key(&body)
    }

    fn fetch_snapshot(&self, snapshot_id: u16) -> Result<Bytes> {
        let url = self.snapshot_url(snapshot_id);
        debug!(%url, "[GET] snapshot");
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| request_error(&url, err))?;

        // One byte past the limit tells an oversized body from one that fits exactly.
        let limit = self.max_snapshot_bytes;
        let mut blob = Vec::new();
        response
            .into_reader()
            .take(limit.saturating_add(1))
            .read_to_end(&mut blob)?;
        if blob.len() as u64 > limit {
            return Err(TransportError::SnapshotTooLarge { url, limit });
        }
        debug!(%url, bytes = blob.len(), "snapshot received");
        Ok(Bytes::from(blob))
    }
}

/// Parse the hex integer returned by the session-key endpoint.
pub fn parse_session_key(body: &str) -> Result<u32> {
    let trimmed = body.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16).map_err(|source| TransportError::InvalidKey {
        body: trimmed.to_string(),
        source,
    })
}

/// Find a non-empty cookie value among `Set-Cookie` header values.
fn session_token_from_cookies(headers: &[&str], name: &str) -> Option<String> {
    headers.iter().find_map(|header| {
        let pair = header.split(';').next()?.trim();
        let (key, value) = pair.split_once('=')?;
        (key.trim().eq_ignore_ascii_case(name) && !value.trim().is_empty())
            .then(|| value.trim().to_string())
    })
}

pub(crate) fn request_error(url: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(status, _) => TransportError::Status {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => TransportError::Request {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}
