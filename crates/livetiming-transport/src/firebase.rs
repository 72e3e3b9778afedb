use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::http::request_error;
use crate::traits::NotificationRef;

/// Reference to a location in a Firebase-style REST store.
///
/// Mirrors the JavaScript reference API: `child` builds a deeper location
/// locally, `push` appends under a server-generated key.
#[derive(Clone)]
pub struct FirebaseRef {
    url: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct PushReply {
    name: Option<String>,
}

impl FirebaseRef {
    /// Reference to the root location `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            agent: ureq::Agent::new(),
        }
    }

    /// Last path segment of this location.
    pub fn key(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }

    fn json_url(&self) -> String {
        format!("{}.json", self.url)
    }
}

impl NotificationRef for FirebaseRef {
    fn child(&self, path: &str) -> Self {
        Self {
            url: format!("{}/{}", self.url, path.trim_matches('/')),
            agent: self.agent.clone(),
        }
    }

    fn push(&self, value: &serde_json::Value) -> Result<String> {
        let url = self.json_url();
        debug!(%url, "[POST] push");
        let response = self
            .agent
            .post(&url)
            .send_json(value)
            .map_err(|err| request_error(&url, err))?;
        let reply: Option<PushReply> = serde_json::from_reader(response.into_reader())?;
        reply
            .and_then(|reply| reply.name)
            .ok_or(TransportError::MissingPushKey { url })
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

impl std::fmt::Debug for FirebaseRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseRef").field("url", &self.url).finish()
    }
}
