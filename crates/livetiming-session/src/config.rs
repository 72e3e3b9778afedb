use std::time::Duration;

use livetiming_transport::{LIVE_PORT, LIVE_TIMING_HOST};

use crate::liveness::DEFAULT_POLL_WINDOW;

const DEFAULT_READ_CAPACITY: usize = 4 * 1024;

/// Configuration for one live-timing connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host serving the live stream and the HTTP endpoints.
    pub host: String,
    /// Port of the live stream.
    pub port: u16,
    /// Idle time after which a poll probe is sent.
    pub poll_window: Duration,
    /// Event number to fetch the session key for up front.
    ///
    /// When unset the key is fetched for the first event announced on the stream.
    pub event: Option<String>,
    /// Initial capacity of the connection buffer.
    pub read_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: LIVE_TIMING_HOST.to_string(),
            port: LIVE_PORT,
            poll_window: DEFAULT_POLL_WINDOW,
            event: None,
            read_capacity: DEFAULT_READ_CAPACITY,
        }
    }
}
