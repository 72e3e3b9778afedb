//! Streaming client for a live-timing telemetry feed.
//!
//! The client keeps one persistent connection to the timing service, decodes
//! its framed and partly encrypted byte stream, rebuilds state from snapshots
//! plus live deltas and publishes finished commentary downstream.
//!
//! # Crate Structure
//!
//! - [`transport`]: live TCP connection, HTTP collaborators, notification client
//! - [`frame`]: frame catalog, decoder and stream cipher
//! - [`session`]: session state, bootstrap, liveness poll and dispatch
//! - [`credentials`]: the `.f1rc` credential file
//! - [`record`]: newline-delimited JSON persistence

pub mod credentials;
pub mod record;

/// Re-export transport types.
pub mod transport {
    pub use livetiming_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use livetiming_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use livetiming_session::*;
}
