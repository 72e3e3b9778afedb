//! Session layer of the live-timing client.
//!
//! Owns everything that turns decoded frames into behavior: the per-session
//! cipher, the state reconciler, snapshot bootstrap, the idle poll and the
//! routing of finished commentary. [`Connection`] ties them together on a
//! single task that owns the live stream.

pub mod bootstrap;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod liveness;
pub mod reconciler;
pub mod session;
pub mod sink;

pub use bootstrap::{replay_blob, Bootstrapper, ReplayStats};
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionStats};
pub use dispatch::Dispatcher;
pub use error::{Result, SessionError};
pub use liveness::{LivenessMonitor, DEFAULT_POLL_WINDOW, POLL_PROBE};
pub use reconciler::{CommentaryAccumulator, EventKind, KnownEvent, Outcome, Reconciler};
pub use session::Session;
pub use sink::{FrameDetail, FrameRecord, FrameSink, FrameSource, NullSink};
