//! Transport layer for the live-timing client.
//!
//! Everything that leaves the process lives here:
//! - the persistent TCP connection carrying the framed live stream
//! - the HTTP collaborator used for login, session keys and snapshots
//! - the REST notification client used to publish finished commentary
//!
//! The upper layers only see the [`TimingService`] and [`NotificationRef`]
//! traits, so they can be driven by in-memory doubles in tests.

pub mod error;
pub mod firebase;
pub mod http;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use firebase::FirebaseRef;
pub use http::{HttpClient, LIVE_PORT, LIVE_TIMING_HOST, MAX_SNAPSHOT_BYTES};
pub use tcp::connect_live;
pub use traits::{AuthToken, NotificationRef, TimingService};
