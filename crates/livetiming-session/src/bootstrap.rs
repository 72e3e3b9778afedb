//! Snapshot bootstrap: fetch a full-state blob and replay it.

use std::sync::Arc;

use bytes::Bytes;
use livetiming_frame::{scan, Catalog, Cipher, DecodedFrame, Scanned};
use livetiming_transport::{NotificationRef, TimingService};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{Result, SessionError};
use crate::reconciler::{Outcome, Reconciler};
use crate::sink::FrameSource;

struct InFlight {
    snapshot_id: u16,
    fetch: JoinHandle<livetiming_transport::Result<Bytes>>,
}

/// Tracks the snapshot fetch of one connection.
///
/// At most one fetch is in flight. A marker for the snapshot already
/// bootstrapped or being fetched is ignored; a different id supersedes the
/// fetch in flight, whose result is then discarded.
#[derive(Default)]
pub struct Bootstrapper {
    in_flight: Option<InFlight>,
    completed: Option<u16>,
    fetches: u64,
}

impl Bootstrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start fetching `snapshot_id` on a blocking worker.
    ///
    /// Returns `false` when the marker is a duplicate and nothing was started.
    pub fn request<S: TimingService>(&mut self, service: &Arc<S>, snapshot_id: u16) -> bool {
        if self.completed == Some(snapshot_id) || self.in_flight() == Some(snapshot_id) {
            debug!(snapshot_id, "snapshot already bootstrapped or in flight");
            return false;
        }
        if let Some(superseded) = self.in_flight.take() {
            info!(
                superseded = superseded.snapshot_id,
                snapshot_id, "newer snapshot supersedes fetch in flight"
            );
            superseded.fetch.abort();
        }

        let service = Arc::clone(service);
        let fetch = tokio::task::spawn_blocking(move || service.fetch_snapshot(snapshot_id));
        self.in_flight = Some(InFlight { snapshot_id, fetch });
        self.fetches += 1;
        info!(snapshot_id, "snapshot fetch started");
        true
    }

    /// Id of the snapshot being fetched.
    pub fn in_flight(&self) -> Option<u16> {
        self.in_flight.as_ref().map(|in_flight| in_flight.snapshot_id)
    }

    /// Wait for the fetch in flight.
    ///
    /// Cancel-safe: dropping the future leaves the fetch in flight. Resolves
    /// to `None` immediately when nothing is being fetched.
    pub async fn wait(&mut self) -> Option<(u16, Result<Bytes>)> {
        let in_flight = self.in_flight.as_mut()?;
        let joined = (&mut in_flight.fetch).await;
        let snapshot_id = in_flight.snapshot_id;
        self.in_flight = None;

        let result = match joined {
            Ok(fetched) => fetched.map_err(SessionError::Transport),
            Err(err) => Err(SessionError::Worker(err.to_string())),
        };
        Some((snapshot_id, result))
    }

    /// Record a successful replay of `snapshot_id`.
    pub fn complete(&mut self, snapshot_id: u16) {
        self.completed = Some(snapshot_id);
    }

    /// Id of the last snapshot replayed.
    pub fn completed(&self) -> Option<u16> {
        self.completed
    }

    /// Fetches started over the connection lifetime.
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    /// Discard the fetch in flight; its result will never be applied.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!(snapshot_id = in_flight.snapshot_id, "discarding snapshot fetch");
            in_flight.fetch.abort();
        }
    }
}

/// Counters from replaying one blob.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub frames: usize,
    pub skipped_bytes: usize,
    /// Bytes left over when the blob ended inside a packet.
    pub trailing_bytes: usize,
}

/// Replay every frame of a snapshot blob through `reconciler` and `dispatcher`.
///
/// Ciphered frames are decrypted with the session's live `cipher`; its
/// register carries on from the last live byte and the live stream continues
/// from wherever replay leaves it. Unrecognized markers are skipped the same
/// way as on the live stream. Returns the outcomes the connection must act on
/// (event channels established by the blob).
pub fn replay_blob<N: NotificationRef>(
    snapshot_id: u16,
    blob: &[u8],
    catalog: &Catalog,
    mut cipher: Option<&mut Cipher>,
    reconciler: &mut Reconciler,
    dispatcher: &mut Dispatcher<N>,
) -> (ReplayStats, Vec<Outcome>) {
    let mut stats = ReplayStats::default();
    let mut outcomes = Vec::new();
    let source = FrameSource::Snapshot {
        replayed_from: snapshot_id,
    };

    for step in scan(blob, catalog) {
        match step {
            Scanned::Packet(packet) => {
                let decoded = DecodedFrame::from_packet(packet, cipher.as_deref_mut());
                dispatcher.persist_frame(&decoded, source);
                outcomes.extend(reconciler.replay(&decoded.frame));
                stats.frames += 1;
            }
            Scanned::Skipped { offset, header } => {
                debug!(snapshot_id, offset, ?header, "unrecognized packet type in snapshot, skipping");
                stats.skipped_bytes += livetiming_frame::RESYNC_STRIDE;
            }
            Scanned::Truncated { offset, remaining } => {
                warn!(snapshot_id, offset, remaining, "snapshot ends inside a packet");
                stats.trailing_bytes = remaining;
            }
        }
    }

    info!(
        snapshot_id,
        frames = stats.frames,
        skipped = stats.skipped_bytes,
        "snapshot replayed"
    );
    (stats, outcomes)
}
