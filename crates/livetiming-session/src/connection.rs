//! The live connection driver.
//!
//! One task owns the stream, the connection buffer, the session cipher and
//! the reconciler. Bytes are appended to the buffer as they arrive and every
//! complete packet is decoded, decrypted, persisted and reconciled in arrival
//! order. The snapshot fetch is the only work that runs elsewhere; its blob
//! is replayed back on this task.

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use livetiming_frame::{decode_packet, Catalog, Decode, DecodedFrame, Frame, SessionKey, RESYNC_STRIDE};
use livetiming_transport::{NotificationRef, TimingService};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bootstrap::{replay_blob, Bootstrapper};
use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Result, SessionError};
use crate::liveness::{LivenessMonitor, POLL_PROBE};
use crate::reconciler::{Outcome, Reconciler};
use crate::session::Session;
use crate::sink::{hex, FrameSource};

/// Counters reported when a connection ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub bytes_read: u64,
    pub frames: u64,
    pub skipped_bytes: u64,
    pub probes: u64,
    pub snapshots: u64,
    pub snapshot_fetches: u64,
    pub commentary_published: u64,
    pub commentary_dropped: u64,
}

pub struct Connection<S: TimingService, N: NotificationRef> {
    config: ClientConfig,
    catalog: Arc<Catalog>,
    service: Arc<S>,
    session: Session,
    reconciler: Reconciler,
    bootstrap: Bootstrapper,
    liveness: LivenessMonitor,
    dispatcher: Dispatcher<N>,
    buf: BytesMut,
    stats: ConnectionStats,
}

impl<S: TimingService, N: NotificationRef> Connection<S, N> {
    pub fn new(
        config: ClientConfig,
        catalog: Arc<Catalog>,
        service: Arc<S>,
        session: Session,
        dispatcher: Dispatcher<N>,
    ) -> Self {
        Self {
            liveness: LivenessMonitor::new(config.poll_window),
            buf: BytesMut::with_capacity(config.read_capacity),
            config,
            catalog,
            service,
            session,
            reconciler: Reconciler::new(),
            bootstrap: Bootstrapper::new(),
            dispatcher,
            stats: ConnectionStats::default(),
        }
    }

    /// Drive the connection until `cancel` fires or the server closes it.
    ///
    /// Teardown discards any snapshot fetch in flight and stops the poll
    /// timer; nothing decoded after teardown is applied. A server-side close
    /// is reported as [`SessionError::Disconnected`].
    pub async fn run<T>(mut self, mut stream: T, cancel: CancellationToken) -> Result<ConnectionStats>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        if let Some(event) = self.config.event.clone() {
            match self.load_key(&event, &cancel).await {
                Ok(true) => {}
                Ok(false) => return self.finish(Ok(())).await,
                Err(err) => return self.finish(Err(err)).await,
            }
        }

        let outcome = loop {
            let deadline = self.liveness.deadline();
            let fetching = self.bootstrap.in_flight().is_some();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("connection cancelled");
                    break Ok(());
                }

                Some((snapshot_id, result)) = self.bootstrap.wait(), if fetching => {
                    self.on_snapshot(snapshot_id, result);
                }

                read = stream.read_buf(&mut self.buf) => {
                    let read = match read {
                        Ok(read) => read,
                        Err(err) => break Err(SessionError::Io(err)),
                    };
                    if read == 0 {
                        break Err(SessionError::Disconnected(format!(
                            "server closed the connection ({} bytes unconsumed)",
                            self.buf.len()
                        )));
                    }
                    self.stats.bytes_read += read as u64;
                    self.liveness.touch(Instant::now());
                    debug!(read, "{}", hex(&self.buf[self.buf.len() - read..]));
                    if let Err(err) = self.drain_buffer(&cancel).await {
                        break Err(err);
                    }
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.liveness.poll_elapsed(Instant::now()) {
                        debug!("connection idle, sending poll probe");
                        if let Err(err) = send_probe(&mut stream).await {
                            break Err(err);
                        }
                        self.stats.probes += 1;
                    }
                }
            }
        };

        self.finish(outcome).await
    }

    /// Decode every complete packet currently buffered.
    async fn drain_buffer(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match decode_packet(&self.buf, &self.catalog) {
                Decode::NeedMoreData => return Ok(()),
                Decode::UnrecognizedType { header } => {
                    debug!(?header, "unrecognized packet type, skipping");
                    self.buf.advance(RESYNC_STRIDE);
                    self.stats.skipped_bytes += RESYNC_STRIDE as u64;
                }
                Decode::Packet(packet) => {
                    self.buf.advance(packet.wire_len());
                    let decoded = DecodedFrame::from_packet(packet, self.session.cipher_mut());
                    self.stats.frames += 1;
                    self.dispatcher.persist_frame(&decoded, FrameSource::Live);
                    self.on_live_frame(decoded.frame, cancel).await?;
                }
            }
        }
    }

    async fn on_live_frame(&mut self, frame: Frame, cancel: &CancellationToken) -> Result<()> {
        if let Frame::DomainEvent { event_number, .. } = &frame {
            if !self.session.has_key() && !event_number.is_empty() {
                let event_number = event_number.clone();
                if !self.load_key(&event_number, cancel).await? {
                    return Ok(());
                }
            }
        }

        if let Some(outcome) = self.reconciler.apply(&frame) {
            self.on_outcome(outcome);
        }
        Ok(())
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::SnapshotRequested { snapshot_id } => {
                if self.bootstrap.request(&self.service, snapshot_id) {
                    self.stats.snapshot_fetches += 1;
                    self.reconciler.begin_bootstrap();
                }
            }
            Outcome::EventStarted { event, provisional } => {
                info!(path = %event.channel_path(), provisional, "event started");
                self.dispatcher.open_channel(&event);
            }
            Outcome::CommentaryComplete { text, provisional } => {
                info!(provisional, "commentary: {text}");
                self.dispatcher.commentary(&text, provisional);
            }
        }
    }

    fn on_snapshot(&mut self, snapshot_id: u16, result: Result<Bytes>) {
        let blob = match result {
            Ok(blob) => blob,
            Err(err) => {
                warn!(snapshot_id, error = %err, "snapshot fetch failed");
                return;
            }
        };

        self.dispatcher.persist_snapshot(snapshot_id, &blob);
        let (_, outcomes) = replay_blob(
            snapshot_id,
            &blob,
            &self.catalog,
            self.session.cipher_mut(),
            &mut self.reconciler,
            &mut self.dispatcher,
        );
        for outcome in outcomes {
            self.on_outcome(outcome);
        }

        self.reconciler.finish_bootstrap();
        self.bootstrap.complete(snapshot_id);
        self.stats.snapshots += 1;

        if !self.liveness.is_armed() {
            self.liveness.arm(Instant::now());
            info!(window = ?self.liveness.window(), "liveness monitor armed");
        }
    }

    /// Fetch and install the session key for `event`.
    ///
    /// Returns `false` when cancelled before the key arrived.
    async fn load_key(&mut self, event: &str, cancel: &CancellationToken) -> Result<bool> {
        let service = Arc::clone(&self.service);
        let token = self.session.token().clone();
        let owned_event = event.to_string();
        let fetch = tokio::task::spawn_blocking(move || service.fetch_session_key(&owned_event, &token));

        let joined = tokio::select! {
            _ = cancel.cancelled() => return Ok(false),
            joined = fetch => joined,
        };
        let key = joined
            .map_err(|err| SessionError::Worker(err.to_string()))?
            .map_err(SessionError::Transport)?;
        self.session.install_key(event, SessionKey::new(key));
        Ok(true)
    }

    async fn finish(mut self, outcome: Result<()>) -> Result<ConnectionStats> {
        self.bootstrap.cancel();
        self.liveness.disarm();

        self.stats.commentary_published = self.dispatcher.published();
        self.stats.commentary_dropped = self.dispatcher.dropped();
        let stats = self.stats;
        info!(?stats, "connection closed");

        self.dispatcher.shutdown().await;

        outcome.map(|()| stats)
    }
}

async fn send_probe<T: AsyncWrite + Unpin>(stream: &mut T) -> Result<()> {
    stream.write_all(&[POLL_PROBE]).await?;
    stream.flush().await?;
    Ok(())
}
