//! Routes reconciled events to persistence and notification collaborators.

use bytes::Bytes;
use livetiming_frame::DecodedFrame;
use livetiming_transport::NotificationRef;
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::reconciler::KnownEvent;
use crate::sink::{FrameRecord, FrameSink, FrameSource};

struct PushJob<N> {
    channel: N,
    value: serde_json::Value,
}

/// Side effects of the session: persistence and commentary notifications.
///
/// Pushes run on one blocking worker draining an unbounded queue, so a slow
/// notification service never stalls decoding and messages arrive in
/// completion order.
pub struct Dispatcher<N: NotificationRef> {
    sink: Box<dyn FrameSink>,
    root: Option<N>,
    active: Option<N>,
    jobs: Option<mpsc::UnboundedSender<PushJob<N>>>,
    worker: Option<JoinHandle<()>>,
    published: u64,
    dropped: u64,
}

impl<N: NotificationRef> Dispatcher<N> {
    /// Dispatcher persisting to `sink` and, when `root` is set, publishing
    /// commentary beneath it.
    ///
    /// Publishing needs a tokio runtime; without one this fails with
    /// [`SessionError::Worker`].
    pub fn new(sink: Box<dyn FrameSink>, root: Option<N>) -> Result<Self> {
        let (jobs, worker) = match root {
            Some(_) => {
                let runtime = Handle::try_current().map_err(|err| SessionError::Worker(err.to_string()))?;
                let (tx, rx) = mpsc::unbounded_channel::<PushJob<N>>();
                let worker = runtime.spawn_blocking(move || push_worker(rx));
                (Some(tx), Some(worker))
            }
            None => (None, None),
        };
        Ok(Self {
            sink,
            root,
            active: None,
            jobs,
            worker,
            published: 0,
            dropped: 0,
        })
    }

    /// Forward an extracted frame to persistence.
    pub fn persist_frame(&mut self, decoded: &DecodedFrame, source: FrameSource) {
        self.sink.save_frame(&FrameRecord::new(decoded, source));
    }

    pub fn persist_snapshot(&mut self, snapshot_id: u16, blob: &Bytes) {
        self.sink.save_snapshot(snapshot_id, blob);
    }

    /// Route subsequent commentary to the channel scoped to `event`.
    pub fn open_channel(&mut self, event: &KnownEvent) {
        let Some(root) = &self.root else {
            debug!(path = %event.channel_path(), "notifications disabled");
            return;
        };
        let channel = root.child(&event.channel_path());
        info!(location = %channel.location(), "notification channel opened");
        self.active = Some(channel);
    }

    /// Publish a completed commentary message, or drop it when no channel is open.
    pub fn commentary(&mut self, text: &str, provisional: bool) {
        let (Some(channel), Some(jobs)) = (&self.active, &self.jobs) else {
            debug!(chars = text.len(), "no notification channel yet, dropping commentary");
            self.dropped += 1;
            return;
        };
        let job = PushJob {
            channel: channel.clone(),
            value: json!({ "text": text, "provisional": provisional }),
        };
        if jobs.send(job).is_err() {
            warn!("notification worker stopped, dropping commentary");
            self.dropped += 1;
            return;
        }
        self.published += 1;
    }

    pub fn has_channel(&self) -> bool {
        self.active.is_some()
    }

    /// Messages handed to the notification worker.
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Messages completed while no channel was open.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Stop accepting pushes and wait for queued ones to finish.
    pub async fn shutdown(mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                warn!(error = %err, "notification worker failed");
            }
        }
    }
}

fn push_worker<N: NotificationRef>(mut jobs: mpsc::UnboundedReceiver<PushJob<N>>) {
    while let Some(job) = jobs.blocking_recv() {
        match job.channel.push(&job.value) {
            Ok(key) => debug!(location = %job.channel.location(), %key, "commentary published"),
            Err(err) => warn!(location = %job.channel.location(), error = %err, "commentary push failed"),
        }
    }
}
