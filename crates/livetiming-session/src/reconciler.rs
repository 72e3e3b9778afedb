//! Interprets decoded frames and recognizes completed domain events.

use std::fmt;

use livetiming_frame::Frame;
use tracing::{debug, warn};

/// Buffer for a commentary message split across fragments.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommentaryAccumulator {
    text: String,
    open: bool,
}

impl CommentaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Returns the whole message when `is_last` closes it.
    pub fn push(&mut self, text: &str, is_last: bool) -> Option<String> {
        self.text.push_str(text);
        if is_last {
            self.open = false;
            return Some(std::mem::take(&mut self.text));
        }
        self.open = true;
        None
    }

    /// Whether fragments have arrived without a terminal fragment yet.
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.open = false;
    }
}

/// Session types announced by an event-id frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Race,
    Practice,
    Qualifying,
}

impl EventKind {
    /// Resolve an event type code from the stream.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(EventKind::Race),
            2 => Some(EventKind::Practice),
            3 => Some(EventKind::Qualifying),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Race => "race",
            EventKind::Practice => "practice",
            EventKind::Qualifying => "qualifying",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recognized event, used to route notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownEvent {
    pub kind: EventKind,
    pub number: String,
}

impl KnownEvent {
    /// Child path of the event-scoped notification channel, e.g. `race/6001`.
    pub fn channel_path(&self) -> String {
        if self.number.is_empty() {
            self.kind.name().to_string()
        } else {
            format!("{}/{}", self.kind, self.number)
        }
    }
}

/// Something the connection must act on after a frame was reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A commentary message is complete.
    CommentaryComplete { text: String, provisional: bool },
    /// A known event started; open its notification channel.
    EventStarted { event: KnownEvent, provisional: bool },
    /// A snapshot is available and should be bootstrapped.
    SnapshotRequested { snapshot_id: u16 },
}

/// Accumulated session state.
///
/// Live frames and replayed snapshot frames use separate commentary
/// accumulators, so a replay finishing mid-message never splices into the
/// live text.
#[derive(Debug, Default)]
pub struct Reconciler {
    live: CommentaryAccumulator,
    replay: CommentaryAccumulator,
    event: Option<KnownEvent>,
    bootstrapped: bool,
    bootstrap_pending: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a frame from the live stream.
    pub fn apply(&mut self, frame: &Frame) -> Option<Outcome> {
        let provisional = self.is_provisional();
        match frame {
            Frame::CommentaryFragment { text, is_last } => self
                .live
                .push(text, *is_last)
                .map(|text| Outcome::CommentaryComplete { text, provisional }),
            Frame::DomainEvent {
                event_code,
                event_number,
            } => self
                .observe_event(*event_code, event_number)
                .map(|event| Outcome::EventStarted { event, provisional }),
            Frame::SnapshotMarker { snapshot_id } => Some(Outcome::SnapshotRequested {
                snapshot_id: *snapshot_id,
            }),
            Frame::Opaque { .. } => None,
        }
    }

    /// Apply a frame replayed from a snapshot blob.
    ///
    /// Completed commentary is baseline history and is not reported; snapshot
    /// markers inside a blob never request another bootstrap.
    pub fn replay(&mut self, frame: &Frame) -> Option<Outcome> {
        match frame {
            Frame::CommentaryFragment { text, is_last } => {
                if let Some(text) = self.replay.push(text, *is_last) {
                    debug!(chars = text.len(), "replayed commentary");
                }
                None
            }
            Frame::DomainEvent {
                event_code,
                event_number,
            } => self
                .observe_event(*event_code, event_number)
                .map(|event| Outcome::EventStarted {
                    event,
                    provisional: true,
                }),
            Frame::SnapshotMarker { .. } | Frame::Opaque { .. } => None,
        }
    }

    fn observe_event(&mut self, code: u8, number: &str) -> Option<KnownEvent> {
        let Some(kind) = EventKind::from_code(code) else {
            warn!(code, number, "unknown domain event, ignoring");
            return None;
        };
        let event = KnownEvent {
            kind,
            number: number.to_string(),
        };
        if self.event.as_ref() == Some(&event) {
            debug!(path = %event.channel_path(), "event already active");
            return None;
        }
        self.event = Some(event.clone());
        Some(event)
    }

    /// A snapshot fetch was issued; live state is provisional until it lands.
    pub fn begin_bootstrap(&mut self) {
        self.bootstrap_pending = true;
    }

    /// Snapshot replay finished.
    pub fn finish_bootstrap(&mut self) {
        self.replay.clear();
        self.bootstrap_pending = false;
        self.bootstrapped = true;
    }

    /// Whether state may still be missing baseline data.
    pub fn is_provisional(&self) -> bool {
        self.bootstrap_pending || !self.bootstrapped
    }

    pub fn current_event(&self) -> Option<&KnownEvent> {
        self.event.as_ref()
    }

    pub fn live_commentary(&self) -> &CommentaryAccumulator {
        &self.live
    }
}
