//! Persistence seam for decoded frames and raw snapshot blobs.

use std::fmt::Write as _;

use bytes::Bytes;
use livetiming_frame::{DecodedFrame, Frame, PayloadState};
use serde::Serialize;

/// Where a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FrameSource {
    Live,
    /// Replayed from the snapshot blob with this id.
    Snapshot { replayed_from: u16 },
}

/// Interpreted part of a persisted frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum FrameDetail {
    SnapshotMarker { snapshot_id: u16 },
    CommentaryFragment { text: String, is_last: bool },
    DomainEvent { event_code: u8, event_number: String },
    Opaque,
}

impl From<&Frame> for FrameDetail {
    fn from(frame: &Frame) -> Self {
        match frame {
            Frame::SnapshotMarker { snapshot_id } => FrameDetail::SnapshotMarker {
                snapshot_id: *snapshot_id,
            },
            Frame::CommentaryFragment { text, is_last } => FrameDetail::CommentaryFragment {
                text: text.clone(),
                is_last: *is_last,
            },
            Frame::DomainEvent {
                event_code,
                event_number,
            } => FrameDetail::DomainEvent {
                event_code: *event_code,
                event_number: event_number.clone(),
            },
            Frame::Opaque { .. } => FrameDetail::Opaque,
        }
    }
}

/// One persisted frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRecord {
    #[serde(flatten)]
    pub source: FrameSource,
    pub car: u8,
    pub kind: u8,
    pub data: u8,
    pub wire_len: usize,
    pub payload_state: PayloadState,
    /// Hex of the plaintext, or of the ciphertext when no key was available.
    pub payload: String,
    #[serde(flatten)]
    pub detail: FrameDetail,
}

impl FrameRecord {
    pub fn new(decoded: &DecodedFrame, source: FrameSource) -> Self {
        Self {
            source,
            car: decoded.header.car,
            kind: decoded.header.kind,
            data: decoded.header.data,
            wire_len: decoded.wire_len,
            payload_state: decoded.payload_state,
            payload: hex(&decoded.payload),
            detail: FrameDetail::from(&decoded.frame),
        }
    }
}

/// Receives every extracted frame and every raw snapshot blob.
///
/// Fire-and-forget: implementations log their own failures and never stop
/// the stream.
pub trait FrameSink: Send {
    fn save_frame(&mut self, record: &FrameRecord);

    fn save_snapshot(&mut self, snapshot_id: u16, blob: &Bytes);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn save_frame(&mut self, _record: &FrameRecord) {}

    fn save_snapshot(&mut self, _snapshot_id: u16, _blob: &Bytes) {}
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
