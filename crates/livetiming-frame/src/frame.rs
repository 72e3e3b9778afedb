use bytes::Bytes;
use serde::Serialize;
use tracing::trace;

use crate::catalog::Role;
use crate::cipher::Cipher;
use crate::codec::{Header, Packet};

/// Typed view of a packet, as consumed by the state reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A full-state snapshot is available under `snapshot_id`.
    SnapshotMarker { snapshot_id: u16 },
    /// Piece of a commentary message; `is_last` closes the message.
    CommentaryFragment { text: String, is_last: bool },
    /// Session-level event, e.g. the start of a race.
    DomainEvent { event_code: u8, event_number: String },
    /// Anything the state machine does not interpret.
    Opaque { raw_bytes: Bytes },
}

impl Frame {
    /// Short tag used in logs and persisted records.
    pub fn tag(&self) -> &'static str {
        match self {
            Frame::SnapshotMarker { .. } => "snapshot_marker",
            Frame::CommentaryFragment { .. } => "commentary_fragment",
            Frame::DomainEvent { .. } => "domain_event",
            Frame::Opaque { .. } => "opaque",
        }
    }
}

/// Whether a decoded payload could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadState {
    Plain,
    Decrypted,
    /// Ciphered type seen before a session key was available.
    Ciphertext,
}

/// A packet after decryption and interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub header: Header,
    /// Bytes consumed from the stream for this frame.
    pub wire_len: usize,
    pub payload_state: PayloadState,
    /// Plaintext when readable, otherwise the original ciphertext.
    pub payload: Bytes,
    pub frame: Frame,
}

impl DecodedFrame {
    /// Decrypt `packet` if its type is ciphered and interpret it by role.
    ///
    /// Without a cipher, ciphered payloads are kept as ciphertext and surface
    /// as [`Frame::Opaque`].
    pub fn from_packet(packet: Packet, cipher: Option<&mut Cipher>) -> Self {
        let wire_len = packet.wire_len();
        let (payload_state, payload) = match (packet.ciphered, cipher) {
            (false, _) => (PayloadState::Plain, packet.payload),
            (true, Some(cipher)) => (
                PayloadState::Decrypted,
                Bytes::from(cipher.decrypt(&packet.payload)),
            ),
            (true, None) => (PayloadState::Ciphertext, packet.payload),
        };

        let frame = if payload_state == PayloadState::Ciphertext {
            Frame::Opaque {
                raw_bytes: payload.clone(),
            }
        } else {
            interpret(packet.role, &payload)
        };
        trace!(tag = frame.tag(), wire_len, "decoded frame");

        Self {
            header: packet.header,
            wire_len,
            payload_state,
            payload,
            frame,
        }
    }
}

fn interpret(role: Role, payload: &Bytes) -> Frame {
    match role {
        Role::SnapshotMarker => match payload.get(..2) {
            Some(id) => Frame::SnapshotMarker {
                snapshot_id: u16::from_le_bytes([id[0], id[1]]),
            },
            None => opaque(payload),
        },
        // byte 0: event type code, rest: ASCII event number
        Role::DomainEvent => match payload.split_first() {
            Some((&event_code, number)) => Frame::DomainEvent {
                event_code,
                event_number: String::from_utf8_lossy(number).trim().to_string(),
            },
            None => opaque(payload),
        },
        // byte 0: encoding flags, byte 1 bit 0: last fragment, rest: text
        Role::Commentary => match payload.get(..2) {
            Some(flags) => Frame::CommentaryFragment {
                text: String::from_utf8_lossy(&payload[2..]).into_owned(),
                is_last: flags[1] & 0x01 != 0,
            },
            None => opaque(payload),
        },
        Role::Opaque => opaque(payload),
    }
}

fn opaque(payload: &Bytes) -> Frame {
    Frame::Opaque {
        raw_bytes: payload.clone(),
    }
}
