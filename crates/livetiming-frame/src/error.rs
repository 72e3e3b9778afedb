use crate::catalog::PacketClass;

/// Errors that can occur while building, loading or reading frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A header field does not fit its bit width.
    #[error("header field {field} out of range ({value}, max {max})")]
    HeaderField {
        field: &'static str,
        value: u16,
        max: u16,
    },

    /// A catalog defines the same packet type twice.
    #[error("catalog defines {class:?} kind {kind} twice")]
    DuplicateEntry { class: PacketClass, kind: u8 },

    /// A catalog entry names a kind outside the 4-bit type field.
    #[error("catalog entry {class:?} kind {kind} out of range (max 15)")]
    KindOutOfRange { class: PacketClass, kind: u8 },

    /// The catalog document is not valid JSON.
    #[error("catalog json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while reading a capture or catalog.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input ended in the middle of a packet.
    #[error("stream ended inside a packet ({pending} bytes pending)")]
    Truncated { pending: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
