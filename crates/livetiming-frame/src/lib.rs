//! Framing and decryption of the live-timing byte stream.
//!
//! The feed has no transport-level length prefix. Every packet starts with a
//! 2-byte little-endian header word, and the payload length is implied by the
//! packet type through a versioned [`Catalog`]:
//! - [`codec`] extracts packets from an accumulating buffer
//! - [`cipher`] recovers plaintext for packet types the catalog marks ciphered
//! - [`frame`] turns a packet into the closed [`Frame`] variant
//!
//! Unknown type markers are skipped two bytes at a time; a bad packet never
//! stalls the stream.

pub mod catalog;
pub mod cipher;
pub mod codec;
pub mod error;
pub mod frame;
pub mod reader;

pub use catalog::{Catalog, CatalogEntry, LengthRule, PacketClass, Role, CATALOG_VERSION};
pub use cipher::{Cipher, SessionKey, CIPHER_SEED};
pub use codec::{
    decode_packet, encode_packet, header_for, scan, Decode, Header, Packet, Scan, Scanned, HEADER_SIZE,
    RESYNC_STRIDE,
};
pub use error::{FrameError, Result};
pub use frame::{DecodedFrame, Frame, PayloadState};
pub use reader::PacketReader;
