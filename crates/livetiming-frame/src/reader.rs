use std::io::{ErrorKind, Read};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::catalog::Catalog;
use crate::codec::{decode_packet, Decode, Packet, RESYNC_STRIDE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete packets from any `Read` source, typically a capture file.
///
/// Handles partial reads and unrecognized markers internally; callers only
/// ever see complete packets. Skipped bytes are counted so a catalog can be
/// checked against a reference capture.
pub struct PacketReader<T> {
    inner: T,
    buf: BytesMut,
    catalog: Arc<Catalog>,
    skipped_bytes: usize,
    packets: usize,
}

impl<T: Read> PacketReader<T> {
    /// Create a reader using the built-in catalog.
    pub fn new(inner: T) -> Self {
        Self::with_catalog(inner, Arc::new(Catalog::v1()))
    }

    /// Create a reader with an explicit catalog.
    pub fn with_catalog(inner: T, catalog: Arc<Catalog>) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            catalog,
            skipped_bytes: 0,
            packets: 0,
        }
    }

    /// Read the next complete packet (blocking).
    ///
    /// Returns `Ok(None)` at a clean end of input and
    /// `Err(FrameError::Truncated)` when input ends inside a packet.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match decode_packet(&self.buf, &self.catalog) {
                Decode::Packet(packet) => {
                    self.buf.advance(packet.wire_len());
                    self.packets += 1;
                    return Ok(Some(packet));
                }
                Decode::UnrecognizedType { header } => {
                    debug!(?header, "unrecognized packet type, skipping");
                    self.buf.advance(RESYNC_STRIDE);
                    self.skipped_bytes += RESYNC_STRIDE;
                    continue;
                }
                Decode::NeedMoreData => {}
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return match self.buf.len() {
                    0 => Ok(None),
                    pending => Err(FrameError::Truncated { pending }),
                };
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes dropped by resynchronisation so far.
    pub fn skipped_bytes(&self) -> usize {
        self.skipped_bytes
    }

    /// Packets returned so far.
    pub fn packets(&self) -> usize {
        self.packets
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::catalog::LengthRule;
    use crate::codec::{encode_packet, header_for, Header};

    fn copyright(text: &str, wire: &mut BytesMut) {
        let header = header_for(0, 12, LengthRule::Data, text.len(), 0).unwrap();
        encode_packet(header, text.as_bytes(), wire);
    }

    #[test]
    fn reads_consecutive_packets_then_clean_eof() {
        let mut wire = BytesMut::new();
        copyright("one", &mut wire);
        copyright("three", &mut wire);

        let mut reader = PacketReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.read_packet().unwrap().unwrap().payload.as_ref(), b"one");
        assert_eq!(reader.read_packet().unwrap().unwrap().payload.as_ref(), b"three");
        assert!(reader.read_packet().unwrap().is_none());
        assert_eq!(reader.packets(), 2);
        assert_eq!(reader.skipped_bytes(), 0);
    }

    #[test]
    fn byte_by_byte_source_yields_whole_packet() {
        let mut wire = BytesMut::new();
        copyright("slow", &mut wire);

        let mut reader = PacketReader::new(ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        });
        let packet = reader.read_packet().unwrap().unwrap();
        assert_eq!(packet.payload.as_ref(), b"slow");
    }

    #[test]
    fn unknown_marker_is_skipped_and_counted() {
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&Header::new(0, 13, 0).unwrap().to_bits().to_le_bytes());
        copyright("ok", &mut wire);

        let mut reader = PacketReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.read_packet().unwrap().unwrap().payload.as_ref(), b"ok");
        assert_eq!(reader.skipped_bytes(), 2);
    }

    #[test]
    fn eof_inside_packet_is_truncated() {
        let mut wire = BytesMut::new();
        copyright("cut short", &mut wire);
        wire.truncate(5);

        let mut reader = PacketReader::new(Cursor::new(wire.to_vec()));
        assert!(matches!(
            reader.read_packet(),
            Err(FrameError::Truncated { pending: 5 })
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        copyright("ok", &mut wire);

        let mut reader = PacketReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire.to_vec()),
        });
        assert_eq!(reader.read_packet().unwrap().unwrap().payload.as_ref(), b"ok");
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
