use bytes::{BufMut, Bytes, BytesMut};

use crate::catalog::{Catalog, LengthRule, PacketClass, Role};
use crate::error::{FrameError, Result};

/// Packet header: one little-endian `u16`.
pub const HEADER_SIZE: usize = 2;

/// Bytes skipped past an unrecognized type marker before retrying.
pub const RESYNC_STRIDE: usize = 2;

const CAR_BITS: u16 = 0x1f;
const KIND_BITS: u16 = 0x0f;
const DATA_BITS: u16 = 0x7f;

/// Decoded header word.
///
/// ```text
///  15            9 8       5 4         0
/// ┌───────────────┬─────────┬───────────┐
/// │ data (7 bits) │ kind(4) │ car (5)   │
/// └───────────────┴─────────┴───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub car: u8,
    pub kind: u8,
    pub data: u8,
}

impl Header {
    /// Build a header, checking every field fits its bit width.
    pub fn new(car: u8, kind: u8, data: u8) -> Result<Self> {
        check_field("car", car, CAR_BITS)?;
        check_field("kind", kind, KIND_BITS)?;
        check_field("data", data, DATA_BITS)?;
        Ok(Self { car, kind, data })
    }

    pub fn from_bits(bits: u16) -> Self {
        Self {
            car: (bits & CAR_BITS) as u8,
            kind: ((bits >> 5) & KIND_BITS) as u8,
            data: (bits >> 9) as u8,
        }
    }

    pub fn to_bits(self) -> u16 {
        (self.car as u16 & CAR_BITS)
            | ((self.kind as u16 & KIND_BITS) << 5)
            | ((self.data as u16 & DATA_BITS) << 9)
    }

    pub fn class(self) -> PacketClass {
        if self.car == 0 {
            PacketClass::System
        } else {
            PacketClass::Car
        }
    }
}

fn check_field(field: &'static str, value: u8, max: u16) -> Result<()> {
    if value as u16 > max {
        return Err(FrameError::HeaderField {
            field,
            value: value as u16,
            max,
        });
    }
    Ok(())
}

/// A complete packet extracted from the stream. The payload is still
/// ciphertext when `ciphered` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    /// Data-field bits left over after the length rule took its share.
    pub residual: u8,
    pub ciphered: bool,
    pub role: Role,
    pub payload: Bytes,
}

impl Packet {
    /// Bytes this packet occupied on the wire (header + payload).
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decode {
    /// A complete packet; drop `packet.wire_len()` bytes from the buffer head.
    Packet(Packet),
    /// The head of the buffer is not a complete packet yet.
    NeedMoreData,
    /// The leading type marker is not in the catalog; skip [`RESYNC_STRIDE`] bytes.
    UnrecognizedType { header: Header },
}

/// Try to extract the packet at the head of `src`.
///
/// Pure: `src` is never modified and repeated calls on the same bytes give
/// the same answer. The caller owns consumption.
pub fn decode_packet(src: &[u8], catalog: &Catalog) -> Decode {
    let Some(head) = src.get(..HEADER_SIZE) else {
        return Decode::NeedMoreData;
    };
    let header = Header::from_bits(u16::from_le_bytes([head[0], head[1]]));

    let Some(entry) = catalog.lookup(header.class(), header.kind) else {
        return Decode::UnrecognizedType { header };
    };

    let (payload_len, residual) = entry.length.resolve(header.data);
    let total = HEADER_SIZE + payload_len;
    let Some(payload) = src.get(HEADER_SIZE..total) else {
        return Decode::NeedMoreData;
    };

    Decode::Packet(Packet {
        header,
        residual,
        ciphered: entry.ciphered,
        role: entry.role,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Encode a header and payload into the wire format.
///
/// The payload is written as given; it must already be ciphertext for
/// ciphered types and must match the length the catalog derives from `header`.
pub fn encode_packet(header: Header, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u16_le(header.to_bits());
    dst.put_slice(payload);
}

/// Header for a packet whose payload length is carried by `rule`.
///
/// `value` is the residual data for [`LengthRule::Empty`], [`LengthRule::Fixed`]
/// and [`LengthRule::Packed`] (low three bits); it is ignored for
/// [`LengthRule::Data`].
pub fn header_for(car: u8, kind: u8, rule: LengthRule, payload_len: usize, value: u8) -> Result<Header> {
    let data = match rule {
        LengthRule::Empty | LengthRule::Fixed(_) => value as usize,
        LengthRule::Data => payload_len,
        LengthRule::Packed => (payload_len << 3) | (value as usize & 0x07),
    };
    let data = u8::try_from(data).map_err(|_| FrameError::HeaderField {
        field: "data",
        value: data.min(u16::MAX as usize) as u16,
        max: DATA_BITS,
    })?;
    Header::new(car, kind, data)
}

/// One step of a [`Scan`] over a complete blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scanned {
    Packet(Packet),
    /// An unrecognized marker at `offset`; the scan moved on by [`RESYNC_STRIDE`].
    Skipped { offset: usize, header: Header },
    /// The blob ended inside a packet; the scan is over.
    Truncated { offset: usize, remaining: usize },
}

/// Iterator over every packet in a complete blob, with the same
/// skip-and-continue recovery as live decoding.
pub struct Scan<'a> {
    src: &'a [u8],
    offset: usize,
    catalog: &'a Catalog,
}

/// Scan a complete blob (snapshot or capture) packet by packet.
pub fn scan<'a>(src: &'a [u8], catalog: &'a Catalog) -> Scan<'a> {
    Scan {
        src,
        offset: 0,
        catalog,
    }
}

impl Iterator for Scan<'_> {
    type Item = Scanned;

    fn next(&mut self) -> Option<Scanned> {
        let rest = self.src.get(self.offset..).filter(|rest| !rest.is_empty())?;
        let offset = self.offset;
        match decode_packet(rest, self.catalog) {
            Decode::Packet(packet) => {
                self.offset += packet.wire_len();
                Some(Scanned::Packet(packet))
            }
            Decode::UnrecognizedType { header } => {
                self.offset += RESYNC_STRIDE;
                Some(Scanned::Skipped { offset, header })
            }
            Decode::NeedMoreData => {
                self.offset = self.src.len();
                Some(Scanned::Truncated {
                    offset,
                    remaining: rest.len(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::v1()
    }

    fn key_frame(id: u16) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_packet(Header::new(0, 2, 0).unwrap(), &id.to_le_bytes(), &mut buf);
        buf
    }

    fn copyright(text: &str) -> BytesMut {
        let mut buf = BytesMut::new();
        let header = header_for(0, 12, LengthRule::Data, text.len(), 0).unwrap();
        encode_packet(header, text.as_bytes(), &mut buf);
        buf
    }

    fn expect_packet(decode: Decode) -> Packet {
        match decode {
            Decode::Packet(packet) => packet,
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[test]
    fn header_bits_round_trip() {
        let header = Header::new(17, 9, 0x5a).unwrap();
        assert_eq!(Header::from_bits(header.to_bits()), header);
        assert_eq!(header.class(), PacketClass::Car);
        assert_eq!(Header::new(0, 4, 3).unwrap().class(), PacketClass::System);
    }

    #[test]
    fn header_rejects_oversized_fields() {
        assert!(matches!(
            Header::new(32, 0, 0),
            Err(FrameError::HeaderField { field: "car", .. })
        ));
        assert!(matches!(
            Header::new(0, 16, 0),
            Err(FrameError::HeaderField { field: "kind", .. })
        ));
        assert!(matches!(
            header_for(0, 12, LengthRule::Data, 200, 0),
            Err(FrameError::HeaderField { field: "data", .. })
        ));
    }

    #[test]
    fn back_to_back_packets_decode_with_exact_lengths() {
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&key_frame(7));
        wire.extend_from_slice(&copyright("(c) FOM"));
        let mut refresh = BytesMut::new();
        encode_packet(Header::new(0, 5, 3).unwrap(), &[], &mut refresh);
        wire.extend_from_slice(&refresh);

        let catalog = catalog();
        let mut lengths = Vec::new();
        let mut offset = 0;
        while offset < wire.len() {
            let packet = expect_packet(decode_packet(&wire[offset..], &catalog));
            lengths.push(packet.wire_len());
            offset += packet.wire_len();
        }

        assert_eq!(lengths, vec![4, 2 + 7, 2]);
        assert_eq!(offset, wire.len());
    }

    #[test]
    fn decode_is_pure_and_idempotent() {
        let wire = copyright("hello");
        let catalog = catalog();
        let first = decode_packet(&wire, &catalog);
        let second = decode_packet(&wire, &catalog);
        assert_eq!(first, second);
        assert_eq!(wire, copyright("hello"));
    }

    #[test]
    fn incomplete_header_and_payload_need_more_data() {
        let catalog = catalog();
        assert_eq!(decode_packet(&[], &catalog), Decode::NeedMoreData);
        assert_eq!(decode_packet(&[0x41], &catalog), Decode::NeedMoreData);

        let wire = copyright("partial");
        assert_eq!(decode_packet(&wire[..5], &catalog), Decode::NeedMoreData);
    }

    #[test]
    fn unrecognized_marker_reports_header() {
        // System kind 8 is not in the v1 catalog.
        let header = Header::new(0, 8, 1).unwrap();
        let wire = header.to_bits().to_le_bytes();
        assert_eq!(
            decode_packet(&wire, &catalog()),
            Decode::UnrecognizedType { header }
        );
    }

    #[test]
    fn packed_rule_keeps_residual_bits() {
        let mut wire = BytesMut::new();
        let header = header_for(3, 2, LengthRule::Packed, 3, 5).unwrap();
        encode_packet(header, &[1, 2, 3], &mut wire);

        let packet = expect_packet(decode_packet(&wire, &catalog()));
        assert_eq!(packet.residual, 5);
        assert_eq!(packet.payload.as_ref(), &[1, 2, 3]);
        assert!(packet.ciphered);
        assert_eq!(packet.role, Role::Opaque);
    }

    #[test]
    fn scan_skips_bad_marker_and_reports_truncation() {
        let mut blob = BytesMut::new();
        blob.extend_from_slice(&Header::new(0, 14, 0).unwrap().to_bits().to_le_bytes());
        blob.extend_from_slice(&key_frame(3));
        blob.extend_from_slice(&copyright("cut")[..3]);

        let catalog = catalog();
        let steps: Vec<Scanned> = scan(&blob, &catalog).collect();
        assert_eq!(steps.len(), 3);
        assert!(matches!(steps[0], Scanned::Skipped { offset: 0, .. }));
        assert!(matches!(&steps[1], Scanned::Packet(p) if p.role == Role::SnapshotMarker));
        assert_eq!(
            steps[2],
            Scanned::Truncated {
                offset: 6,
                remaining: 3
            }
        );
    }

    #[test]
    fn scan_of_empty_blob_yields_nothing() {
        let catalog = catalog();
        assert_eq!(scan(&[], &catalog).count(), 0);
    }
}
