//! Versioned packet-type catalog.
//!
//! The catalog maps a `(class, kind)` pair from the packet header to the rule
//! that sizes its payload, whether that payload is ciphered, and the role it
//! plays in the state machine. The decoder never hard-codes any of this, so a
//! corrected table can be shipped as a JSON document after checking it against
//! captured reference streams.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Version of the built-in catalog.
pub const CATALOG_VERSION: u32 = 1;

/// Number of distinct values of the 4-bit type field.
const KINDS: usize = 16;

/// Header class: car id 0 is the system channel, 1..=31 are cars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketClass {
    System,
    Car,
}

/// How the payload length follows from the header's 7-bit data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "len", rename_all = "snake_case")]
pub enum LengthRule {
    /// No payload; the data field is a value in its own right.
    Empty,
    /// Always `n` payload bytes.
    Fixed(u8),
    /// The whole data field is the payload length.
    Data,
    /// High four bits are the length, low three bits stay a value.
    Packed,
}

impl LengthRule {
    /// Returns `(payload_len, residual_data)` for a header data field.
    pub fn resolve(self, data: u8) -> (usize, u8) {
        match self {
            LengthRule::Empty => (0, data),
            LengthRule::Fixed(len) => (len as usize, data),
            LengthRule::Data => (data as usize, 0),
            LengthRule::Packed => ((data >> 3) as usize, data & 0x07),
        }
    }
}

/// What the state machine does with a packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SnapshotMarker,
    DomainEvent,
    Commentary,
    Opaque,
}

/// One row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub class: PacketClass,
    pub kind: u8,
    pub name: String,
    pub length: LengthRule,
    pub ciphered: bool,
    pub role: Role,
}

impl CatalogEntry {
    fn system(kind: u8, name: &str, length: LengthRule, ciphered: bool, role: Role) -> Self {
        Self {
            class: PacketClass::System,
            kind,
            name: name.to_string(),
            length,
            ciphered,
            role,
        }
    }

    fn car(kind: u8, name: &str, length: LengthRule, ciphered: bool) -> Self {
        Self {
            class: PacketClass::Car,
            kind,
            name: name.to_string(),
            length,
            ciphered,
            role: Role::Opaque,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CatalogDocument {
    version: u32,
    entries: Vec<CatalogEntry>,
}

/// Lookup table from header type to [`CatalogEntry`].
#[derive(Debug, Clone)]
pub struct Catalog {
    version: u32,
    entries: Vec<CatalogEntry>,
    index: [[Option<usize>; KINDS]; 2],
}

impl Catalog {
    /// The built-in version 1 table.
    pub fn v1() -> Self {
        use LengthRule::{Data, Empty, Fixed, Packed};

        let mut entries = vec![
            CatalogEntry::system(1, "event_id", Data, false, Role::DomainEvent),
            CatalogEntry::system(2, "key_frame", Fixed(2), false, Role::SnapshotMarker),
            CatalogEntry::system(3, "valid_marker", Empty, false, Role::Opaque),
            CatalogEntry::system(4, "commentary", Data, true, Role::Commentary),
            CatalogEntry::system(5, "refresh_rate", Empty, false, Role::Opaque),
            CatalogEntry::system(6, "notice", Data, true, Role::Opaque),
            CatalogEntry::system(7, "timestamp", Fixed(2), true, Role::Opaque),
            CatalogEntry::system(9, "weather", Packed, true, Role::Opaque),
            CatalogEntry::system(10, "speed", Data, true, Role::Opaque),
            CatalogEntry::system(11, "track_status", Packed, true, Role::Opaque),
            CatalogEntry::system(12, "copyright", Data, false, Role::Opaque),
            CatalogEntry::car(0, "position_update", Empty, false),
        ];
        entries.extend((1..15).map(|kind| CatalogEntry::car(kind, "car_field", Packed, true)));
        entries.push(CatalogEntry::car(15, "position_history", Data, true));

        Self::indexed(CATALOG_VERSION, entries)
    }

    /// Build a catalog, rejecting out-of-range kinds and duplicate rows.
    pub fn from_entries(version: u32, entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut seen = [[false; KINDS]; 2];
        for entry in &entries {
            if entry.kind as usize >= KINDS {
                return Err(FrameError::KindOutOfRange {
                    class: entry.class,
                    kind: entry.kind,
                });
            }
            let slot = &mut seen[class_slot(entry.class)][entry.kind as usize];
            if *slot {
                return Err(FrameError::DuplicateEntry {
                    class: entry.class,
                    kind: entry.kind,
                });
            }
            *slot = true;
        }
        Ok(Self::indexed(version, entries))
    }

    /// Index rows that are already known to be unique and in range.
    fn indexed(version: u32, entries: Vec<CatalogEntry>) -> Self {
        let mut index = [[None; KINDS]; 2];
        for (position, entry) in entries.iter().enumerate() {
            if let Some(slot) = index[class_slot(entry.class)].get_mut(entry.kind as usize) {
                *slot = Some(position);
            }
        }
        Self {
            version,
            entries,
            index,
        }
    }

    /// Parse a catalog from its JSON document form.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::from_entries(document.version, document.entries)
    }

    /// Load a catalog JSON document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Render the catalog as a JSON document accepted by [`Catalog::from_json`].
    pub fn to_json_pretty(&self) -> Result<String> {
        let document = CatalogDocument {
            version: self.version,
            entries: self.entries.clone(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Entry for a header type, or `None` for an unrecognized marker.
    pub fn lookup(&self, class: PacketClass, kind: u8) -> Option<&CatalogEntry> {
        let position = (*self.index[class_slot(class)].get(kind as usize)?)?;
        self.entries.get(position)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::v1()
    }
}

fn class_slot(class: PacketClass) -> usize {
    match class {
        PacketClass::System => 0,
        PacketClass::Car => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_covers_state_machine_roles() {
        let catalog = Catalog::v1();
        let key_frame = catalog.lookup(PacketClass::System, 2).unwrap();
        assert_eq!(key_frame.role, Role::SnapshotMarker);
        assert_eq!(key_frame.length, LengthRule::Fixed(2));
        assert!(!key_frame.ciphered);

        let commentary = catalog.lookup(PacketClass::System, 4).unwrap();
        assert_eq!(commentary.role, Role::Commentary);
        assert!(commentary.ciphered);

        assert_eq!(
            catalog.lookup(PacketClass::System, 1).unwrap().role,
            Role::DomainEvent
        );
    }

    #[test]
    fn v1_leaves_gaps_unrecognized() {
        let catalog = Catalog::v1();
        for kind in [0, 8, 13, 14, 15] {
            assert!(catalog.lookup(PacketClass::System, kind).is_none(), "kind {kind}");
        }
        for kind in 0..16 {
            assert!(catalog.lookup(PacketClass::Car, kind).is_some(), "car kind {kind}");
        }
        assert!(catalog.lookup(PacketClass::Car, 16).is_none());
    }

    #[test]
    fn v1_passes_its_own_validation() {
        let catalog = Catalog::v1();
        assert!(Catalog::from_entries(catalog.version(), catalog.entries().to_vec()).is_ok());
    }

    #[test]
    fn length_rules_split_data_field() {
        assert_eq!(LengthRule::Empty.resolve(0x55), (0, 0x55));
        assert_eq!(LengthRule::Fixed(2).resolve(0x55), (2, 0x55));
        assert_eq!(LengthRule::Data.resolve(0x55), (0x55, 0));
        assert_eq!(LengthRule::Packed.resolve(0b0101_101), (0b0101, 0b101));
    }

    #[test]
    fn json_document_round_trips() {
        let catalog = Catalog::v1();
        let json = catalog.to_json_pretty().unwrap();
        let loaded = Catalog::from_json(&json).unwrap();
        assert_eq!(loaded.version(), CATALOG_VERSION);
        assert_eq!(loaded.entries(), catalog.entries());
    }

    #[test]
    fn pluggable_catalog_can_flip_cipher_gate() {
        let json = r#"{
            "version": 2,
            "entries": [
                { "class": "system", "kind": 4, "name": "commentary",
                  "length": { "rule": "data" }, "ciphered": false, "role": "commentary" },
                { "class": "system", "kind": 2, "name": "key_frame",
                  "length": { "rule": "fixed", "len": 2 }, "ciphered": false, "role": "snapshot_marker" }
            ]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.version(), 2);
        assert!(!catalog.lookup(PacketClass::System, 4).unwrap().ciphered);
        assert!(catalog.lookup(PacketClass::System, 1).is_none());
    }

    #[test]
    fn duplicate_rows_are_rejected() {
        let entry = CatalogEntry::system(3, "a", LengthRule::Empty, false, Role::Opaque);
        let err = Catalog::from_entries(1, vec![entry.clone(), entry]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::DuplicateEntry {
                class: PacketClass::System,
                kind: 3
            }
        ));
    }

    #[test]
    fn out_of_range_kind_is_rejected() {
        let entry = CatalogEntry::car(16, "bogus", LengthRule::Empty, false);
        assert!(matches!(
            Catalog::from_entries(1, vec![entry]),
            Err(FrameError::KindOutOfRange { kind: 16, .. })
        ));
    }
}
