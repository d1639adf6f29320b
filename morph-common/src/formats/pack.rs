//! Packed morph container (.morphs.mr)
//!
//! Every morph record of one mesh merged into a single file that the
//! downstream morph loader reads in one go.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Magic "NCMR" (4 bytes)              │
//! ├──────────────────────────────────────┤
//! │  MorphPack (bitcode serialized)      │
//! └──────────────────────────────────────┘
//! ```
//!
//! Records are kept sorted by name so the same inputs always produce the
//! same bytes.

use bitcode::{Decode, Encode};
use hashbrown::HashMap;
use std::sync::OnceLock;

use super::morph::MorphRecord;

/// Magic bytes at the start of every container
pub const MORPH_PACK_MAGIC: &[u8; 4] = b"NCMR";

/// Current container version
pub const MORPH_PACK_VERSION: u32 = 1;

/// All morph records for one mesh
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct MorphPack {
    /// Container format version
    pub version: u32,

    /// Records, sorted by name
    records: Vec<MorphRecord>,

    #[bitcode(skip)]
    index: OnceLock<HashMap<String, usize>>,
}

impl MorphPack {
    /// Create an empty container
    pub fn new() -> Self {
        Self {
            version: MORPH_PACK_VERSION,
            ..Self::default()
        }
    }

    /// Create a container from records
    ///
    /// Records are sorted by name. When two records share a name the later
    /// one in the input wins.
    pub fn from_records(records: Vec<MorphRecord>) -> Self {
        let mut by_name: HashMap<String, MorphRecord> = HashMap::with_capacity(records.len());
        for record in records {
            by_name.insert(record.name.clone(), record);
        }
        let mut records: Vec<MorphRecord> = by_name.into_values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            version: MORPH_PACK_VERSION,
            records,
            index: OnceLock::new(),
        }
    }

    /// Records in name order
    pub fn records(&self) -> &[MorphRecord] {
        &self.records
    }

    /// Consume the container and return its records
    pub fn into_records(self) -> Vec<MorphRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find a record by name (O(1) lookup via lazy-initialized hash index)
    pub fn find(&self, name: &str) -> Option<&MorphRecord> {
        let index = self.index.get_or_init(|| {
            self.records
                .iter()
                .enumerate()
                .map(|(i, r)| (r.name.clone(), i))
                .collect()
        });
        index.get(name).map(|&i| &self.records[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Serialize container to bytes with magic header
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = MORPH_PACK_MAGIC.to_vec();
        bytes.extend(bitcode::encode(self));
        bytes
    }

    /// Deserialize container from bytes
    ///
    /// Checks magic bytes and the format version.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < 4 || &bytes[0..4] != MORPH_PACK_MAGIC {
            anyhow::bail!(
                "Invalid morph container magic bytes (expected: {:?})",
                std::str::from_utf8(MORPH_PACK_MAGIC).unwrap_or("NCMR")
            );
        }

        let pack: MorphPack = bitcode::decode(&bytes[4..])
            .map_err(|e| anyhow::anyhow!("Failed to decode morph container: {}", e))?;

        if pack.version > MORPH_PACK_VERSION {
            anyhow::bail!(
                "Unsupported morph container version: {} (max supported: {})",
                pack.version,
                MORPH_PACK_VERSION
            );
        }

        Ok(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, x: f32) -> MorphRecord {
        MorphRecord {
            delta_positions: Some(vec![[x, 0.0, 0.0]]),
            ..MorphRecord::named(name)
        }
    }

    #[test]
    fn test_empty_pack() {
        let pack = MorphPack::new();
        assert!(pack.is_empty());
        assert_eq!(pack.version, MORPH_PACK_VERSION);
        assert!(pack.find("base").is_none());
    }

    #[test]
    fn test_records_sorted_by_name() {
        let pack = MorphPack::from_records(vec![
            record("smile", 1.0),
            record("base", 2.0),
            record("blink", 3.0),
        ]);
        let names: Vec<&str> = pack.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["base", "blink", "smile"]);
    }

    #[test]
    fn test_duplicate_name_keeps_last() {
        let pack = MorphPack::from_records(vec![record("base", 1.0), record("base", 9.0)]);
        assert_eq!(pack.len(), 1);
        let base = pack.find("base").unwrap();
        assert_eq!(base.delta_positions.as_ref().unwrap()[0][0], 9.0);
    }

    #[test]
    fn test_find_after_decode() {
        let pack = MorphPack::from_records(vec![record("smile", 1.0), record("base", 2.0)]);
        let bytes = pack.to_bytes();
        assert_eq!(&bytes[0..4], MORPH_PACK_MAGIC);

        let decoded = MorphPack::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.contains("smile"));
        assert!(!decoded.contains("frown"));
        assert_eq!(decoded.find("base"), pack.find("base"));
    }

    #[test]
    fn test_same_records_same_bytes() {
        let a = MorphPack::from_records(vec![record("a", 1.0), record("b", 2.0)]);
        let b = MorphPack::from_records(vec![record("b", 2.0), record("a", 1.0)]);
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_invalid_magic_bytes() {
        let result = MorphPack::from_bytes(b"BADMAGIC");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid morph container magic bytes")
        );
    }

    #[test]
    fn test_future_version_rejected() {
        let mut pack = MorphPack::from_records(vec![record("base", 1.0)]);
        pack.version = MORPH_PACK_VERSION + 1;
        let result = MorphPack::from_bytes(&pack.to_bytes());
        assert!(result.unwrap_err().to_string().contains("Unsupported"));
    }
}
