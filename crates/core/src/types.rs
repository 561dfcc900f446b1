//! Core data types
//!
//! - [`ShardOffset`]: where a record lives inside a shard data file
//! - [`Element`]: the unit of data stored in a collection
//! - [`FieldIndex`] / [`CustomStructure`]: user-defined structures that can be
//!   embedded inside elements

use serde::{Deserialize, Serialize};

/// Number of shards every collection is partitioned into.
///
/// Changing this value makes existing collections unloadable.
pub const SHARD_COUNT: usize = 16;

/// Location of a record inside a shard data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardOffset {
    /// Byte position of the first record byte
    pub position: u64,
    /// Record length in bytes
    pub length: u64,
    /// CRC32 of the record bytes
    pub checksum: u32,
}

impl ShardOffset {
    /// Create a new offset descriptor
    pub fn new(position: u64, length: u64, checksum: u32) -> Self {
        ShardOffset {
            position,
            length,
            checksum,
        }
    }

    /// First byte past the record
    pub fn end(&self) -> u64 {
        self.position + self.length
    }

    /// First byte past the record, or `None` if the range overflows
    ///
    /// Use this on offsets decoded from disk.
    pub fn checked_end(&self) -> Option<u64> {
        self.position.checked_add(self.length)
    }

    /// Check the stored checksum against record bytes
    pub fn verify(&self, bytes: &[u8]) -> bool {
        bytes.len() as u64 == self.length && crc32fast::hash(bytes) == self.checksum
    }
}

/// A single (field, value) pair exposed by a [`CustomStructure`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldIndex {
    /// Field name
    pub field: String,
    /// Field value rendered as text
    pub value: String,
}

impl FieldIndex {
    /// Create a new field index entry
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        FieldIndex {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A user-defined structure that can be stored inside an [`Element`].
///
/// The type must be registered with the database before it is stored.
pub trait CustomStructure: Serialize {
    /// Flat index of the fields that can be searched
    fn data_index(&self) -> Vec<FieldIndex>;
}

/// Unit of data stored in a collection
///
/// `payload` is opaque to the storage layer. Elements built from a
/// [`CustomStructure`] carry the registered type name and the structure's
/// field index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Identifier allocated by the collection
    pub id: u64,
    /// Registered type name for structured payloads
    pub type_name: Option<String>,
    /// Searchable fields
    pub index: Vec<FieldIndex>,
    /// Encoded value
    pub payload: Vec<u8>,
}

impl Element {
    /// Create an element with a raw payload
    pub fn new(id: u64, payload: impl Into<Vec<u8>>) -> Self {
        Element {
            id,
            type_name: None,
            index: Vec::new(),
            payload: payload.into(),
        }
    }

    /// Create an element holding an encoded structure
    pub fn structured(
        id: u64,
        type_name: impl Into<String>,
        index: Vec<FieldIndex>,
        payload: Vec<u8>,
    ) -> Self {
        Element {
            id,
            type_name: Some(type_name.into()),
            index,
            payload,
        }
    }

    /// Check whether a field has the given value
    pub fn matches(&self, field: &str, value: &str) -> bool {
        self.index
            .iter()
            .any(|entry| entry.field == field && entry.value == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_end() {
        let offset = ShardOffset::new(100, 28, 0);
        assert_eq!(offset.end(), 128);
    }

    #[test]
    fn test_offset_checked_end() {
        assert_eq!(ShardOffset::new(100, 28, 0).checked_end(), Some(128));
        assert_eq!(ShardOffset::new(u64::MAX - 1, 10, 0).checked_end(), None);
    }

    #[test]
    fn test_offset_verify() {
        let bytes = b"record bytes";
        let offset = ShardOffset::new(0, bytes.len() as u64, crc32fast::hash(bytes));
        assert!(offset.verify(bytes));
        assert!(!offset.verify(b"record bytez"));
        assert!(!offset.verify(b"short"));
    }

    #[test]
    fn test_element_matches() {
        let element = Element::structured(
            7,
            "user",
            vec![FieldIndex::new("name", "ada"), FieldIndex::new("role", "admin")],
            vec![1, 2, 3],
        );
        assert!(element.matches("name", "ada"));
        assert!(element.matches("role", "admin"));
        assert!(!element.matches("name", "admin"));
        assert!(!Element::new(1, b"raw".to_vec()).matches("name", "ada"));
    }

    #[test]
    fn test_element_bincode() {
        let element = Element::structured(3, "user", vec![FieldIndex::new("a", "b")], vec![9; 4]);
        let bytes = bincode::serialize(&element).unwrap();
        let decoded: Element = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, element);
    }
}
