//! Binary serialization trait for format headers.
//!
//! Fixed-size headers implement `BinarySerializable` so generic code can read
//! and write them without knowing the concrete type. Each header keeps its
//! type-specific `to_bytes()` returning a fixed-size array.

/// Trait for binary-serializable format headers.
///
/// The trait returns `Vec<u8>` because associated const generics in return
/// types (`[u8; Self::SIZE]`) are not yet stable in Rust.
///
/// # Example
///
/// ```
/// use morph_common::formats::{BinarySerializable, MorphFileHeader, ATTR_POSITIONS};
///
/// let header = MorphFileHeader::new(1200, ATTR_POSITIONS, 0, 3);
///
/// let bytes = header.serialize();
/// let parsed = MorphFileHeader::deserialize(&bytes).unwrap();
/// assert_eq!(parsed.vertex_count, 1200);
/// ```
pub trait BinarySerializable: Sized {
    /// Size of the serialized header in bytes.
    const SIZE: usize;

    /// Serialize to bytes.
    fn serialize(&self) -> Vec<u8>;

    /// Deserialize from bytes.
    ///
    /// Returns `None` if the byte slice is too short.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

impl BinarySerializable for super::MorphFileHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}
