//! Morph asset formats
//!
//! - `.morph`: one remapped morph record (POD header + little-endian payload)
//! - `.morphs.mr`: packed container of every record for one mesh
//! - `<mesh>.json`: persisted vertex map used as the retargeting baseline
//! - transition-morph record: portable JSON export of transition morphs
//!
//! Headers implement the [`BinarySerializable`] trait for consistent
//! serialization/deserialization.

pub mod morph;
pub mod pack;
mod serialization;
pub mod transition;
pub mod vertex_map;

pub use morph::*;
pub use pack::*;
pub use serialization::BinarySerializable;
pub use transition::*;
pub use vertex_map::*;

/// File extension of a single intermediate morph record (without dot)
pub const MORPH_EXT: &str = "morph";

/// Suffix appended to a morph store path to locate its packed container
pub const CONTAINER_EXT: &str = "morphs.mr";
