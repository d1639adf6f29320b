//! Shared formats for the morph retargeting tools
//!
//! This crate provides the on-disk formats shared between:
//! - `morph-retarget` (conversion pipeline and CLI)
//! - downstream morph loaders that read packed containers
//!
//! # Modules
//!
//! - [`formats`] - Binary morph records, packed containers, vertex maps and
//!   transition-morph records

pub mod formats;

// Re-export commonly used format items
pub use formats::{
    // Constants
    ATTR_JCT_DATA,
    ATTR_NORMALS,
    ATTR_POSITIONS,
    ATTR_TANGENTS,
    BinarySerializable,
    CONTAINER_EXT,
    MORPH_EXT,
    MORPH_PACK_MAGIC,
    MORPH_PACK_VERSION,
    // Record types
    MorphFileHeader,
    MorphPack,
    MorphRecord,
    // Transition morphs
    TransitionMorph,
    TransitionMorphList,
    // Vertex maps
    VertexMap,
    read_morph_record,
    write_morph_record,
};
