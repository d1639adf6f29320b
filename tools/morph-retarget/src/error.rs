//! Typed errors for the retargeting core

use thiserror::Error;

/// Errors from building a vertex correspondence
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetargetError {
    /// Source snapshot has no vertices but the target does
    #[error("source vertex map is empty, cannot match {target_count} target vertices")]
    EmptySource { target_count: usize },

    /// A position is NaN or infinite
    #[error("{snapshot} vertex {index} has a non-finite position {position:?}")]
    NonFinitePosition {
        snapshot: &'static str,
        index: usize,
        position: [f32; 3],
    },

    /// Vertex count does not fit the u32 index space
    #[error("{snapshot} snapshot has {count} vertices, more than u32 indices can address")]
    TooManyVertices { snapshot: &'static str, count: usize },
}

/// Data-integrity faults while remapping one morph record
///
/// These mean the vertex map does not belong to the mesh or the morph data
/// is corrupt. The record is never clamped or partially written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemapError {
    /// Target index lies past the newly allocated array
    #[error(
        "target index in {mesh} is too large for {attribute} deltas of '{morph}': \
         {target} => {source_index} | {len}"
    )]
    TargetOutOfRange {
        mesh: String,
        morph: String,
        attribute: &'static str,
        target: usize,
        source_index: usize,
        len: usize,
    },

    /// Source index lies past the old record's array
    #[error(
        "source index in {mesh} is too large for {attribute} deltas of '{morph}': \
         {target} => {source_index} | {len}"
    )]
    SourceOutOfRange {
        mesh: String,
        morph: String,
        attribute: &'static str,
        target: usize,
        source_index: usize,
        len: usize,
    },
}
