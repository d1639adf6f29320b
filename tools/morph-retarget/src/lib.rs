//! morph-retarget library
//!
//! Retargets morph (blendshape) data authored against one vertex order of a
//! mesh onto the vertex order of a newer export of the same mesh.
//!
//! The pieces, leaves first:
//! - [`correspondence`]: nearest-position match of target vertices to source vertices
//! - [`remap`]: reorders every per-vertex delta array through that match
//! - [`pipeline`]: per-mesh orchestration: gates, remap, merge, cleanup

pub mod config;
pub mod correspondence;
pub mod error;
pub mod manifest;
pub mod mesh;
pub mod pipeline;
pub mod progress;
pub mod remap;
pub mod report;
pub mod store;
pub mod transition;

// Re-export record formats from morph-common
pub use morph_common::{MorphPack, MorphRecord, TransitionMorph, TransitionMorphList, VertexMap};

pub use correspondence::{CorrespondenceMap, Resolution, VertexCorrespondenceResolver, resolve};
pub use error::{RemapError, RetargetError};
pub use manifest::{BASE_MORPH, ManifestSource, MorphManifest};
pub use mesh::{MeshList, MeshListItem, SceneMesh};
pub use pipeline::{CONVERSION_MARKER, MorphAssetPipeline, PipelineConfig};
pub use progress::{ConversionProgress, LogProgress, NoProgress, Stage};
pub use remap::remap_morph_record;
pub use report::{ConversionReport, ExtractionReport, MeshOutcome, MeshStatus, SkipReason};
pub use store::{DirectoryMorphStore, MorphStore};
pub use transition::{export_transition_morphs, import_transition_morphs};
