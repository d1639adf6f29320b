//! Live meshes and the per-run mesh list
//!
//! Target vertex positions are read from the current mesh export
//! (glTF/GLB/OBJ); the list of meshes and their selection state is built
//! once per batch by the caller.

mod gltf;
mod obj;
mod types;

// Re-export public API
pub use self::gltf::read_gltf_positions;
pub use self::obj::read_obj_positions;
pub use self::types::{MeshList, MeshListItem, SceneMesh};

use anyhow::{Result, bail};
use std::path::Path;

/// Read vertex positions from a mesh file, detecting format by extension
///
/// `mesh_name` selects a named mesh inside multi-mesh glTF files.
pub fn read_mesh_positions(input: &Path, mesh_name: Option<&str>) -> Result<Vec<[f32; 3]>> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "obj" => read_obj_positions(input),
        "gltf" | "glb" => read_gltf_positions(input, mesh_name),
        _ => bail!(
            "Unsupported mesh format: {:?} (use .obj, .gltf, or .glb)",
            input
        ),
    }
}
