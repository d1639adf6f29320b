//! glTF/GLB vertex positions

use anyhow::{Context, Result, bail};
use std::path::Path;

/// Read the vertex positions of one mesh in a glTF/GLB file
///
/// Primitives are concatenated in document order. Primitives that share a
/// position accessor share vertices, so each accessor is read once.
pub fn read_gltf_positions(input: &Path, mesh_name: Option<&str>) -> Result<Vec<[f32; 3]>> {
    let (document, buffers, _images) =
        gltf::import(input).with_context(|| format!("Failed to load glTF: {:?}", input))?;

    let mesh = select_mesh(&document, mesh_name)
        .with_context(|| format!("Failed to pick a mesh in {:?}", input))?;

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut read_accessors: Vec<usize> = Vec::new();
    for primitive in mesh.primitives() {
        let Some(accessor) = primitive.get(&gltf::Semantic::Positions) else {
            continue;
        };
        if read_accessors.contains(&accessor.index()) {
            continue;
        }
        read_accessors.push(accessor.index());

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        positions.extend(reader.read_positions().context("No positions in mesh")?);
    }

    if positions.is_empty() {
        bail!(
            "Mesh '{}' in {:?} has no vertex positions",
            mesh.name().unwrap_or("unnamed"),
            input
        );
    }

    tracing::debug!(
        "Read {} vertices from mesh '{}' in {:?}",
        positions.len(),
        mesh.name().unwrap_or("unnamed"),
        input
    );
    Ok(positions)
}

/// Named mesh if present, otherwise the only mesh in the document
fn select_mesh<'a>(document: &'a gltf::Document, name: Option<&str>) -> Result<gltf::Mesh<'a>> {
    if let Some(name) = name {
        if let Some(mesh) = document.meshes().find(|m| m.name() == Some(name)) {
            return Ok(mesh);
        }
    }

    let mut meshes = document.meshes();
    let first = meshes.next().context("No meshes found in glTF")?;
    if meshes.next().is_some() {
        bail!(
            "glTF contains {} meshes and none is named {:?}",
            document.meshes().len(),
            name.unwrap_or_default()
        );
    }
    Ok(first)
}
