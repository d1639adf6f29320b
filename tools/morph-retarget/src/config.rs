//! retarget.toml job file parsing
//!
//! ```toml
//! [conversion]
//! family = "MCSFemale"
//! map_dir = "ConversionMaps"
//! asset_root = "StreamingAssets"
//!
//! [morphs]
//! MCSFemale = ["FBMHeavy", "FBMThin"]
//!
//! [[meshes]]
//! name = "Torso"
//! path = "export/Torso.glb"
//! morph_path = "MCS/Female/Torso"
//! ```
//!
//! Relative paths resolve against the directory holding the job file.

use anyhow::{Context, Result, bail};
use hashbrown::HashSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::manifest::MorphManifest;
use crate::mesh::{MeshList, MeshListItem, SceneMesh, read_mesh_positions};
use crate::pipeline::{PipelineConfig, is_store_relative};

/// retarget.toml job structure
#[derive(Debug, Deserialize)]
pub struct RetargetJob {
    pub conversion: ConversionSection,
    /// Morph manifest: family name to ordered morph names
    #[serde(default)]
    pub morphs: MorphManifest,
    #[serde(default)]
    pub meshes: Vec<MeshEntry>,
}

/// Conversion settings section
#[derive(Debug, Deserialize)]
pub struct ConversionSection {
    /// Mesh family the manifest is looked up by
    pub family: String,

    /// Directory for `<mesh>.json` vertex maps.
    /// Default: "ConversionMaps"
    #[serde(default = "default_map_dir")]
    pub map_dir: PathBuf,

    /// Root of the morph stores.
    /// Default: "StreamingAssets"
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    /// Report nearest matches farther than this (never rejects them)
    #[serde(default)]
    pub max_match_distance: Option<f32>,

    /// JSON file holding the live transition-morph set
    #[serde(default)]
    pub transition_state: Option<PathBuf>,

    /// Portable transition-morph record.
    /// Default: "jctmorphs.json"
    #[serde(default = "default_transition_record")]
    pub transition_record: PathBuf,
}

fn default_map_dir() -> PathBuf {
    PathBuf::from("ConversionMaps")
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("StreamingAssets")
}

fn default_transition_record() -> PathBuf {
    PathBuf::from("jctmorphs.json")
}

fn default_selected() -> bool {
    true
}

/// Single mesh entry
#[derive(Debug, Deserialize)]
pub struct MeshEntry {
    /// Mesh identity; also names the vertex map file
    pub name: String,

    /// Current mesh export (.obj, .gltf or .glb)
    pub path: PathBuf,

    /// Mesh to read inside a multi-mesh glTF file.
    /// If not specified, the mesh named `name` (or the only mesh) is used.
    #[serde(default)]
    pub gltf_mesh: Option<String>,

    /// Morph store location under the asset root
    #[serde(default)]
    pub morph_path: Option<PathBuf>,

    /// Whether extract/convert act on this mesh.
    /// Default: true
    #[serde(default = "default_selected")]
    pub selected: bool,
}

impl RetargetJob {
    /// Load job from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse job from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse retarget.toml")
    }

    /// Check settings the TOML schema cannot express
    pub fn validate(&self) -> Result<()> {
        if self.conversion.family.trim().is_empty() {
            bail!("conversion.family must not be empty");
        }
        if let Some(limit) = self.conversion.max_match_distance {
            if !(limit.is_finite() && limit > 0.0) {
                bail!(
                    "conversion.max_match_distance must be a positive number, got {}",
                    limit
                );
            }
        }

        let mut seen = HashSet::new();
        for mesh in &self.meshes {
            if mesh.name.trim().is_empty() {
                bail!("Mesh entry for {} has an empty name", mesh.path.display());
            }
            if !seen.insert(mesh.name.as_str()) {
                bail!("Duplicate mesh name: {}", mesh.name);
            }
            if let Some(morph_path) = &mesh.morph_path {
                if !is_store_relative(morph_path) {
                    bail!(
                        "Mesh '{}' has morph_path {:?}; it must be a relative path \
                         inside conversion.asset_root without '..' or '.'",
                        mesh.name,
                        morph_path
                    );
                }
            }
        }
        Ok(())
    }

    /// Pipeline settings with paths resolved against `base_dir`
    pub fn pipeline_config(&self, base_dir: &Path) -> PipelineConfig {
        PipelineConfig {
            family: self.conversion.family.clone(),
            map_dir: base_dir.join(&self.conversion.map_dir),
            asset_root: base_dir.join(&self.conversion.asset_root),
            max_match_distance: self.conversion.max_match_distance,
        }
    }

    pub fn transition_state_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.conversion
            .transition_state
            .as_ref()
            .map(|p| base_dir.join(p))
    }

    pub fn transition_record_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.conversion.transition_record)
    }

    /// Read every listed mesh's current positions into a mesh list
    pub fn load_meshes(&self, base_dir: &Path) -> Result<MeshList> {
        let items = self
            .meshes
            .iter()
            .map(|entry| {
                let path = base_dir.join(&entry.path);
                let gltf_mesh = entry.gltf_mesh.as_deref().unwrap_or(&entry.name);
                let vertices = read_mesh_positions(&path, Some(gltf_mesh))
                    .with_context(|| format!("Failed to load mesh '{}'", entry.name))?;

                let mut mesh = SceneMesh::new(&entry.name, vertices);
                mesh.morph_path = entry.morph_path.clone();
                Ok(MeshListItem::new(mesh, entry.selected))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Loaded {} meshes", items.len());
        Ok(MeshList::from_items(items))
    }
}
