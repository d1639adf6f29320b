//! Per-mesh conversion pipeline
//!
//! ```text
//! Pending ─► MapLoaded ─► Resolved ─► MorphsProcessing ─► Merging ─► CleanedUp ─► Done
//!    │            (any gate)
//!    └──────────► Skipped
//! ```
//!
//! Each mesh is converted on its own. A failure aborts that mesh only; the
//! batch carries on and every mesh ends up in the [`ConversionReport`].

use anyhow::{Context, Result, bail};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use morph_common::{MorphRecord, VertexMap};

use crate::correspondence::VertexCorrespondenceResolver;
use crate::manifest::{ManifestSource, morph_names};
use crate::mesh::{MeshList, SceneMesh};
use crate::progress::{ConversionProgress, Stage};
use crate::remap::remap_morph_record;
use crate::report::{ConversionReport, ExtractionReport, MeshStatus, SkipReason};
use crate::store::{MorphStore, container_path, remove_dir_if_exists};

/// Name of the sentinel record marking a converted mesh
pub const CONVERSION_MARKER: &str = "__retargeted";

/// Where a mesh is in its conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshState {
    Pending,
    MapLoaded,
    Resolved,
    MorphsProcessing,
    Merging,
    CleanedUp,
    Done,
}

/// Pipeline settings
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Mesh family used for the manifest lookup
    pub family: String,

    /// Directory holding `<mesh name>.json` vertex maps
    pub map_dir: PathBuf,

    /// Root that mesh morph paths are relative to
    pub asset_root: PathBuf,

    /// Optional distance above which nearest matches are reported
    pub max_match_distance: Option<f32>,
}

impl PipelineConfig {
    pub fn new(
        family: impl Into<String>,
        map_dir: impl Into<PathBuf>,
        asset_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            family: family.into(),
            map_dir: map_dir.into(),
            asset_root: asset_root.into(),
            max_match_distance: None,
        }
    }

    /// Vertex map file for a mesh
    pub fn map_path(&self, mesh_name: &str) -> PathBuf {
        self.map_dir.join(format!("{}.json", mesh_name))
    }

    /// Morph store directory for a mesh, if it has a usable morph path
    ///
    /// Paths that would resolve to the asset root itself or escape it have
    /// no store directory.
    pub fn store_dir(&self, mesh: &SceneMesh) -> Option<PathBuf> {
        mesh.morph_path
            .as_deref()
            .filter(|p| is_store_relative(p))
            .map(|p| self.asset_root.join(p))
    }

    /// Delete a mesh's working directory, never the asset root or anything
    /// outside it
    fn remove_store_dir(&self, dir: &Path) -> Result<bool> {
        if dir == self.asset_root.as_path() || !dir.starts_with(&self.asset_root) {
            bail!(
                "Refusing to delete {}: not inside asset root {}",
                dir.display(),
                self.asset_root.display()
            );
        }
        remove_dir_if_exists(dir)
    }
}

/// True if `path` names a location strictly below the directory it is
/// joined onto: non-empty, relative, and made of plain names only
pub fn is_store_relative(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Drives extraction and conversion over a mesh list
pub struct MorphAssetPipeline<S, M> {
    config: PipelineConfig,
    store: S,
    manifest: M,
    cancel: Arc<AtomicBool>,
}

impl<S: MorphStore, M: ManifestSource> MorphAssetPipeline<S, M> {
    pub fn new(config: PipelineConfig, store: S, manifest: M) -> Self {
        Self {
            config,
            store,
            manifest,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Flag checked between meshes; set it to stop the batch early
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Capture vertex maps for every selected mesh that has none yet
    ///
    /// Existing maps are never overwritten: once later exports have
    /// diverged, a baseline cannot be recaptured.
    pub fn extract(&self, meshes: &MeshList) -> Result<ExtractionReport> {
        let map_dir = &self.config.map_dir;
        fs::create_dir_all(map_dir).with_context(|| {
            format!("Failed to create vertex map directory: {}", map_dir.display())
        })?;

        let mut report = ExtractionReport::default();
        for mesh in meshes.selected() {
            let path = self.config.map_path(&mesh.name);
            if write_new_vertex_map(&path, mesh)? {
                tracing::info!(
                    "Extracted {} vertices from {} -> {}",
                    mesh.vertex_count(),
                    mesh.name,
                    path.display()
                );
                report.extracted.push(mesh.name.clone());
            } else {
                tracing::info!("Skipping {}: vertex map already extracted", mesh.name);
                report.already_extracted.push(mesh.name.clone());
            }
        }

        tracing::info!(
            "Extract complete. Find your extracted vertex maps in: {}",
            map_dir.display()
        );
        Ok(report)
    }

    /// Convert every selected mesh, continuing past per-mesh failures
    pub fn convert(
        &self,
        meshes: &MeshList,
        progress: &mut dyn ConversionProgress,
    ) -> ConversionReport {
        let names = morph_names(&self.manifest, &self.config.family);
        let mut report = ConversionReport::default();

        for mesh in meshes.selected() {
            if self.is_cancelled() {
                tracing::warn!("Skipping {}: conversion was cancelled", mesh.name);
                report.push(&mesh.name, MeshStatus::Skipped(SkipReason::Cancelled));
                continue;
            }

            let status = match self.convert_mesh(mesh, &names, progress) {
                Ok(status) => status,
                Err(err) => {
                    tracing::error!("Failed to convert {}: {:#}", mesh.name, err);
                    self.discard_intermediates(mesh);
                    MeshStatus::Failed(format!("{:#}", err))
                }
            };
            report.push(&mesh.name, status);
        }
        progress.finish();

        tracing::info!("{}", report.to_string().trim_end());
        report
    }

    /// Evaluate the gates for a mesh without converting anything
    ///
    /// Returns the skip reason, or `None` if the mesh would be converted.
    pub fn check_gates(&self, mesh: &SceneMesh) -> Result<Option<SkipReason>> {
        if let Some(path) = &mesh.morph_path {
            if !is_store_relative(path) {
                return Ok(Some(SkipReason::InvalidMorphPath(path.clone())));
            }
        }
        let store_dir = self.config.store_dir(mesh);

        if let Some(dir) = &store_dir {
            if self.store.load_morph_record(dir, CONVERSION_MARKER)?.is_some() {
                return Ok(Some(SkipReason::AlreadyConverted));
            }
        }

        let map_path = self.config.map_path(&mesh.name);
        if !map_path.is_file() {
            return Ok(Some(SkipReason::MissingVertexMap(map_path)));
        }

        if store_dir.is_none() {
            return Ok(Some(SkipReason::MissingMorphPath));
        }

        Ok(None)
    }

    fn convert_mesh(
        &self,
        mesh: &SceneMesh,
        morph_names: &[String],
        progress: &mut dyn ConversionProgress,
    ) -> Result<MeshStatus> {
        let name = mesh.name.as_str();
        let mut state = MeshState::Pending;
        progress.report(name, Stage::LoadingVertexMap, 0.0);

        if let Some(reason) = self.check_gates(mesh)? {
            tracing::warn!("Skipping {}: {}", name, reason);
            return Ok(MeshStatus::Skipped(reason));
        }
        let store_dir = self
            .config
            .store_dir(mesh)
            .context("Morph store path vanished after gate check")?;

        let vertex_map = load_vertex_map(&self.config.map_path(name))?;
        advance(name, &mut state, MeshState::MapLoaded);

        progress.report(name, Stage::GeneratingRetargetMap, 0.25);
        let resolver =
            VertexCorrespondenceResolver::with_max_match_distance(self.config.max_match_distance);
        let resolution = resolver
            .resolve(&vertex_map.vertices, &mesh.vertices)
            .with_context(|| format!("Failed to generate retarget map for {}", name))?;
        if resolution.far_matches > 0 {
            tracing::warn!(
                "{}: {} of {} vertices matched farther than {} (worst {}); \
                 new geometry gets the nearest old vertex's deltas",
                name,
                resolution.far_matches,
                mesh.vertex_count(),
                self.config.max_match_distance.unwrap_or_default(),
                resolution.max_distance
            );
        }
        let map = resolution.map;
        advance(name, &mut state, MeshState::Resolved);

        // The working directory only ever holds this run's records
        if self.config.remove_store_dir(&store_dir)? {
            tracing::warn!(
                "{}: removed leftover temporary files in {}",
                name,
                store_dir.display()
            );
        }
        advance(name, &mut state, MeshState::MorphsProcessing);

        let total = morph_names.len().max(1) as f32;
        let mut remapped = 0usize;
        let mut missing_morphs = Vec::new();
        for (i, morph) in morph_names.iter().enumerate() {
            progress.report(name, Stage::Morph(morph), 0.25 + 0.55 * (i as f32 / total));

            let Some(old) = self.store.load_morph_record(&store_dir, morph)? else {
                // Not every mesh carries every morph
                tracing::info!("{}: morph '{}' not present, skipping", name, morph);
                missing_morphs.push(morph.clone());
                continue;
            };

            let record = remap_morph_record(&map, &old, mesh.vertex_count(), name)?;
            self.store.save_morph_record(&store_dir, &record)?;
            remapped += 1;
        }

        self.store
            .save_morph_record(&store_dir, &MorphRecord::named(CONVERSION_MARKER))?;
        advance(name, &mut state, MeshState::Merging);

        progress.report(name, Stage::RebuildingContainer, 0.8);
        let container = container_path(&store_dir);
        self.store
            .merge_records_into_container(&store_dir, &container)?;

        progress.report(name, Stage::DeletingTemporaryFiles, 0.95);
        self.config.remove_store_dir(&store_dir)?;
        advance(name, &mut state, MeshState::CleanedUp);

        tracing::info!(
            "Converted {}: {} morphs remapped onto {} vertices, {} not present",
            name,
            remapped,
            mesh.vertex_count(),
            missing_morphs.len()
        );
        advance(name, &mut state, MeshState::Done);

        Ok(MeshStatus::Converted {
            remapped,
            missing_morphs,
            container,
        })
    }

    /// Best-effort removal of a failed mesh's intermediate records
    ///
    /// The container is only replaced after every record is written, so the
    /// previous container stays valid.
    fn discard_intermediates(&self, mesh: &SceneMesh) {
        let Some(store_dir) = self.config.store_dir(mesh) else {
            return;
        };
        if let Err(err) = self.config.remove_store_dir(&store_dir) {
            tracing::warn!(
                "{}: could not delete temporary files: {:#}",
                mesh.name,
                err
            );
        }
    }
}

fn advance(mesh: &str, state: &mut MeshState, next: MeshState) {
    tracing::debug!("{}: {:?} -> {:?}", mesh, state, next);
    *state = next;
}

/// Read a vertex map file
pub fn load_vertex_map(path: &Path) -> Result<VertexMap> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read vertex map: {}", path.display()))?;
    VertexMap::from_json(&json)
        .with_context(|| format!("Failed to parse vertex map: {}", path.display()))
}

/// Write a vertex map unless one already exists; returns whether it wrote
fn write_new_vertex_map(path: &Path, mesh: &SceneMesh) -> Result<bool> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to create vertex map: {}", path.display()));
        }
    };

    let json = VertexMap::new(mesh.vertices.clone())
        .to_json()
        .context("Failed to serialize vertex map")?;
    let mut writer = std::io::BufWriter::new(file);
    writer
        .write_all(json.as_bytes())
        .and_then(|()| writer.flush())
        .with_context(|| format!("Failed to write vertex map: {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests;
