//! Morph store access
//!
//! A mesh's morph store is addressed by its store directory
//! (`<asset root>/<morph path>`). Existing morphs are read from the packed
//! container next to it (`<store dir>.morphs.mr`); remapped records are
//! written as loose `.morph` files into the store directory and later merged
//! over the container.

use anyhow::{Context, Result};
use morph_common::{
    CONTAINER_EXT, MORPH_EXT, MorphPack, MorphRecord, read_morph_record, write_morph_record,
};
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Storage seam between the pipeline and the host asset layout
pub trait MorphStore {
    /// Load a named morph for the mesh owning `store_dir`
    ///
    /// Returns `Ok(None)` when the mesh does not carry that morph.
    fn load_morph_record(&self, store_dir: &Path, name: &str) -> Result<Option<MorphRecord>>;

    /// Write one intermediate record into `store_dir`
    fn save_morph_record(&self, store_dir: &Path, record: &MorphRecord) -> Result<PathBuf>;

    /// Pack every intermediate record in `store_dir` into `container`
    ///
    /// Returns the number of records packed.
    fn merge_records_into_container(&self, store_dir: &Path, container: &Path) -> Result<usize>;
}

/// Container path belonging to a store directory (`<store dir>.morphs.mr`)
pub fn container_path(store_dir: &Path) -> PathBuf {
    let mut path = store_dir.as_os_str().to_owned();
    path.push(".");
    path.push(CONTAINER_EXT);
    PathBuf::from(path)
}

/// Path of an intermediate record inside a store directory
pub fn record_path(store_dir: &Path, name: &str) -> PathBuf {
    store_dir.join(format!("{}.{}", name, MORPH_EXT))
}

/// Read and decode a container file
pub fn read_container(path: &Path) -> Result<MorphPack> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read morph container: {}", path.display()))?;
    MorphPack::from_bytes(&bytes)
        .with_context(|| format!("Failed to decode morph container: {}", path.display()))
}

/// Filesystem-backed store
///
/// Keeps the most recently read container decoded so a mesh's morphs are
/// not re-read once per name. Merging into a container drops the cache.
#[derive(Debug, Default)]
pub struct DirectoryMorphStore {
    cached: RefCell<Option<CachedContainer>>,
}

#[derive(Debug)]
struct CachedContainer {
    path: PathBuf,
    pack: Option<MorphPack>,
}

impl DirectoryMorphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_container<T>(
        &self,
        path: &Path,
        f: impl FnOnce(Option<&MorphPack>) -> T,
    ) -> Result<T> {
        let mut cached = self.cached.borrow_mut();
        let stale = cached.as_ref().is_none_or(|c| c.path != path);
        if stale {
            let pack = if path.is_file() {
                Some(read_container(path)?)
            } else {
                None
            };
            *cached = Some(CachedContainer {
                path: path.to_path_buf(),
                pack,
            });
        }
        Ok(f(cached.as_ref().and_then(|c| c.pack.as_ref())))
    }

    fn invalidate(&self) {
        self.cached.borrow_mut().take();
    }
}

impl MorphStore for DirectoryMorphStore {
    fn load_morph_record(&self, store_dir: &Path, name: &str) -> Result<Option<MorphRecord>> {
        let container = container_path(store_dir);
        self.with_container(&container, |pack| pack.and_then(|p| p.find(name)).cloned())
    }

    fn save_morph_record(&self, store_dir: &Path, record: &MorphRecord) -> Result<PathBuf> {
        fs::create_dir_all(store_dir)
            .with_context(|| format!("Failed to create morph directory: {}", store_dir.display()))?;

        let path = record_path(store_dir, &record.name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        write_morph_record(&mut writer, record)
            .with_context(|| format!("Failed to write morph record: {}", path.display()))?;
        writer.flush()?;

        tracing::debug!(
            "Wrote morph '{}' ({} vertices) -> {}",
            record.name,
            record.vertex_count(),
            path.display()
        );
        Ok(path)
    }

    fn merge_records_into_container(&self, store_dir: &Path, container: &Path) -> Result<usize> {
        use rayon::prelude::*;

        let mut paths: Vec<PathBuf> = fs::read_dir(store_dir)
            .with_context(|| format!("Failed to list morph directory: {}", store_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == MORPH_EXT))
            .collect();
        paths.sort();

        // Decode in parallel; collect keeps the sorted order
        let records: Result<Vec<MorphRecord>> = paths
            .par_iter()
            .map(|path| {
                let bytes = fs::read(path)
                    .with_context(|| format!("Failed to read morph record: {}", path.display()))?;
                read_morph_record(&bytes)
                    .with_context(|| format!("Failed to decode morph record: {}", path.display()))
            })
            .collect();
        let pack = MorphPack::from_records(records?);

        // Write next to the container and swap in, so a failed write never
        // leaves a half-written container behind
        let staging = container.with_extension("tmp");
        fs::write(&staging, pack.to_bytes())
            .with_context(|| format!("Failed to write morph container: {}", staging.display()))?;
        fs::rename(&staging, container).with_context(|| {
            format!("Failed to replace morph container: {}", container.display())
        })?;
        self.invalidate();

        tracing::info!(
            "Packed {} morph records -> {}",
            pack.len(),
            container.display()
        );
        Ok(pack.len())
    }
}

/// Remove a directory tree, treating "already gone" as success
pub fn remove_dir_if_exists(dir: &Path) -> Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to delete directory: {}", dir.display())),
    }
}
