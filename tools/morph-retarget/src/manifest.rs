//! Morph manifests
//!
//! A manifest lists, per mesh family, the morph names that family is
//! expected to carry. The `base` morph is never listed but downstream
//! loaders expect it, so it is always appended.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use serde::Deserialize;
use std::path::Path;

/// Morph every mesh is expected to carry even though no manifest lists it
pub const BASE_MORPH: &str = "base";

/// Lookup of morph names by mesh family
pub trait ManifestSource {
    /// Ordered morph names for a family, `None` if the family is unknown
    fn manifest_for_family(&self, family: &str) -> Option<Vec<String>>;
}

/// Manifest backed by an in-memory table, usually read from TOML
///
/// ```toml
/// MCSFemale = ["FBMHeavy", "FBMThin", "PHMEyesClosed"]
/// MCSMale = ["FBMHeavy"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MorphManifest {
    families: HashMap<String, Vec<String>>,
}

impl MorphManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the morph list of a family
    pub fn with_family<I, S>(mut self, family: impl Into<String>, morphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.families
            .insert(family.into(), morphs.into_iter().map(Into::into).collect());
        self
    }

    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read morph manifest: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse morph manifest")
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }
}

impl ManifestSource for MorphManifest {
    fn manifest_for_family(&self, family: &str) -> Option<Vec<String>> {
        self.families.get(family).cloned()
    }
}

/// Morph names to process for a family: the manifest order plus `base`
///
/// An unknown family yields only `base`, with a warning.
pub fn morph_names<M: ManifestSource + ?Sized>(manifest: &M, family: &str) -> Vec<String> {
    let mut names = manifest.manifest_for_family(family).unwrap_or_else(|| {
        tracing::warn!(
            "No morph manifest for family '{}', only '{}' will be converted",
            family,
            BASE_MORPH
        );
        Vec::new()
    });
    if !names.iter().any(|n| n == BASE_MORPH) {
        names.push(BASE_MORPH.to_string());
    }
    names
}
