//! Batch outcome reports

use std::fmt;
use std::path::PathBuf;

/// Why a mesh was not converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The morph store already carries the conversion marker
    AlreadyConverted,
    /// No vertex map was extracted for this mesh
    MissingVertexMap(PathBuf),
    /// The mesh has no morph store metadata
    MissingMorphPath,
    /// The morph path is empty, absolute or leaves the asset root
    InvalidMorphPath(PathBuf),
    /// The batch was cancelled before this mesh started
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyConverted => f.write_str("it has already been converted"),
            SkipReason::MissingVertexMap(path) => {
                write!(f, "vertex map not found ({})", path.display())
            }
            SkipReason::MissingMorphPath => f.write_str("it has no morph store path"),
            SkipReason::InvalidMorphPath(path) => write!(
                f,
                "morph path {:?} does not name a directory inside the asset root",
                path
            ),
            SkipReason::Cancelled => f.write_str("conversion was cancelled"),
        }
    }
}

/// What happened to one mesh
#[derive(Debug, Clone, PartialEq)]
pub enum MeshStatus {
    Converted {
        /// Morphs remapped and packed (excluding the marker)
        remapped: usize,
        /// Morph names the mesh does not carry
        missing_morphs: Vec<String>,
        /// Container written
        container: PathBuf,
    },
    Skipped(SkipReason),
    /// Aborted; holds the rendered error chain
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshOutcome {
    pub mesh: String,
    pub status: MeshStatus,
}

/// Outcome of one `convert` batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionReport {
    pub outcomes: Vec<MeshOutcome>,
}

impl ConversionReport {
    pub fn push(&mut self, mesh: impl Into<String>, status: MeshStatus) {
        self.outcomes.push(MeshOutcome {
            mesh: mesh.into(),
            status,
        });
    }

    pub fn outcome(&self, mesh: &str) -> Option<&MeshStatus> {
        self.outcomes
            .iter()
            .find(|o| o.mesh == mesh)
            .map(|o| &o.status)
    }

    pub fn converted(&self) -> impl Iterator<Item = &MeshOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, MeshStatus::Converted { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &MeshOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, MeshStatus::Skipped(_)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &MeshOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, MeshStatus::Failed(_)))
    }

    /// True when no mesh failed
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Names of meshes that were converted (to deselect for the session)
    pub fn converted_names(&self) -> impl Iterator<Item = &str> {
        self.converted().map(|o| o.mesh.as_str())
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conversion summary: {} converted, {} skipped, {} failed",
            self.converted().count(),
            self.skipped().count(),
            self.failed().count()
        )?;
        for outcome in &self.outcomes {
            match &outcome.status {
                MeshStatus::Converted {
                    remapped,
                    missing_morphs,
                    ..
                } => writeln!(
                    f,
                    "  converted {}: {} morphs ({} not present)",
                    outcome.mesh,
                    remapped,
                    missing_morphs.len()
                )?,
                MeshStatus::Skipped(reason) => {
                    writeln!(f, "  skipped   {}: {}", outcome.mesh, reason)?
                }
                MeshStatus::Failed(error) => {
                    writeln!(f, "  failed    {}: {}", outcome.mesh, error)?
                }
            }
        }
        Ok(())
    }
}

/// Outcome of one `extract` batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Meshes whose vertex map was written
    pub extracted: Vec<String>,
    /// Meshes that already had a vertex map
    pub already_extracted: Vec<String>,
}

impl fmt::Display for ExtractionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Extraction summary: {} extracted, {} already extracted",
            self.extracted.len(),
            self.already_extracted.len()
        )
    }
}
