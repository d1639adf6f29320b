//! Progress reporting for long conversions
//!
//! The pipeline reports at fixed checkpoints; how (or whether) progress is
//! displayed is up to the implementation.

use std::fmt;

/// Conversion checkpoint for one mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage<'a> {
    LoadingVertexMap,
    GeneratingRetargetMap,
    /// Remapping one morph
    Morph(&'a str),
    RebuildingContainer,
    DeletingTemporaryFiles,
}

impl fmt::Display for Stage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::LoadingVertexMap => f.write_str("Loading vertex map"),
            Stage::GeneratingRetargetMap => f.write_str("Generating retarget map"),
            Stage::Morph(name) => write!(f, "Remapping {}", name),
            Stage::RebuildingContainer => f.write_str("Rebuilding container"),
            Stage::DeletingTemporaryFiles => f.write_str("Deleting temporary files"),
        }
    }
}

/// Receives progress updates from the pipeline
pub trait ConversionProgress {
    /// `fraction` is the progress within the current mesh, `0.0..=1.0`
    fn report(&mut self, mesh: &str, stage: Stage<'_>, fraction: f32);

    /// Called once after the last mesh
    fn finish(&mut self) {}
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ConversionProgress for NoProgress {
    fn report(&mut self, _mesh: &str, _stage: Stage<'_>, _fraction: f32) {}
}

/// Logs progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ConversionProgress for LogProgress {
    fn report(&mut self, mesh: &str, stage: Stage<'_>, fraction: f32) {
        match stage {
            Stage::Morph(_) => tracing::debug!("[{} {:>3.0}%] {}", mesh, fraction * 100.0, stage),
            _ => tracing::info!("[{} {:>3.0}%] {}", mesh, fraction * 100.0, stage),
        }
    }
}
