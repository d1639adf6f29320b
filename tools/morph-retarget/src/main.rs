//! morph-retarget - morph retargeting tool
//!
//! Captures vertex maps of mesh exports and, after a re-export changed the
//! vertex order, remaps every morph of those meshes onto the new order.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use morph_retarget::config::RetargetJob;
use morph_retarget::transition::load_transition_morphs;
use morph_retarget::{
    DirectoryMorphStore, LogProgress, MeshList, MorphAssetPipeline, MorphManifest,
    export_transition_morphs, import_transition_morphs,
};

#[derive(Parser)]
#[command(name = "morph-retarget")]
#[command(about = "Morph retargeting tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture vertex maps for meshes that have none yet
    Extract {
        /// Path to retarget.toml job file
        #[arg(default_value = "retarget.toml")]
        job: PathBuf,

        /// Act on every mesh, ignoring `selected = false`
        #[arg(long)]
        all: bool,
    },

    /// Remap morphs of the selected meshes onto their current vertex order
    Convert {
        /// Path to retarget.toml job file
        #[arg(default_value = "retarget.toml")]
        job: PathBuf,

        /// Act on every mesh, ignoring `selected = false`
        #[arg(long)]
        all: bool,
    },

    /// Validate the job and report what convert would do
    Check {
        /// Path to retarget.toml job file
        #[arg(default_value = "retarget.toml")]
        job: PathBuf,
    },

    /// Write the transition-morph set to its portable record
    ExportTransitions {
        /// Path to retarget.toml job file
        #[arg(default_value = "retarget.toml")]
        job: PathBuf,
    },

    /// Overwrite the transition-morph set from its portable record
    ImportTransitions {
        /// Path to retarget.toml job file
        #[arg(default_value = "retarget.toml")]
        job: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { job, all } => {
            let (config, base_dir) = load_job(&job)?;
            let meshes = load_meshes(&config, &base_dir, all)?;
            let pipeline = build_pipeline(config, &base_dir);

            let report = pipeline.extract(&meshes)?;
            tracing::info!("{}", report);
        }

        Commands::Convert { job, all } => {
            let (config, base_dir) = load_job(&job)?;
            let meshes = load_meshes(&config, &base_dir, all)?;
            let pipeline = build_pipeline(config, &base_dir);

            let report = pipeline.convert(&meshes, &mut LogProgress);
            let failed = report.failed().count();
            if failed > 0 {
                bail!("{} of {} meshes failed to convert", failed, report.outcomes.len());
            }
        }

        Commands::Check { job } => {
            tracing::info!("Checking job {:?}", job);
            let (config, base_dir) = load_job(&job)?;
            let meshes = load_meshes(&config, &base_dir, false)?;
            let pipeline = build_pipeline(config, &base_dir);

            for mesh in meshes.selected() {
                match pipeline.check_gates(mesh)? {
                    Some(reason) => tracing::info!("  skip    {}: {}", mesh.name, reason),
                    None => {
                        tracing::info!("  convert {} ({} vertices)", mesh.name, mesh.vertex_count())
                    }
                }
            }
            tracing::info!("Job is valid!");
        }

        Commands::ExportTransitions { job } => {
            let (config, base_dir) = load_job(&job)?;
            let record = config.transition_record_path(&base_dir);
            let state = match config.transition_state_path(&base_dir) {
                Some(path) => load_transition_morphs(&path)?,
                None => None,
            };
            export_transition_morphs(state.as_ref(), &record)?;
        }

        Commands::ImportTransitions { job } => {
            let (config, base_dir) = load_job(&job)?;
            let record = config.transition_record_path(&base_dir);
            let state_path = config.transition_state_path(&base_dir);
            let mut state = match &state_path {
                Some(path) => load_transition_morphs(path)?,
                None => None,
            };

            if import_transition_morphs(state.as_mut(), &record)? {
                if let (Some(path), Some(state)) = (&state_path, &state) {
                    let json = state
                        .to_json()
                        .context("Failed to serialize transition morphs")?;
                    std::fs::write(path, json).with_context(|| {
                        format!("Failed to write transition morphs: {}", path.display())
                    })?;
                }
            }
        }
    }

    Ok(())
}

/// Load and validate a job; relative paths resolve against its directory
fn load_job(path: &Path) -> Result<(RetargetJob, PathBuf)> {
    let job = RetargetJob::load(path)?;
    job.validate()
        .with_context(|| format!("Invalid job file: {}", path.display()))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((job, base_dir))
}

fn load_meshes(job: &RetargetJob, base_dir: &Path, all: bool) -> Result<MeshList> {
    let mut meshes = job.load_meshes(base_dir)?;
    if all {
        meshes.select_all();
    }
    if meshes.selected().next().is_none() {
        tracing::warn!("No meshes selected");
    }
    Ok(meshes)
}

fn build_pipeline(
    job: RetargetJob,
    base_dir: &Path,
) -> MorphAssetPipeline<DirectoryMorphStore, MorphManifest> {
    let config = job.pipeline_config(base_dir);
    MorphAssetPipeline::new(config, DirectoryMorphStore::new(), job.morphs)
}
