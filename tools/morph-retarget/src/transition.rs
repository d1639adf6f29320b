//! Transition-morph export and import
//!
//! The record is a portable JSON copy of a transition-morph set, used to
//! carry transition morphs across a re-export. Importing overwrites the
//! in-memory set with the record as a whole.

use anyhow::{Context, Result};
use morph_common::TransitionMorphList;
use std::fs;
use std::path::Path;

/// Write `source` to the portable record at `record_path`
///
/// Returns `Ok(false)` (with a warning) when there is no transition set to
/// export.
pub fn export_transition_morphs(
    source: Option<&TransitionMorphList>,
    record_path: &Path,
) -> Result<bool> {
    let Some(source) = source else {
        tracing::warn!("No transition morph set to export");
        return Ok(false);
    };

    if let Some(parent) = record_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = source
        .to_json()
        .context("Failed to serialize transition morphs")?;
    fs::write(record_path, json)
        .with_context(|| format!("Failed to write transition record: {}", record_path.display()))?;

    tracing::info!(
        "Exported {} transition morphs -> {}",
        source.morphs.len(),
        record_path.display()
    );
    Ok(true)
}

/// Overwrite `target` with the record at `record_path`
///
/// Does nothing and returns `Ok(false)` (with a warning) if either the
/// target set or the record is missing.
pub fn import_transition_morphs(
    target: Option<&mut TransitionMorphList>,
    record_path: &Path,
) -> Result<bool> {
    let Some(target) = target else {
        tracing::warn!("No transition morph set to import into");
        return Ok(false);
    };
    let Some(record) = load_transition_morphs(record_path)? else {
        tracing::warn!(
            "Transition record not found: {}",
            record_path.display()
        );
        return Ok(false);
    };

    *target = record;
    tracing::info!(
        "Imported {} transition morphs from {}",
        target.morphs.len(),
        record_path.display()
    );
    Ok(true)
}

/// Read a transition-morph JSON file, `None` if it does not exist
pub fn load_transition_morphs(path: &Path) -> Result<Option<TransitionMorphList>> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read transition morphs: {}", path.display()));
        }
    };
    TransitionMorphList::from_json(&json)
        .map(Some)
        .with_context(|| format!("Failed to parse transition morphs: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_common::TransitionMorph;
    use serde_json::json;
    use tempfile::tempdir;

    fn elbow() -> TransitionMorphList {
        let mut morph = TransitionMorph::new("elbow_bend");
        morph.settings.insert("bone".to_string(), json!("lForearmBend"));
        morph.settings.insert("weights".to_string(), json!([0.0, 0.5, 1.0]));
        TransitionMorphList::new(vec![morph])
    }

    #[test]
    fn test_export_then_import_overwrites() {
        let dir = tempdir().unwrap();
        let record = dir.path().join("records").join("jctmorphs.json");

        assert!(export_transition_morphs(Some(&elbow()), &record).unwrap());

        let mut target = TransitionMorphList::new(vec![TransitionMorph::new("stale")]);
        assert!(import_transition_morphs(Some(&mut target), &record).unwrap());
        assert_eq!(target, elbow());
        assert!(target.find("stale").is_none());
    }

    #[test]
    fn test_export_without_source_is_noop() {
        let dir = tempdir().unwrap();
        let record = dir.path().join("jctmorphs.json");
        assert!(!export_transition_morphs(None, &record).unwrap());
        assert!(!record.exists());
    }

    #[test]
    fn test_import_missing_record_keeps_target() {
        let dir = tempdir().unwrap();
        let mut target = elbow();
        let imported =
            import_transition_morphs(Some(&mut target), &dir.path().join("missing.json")).unwrap();
        assert!(!imported);
        assert_eq!(target, elbow());
    }

    #[test]
    fn test_import_without_target_is_noop() {
        let dir = tempdir().unwrap();
        let record = dir.path().join("jctmorphs.json");
        export_transition_morphs(Some(&elbow()), &record).unwrap();
        assert!(!import_transition_morphs(None, &record).unwrap());
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let dir = tempdir().unwrap();
        let record = dir.path().join("jctmorphs.json");
        fs::write(&record, "{not json").unwrap();

        let mut target = elbow();
        assert!(import_transition_morphs(Some(&mut target), &record).is_err());
        assert_eq!(target, elbow());
    }
}
