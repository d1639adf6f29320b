use super::*;
use crate::manifest::{BASE_MORPH, MorphManifest};
use crate::progress::NoProgress;
use crate::store::{DirectoryMorphStore, read_container};
use tempfile::{TempDir, tempdir};

const SOURCE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
const TARGET: [[f32; 3]; 4] = [
    [2.0, 0.0, 0.0],
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [2.1, 0.0, 0.0],
];

struct Fixture {
    dir: TempDir,
    pipeline: MorphAssetPipeline<DirectoryMorphStore, MorphManifest>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::new(
            "MCSFemale",
            dir.path().join("ConversionMaps"),
            dir.path().join("StreamingAssets"),
        );
        let manifest = MorphManifest::new().with_family("MCSFemale", ["smile", "blink"]);
        let pipeline = MorphAssetPipeline::new(config, DirectoryMorphStore::new(), manifest);
        Self { dir, pipeline }
    }

    fn store_dir(&self, morph_path: &str) -> PathBuf {
        self.pipeline.config().asset_root.join(morph_path)
    }

    /// Pack records into a mesh's container, as a previous export would have
    fn seed_container(&self, morph_path: &str, records: &[MorphRecord]) {
        let store_dir = self.store_dir(morph_path);
        let store = DirectoryMorphStore::new();
        for record in records {
            store.save_morph_record(&store_dir, record).unwrap();
        }
        store
            .merge_records_into_container(&store_dir, &container_path(&store_dir))
            .unwrap();
        remove_dir_if_exists(&store_dir).unwrap();
    }

    fn write_map(&self, mesh: &str, vertices: &[[f32; 3]]) {
        fs::create_dir_all(&self.pipeline.config().map_dir).unwrap();
        let json = VertexMap::new(vertices.to_vec()).to_json().unwrap();
        fs::write(self.pipeline.config().map_path(mesh), json).unwrap();
    }
}

fn positions(name: &str, deltas: &[[f32; 3]]) -> MorphRecord {
    MorphRecord {
        delta_positions: Some(deltas.to_vec()),
        ..MorphRecord::named(name)
    }
}

fn torso() -> SceneMesh {
    SceneMesh::new("Torso", TARGET.to_vec()).with_morph_path("MCS/Female/Torso")
}

#[test]
fn test_extract_never_overwrites() {
    let fx = Fixture::new();
    let list = MeshList::from_meshes([torso()]);

    let report = fx.pipeline.extract(&list).unwrap();
    assert_eq!(report.extracted, vec!["Torso"]);
    let map_path = fx.pipeline.config().map_path("Torso");
    let first = fs::read_to_string(&map_path).unwrap();
    assert_eq!(VertexMap::from_json(&first).unwrap().vertices, TARGET.to_vec());

    // Mesh changed since; the baseline must stay as first captured
    let changed = MeshList::from_meshes([SceneMesh::new("Torso", vec![[9.0; 3]])]);
    let report = fx.pipeline.extract(&changed).unwrap();
    assert!(report.extracted.is_empty());
    assert_eq!(report.already_extracted, vec!["Torso"]);
    assert_eq!(fs::read_to_string(&map_path).unwrap(), first);
}

#[test]
fn test_extract_only_selected() {
    let fx = Fixture::new();
    let mut list = MeshList::from_meshes([torso(), SceneMesh::new("Hair", SOURCE.to_vec())]);
    list.set_selected("Hair", false);

    fx.pipeline.extract(&list).unwrap();
    assert!(fx.pipeline.config().map_path("Torso").is_file());
    assert!(!fx.pipeline.config().map_path("Hair").exists());
}

#[test]
fn test_convert_remaps_and_packs() {
    let fx = Fixture::new();
    fx.write_map("Torso", &SOURCE);
    fx.seed_container(
        "MCS/Female/Torso",
        &[
            positions("smile", &[[10.0, 0.0, 0.0], [11.0, 0.0, 0.0], [12.0, 0.0, 0.0]]),
            positions(BASE_MORPH, &[[0.0, 1.0, 0.0], [0.0, 2.0, 0.0], [0.0, 3.0, 0.0]]),
        ],
    );

    let report = fx
        .pipeline
        .convert(&MeshList::from_meshes([torso()]), &mut NoProgress);
    assert!(report.is_success());

    let container = container_path(&fx.store_dir("MCS/Female/Torso"));
    assert_eq!(
        report.outcome("Torso"),
        Some(&MeshStatus::Converted {
            remapped: 2,
            missing_morphs: vec!["blink".to_string()],
            container: container.clone(),
        })
    );

    let pack = read_container(&container).unwrap();
    let names: Vec<&str> = pack.records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec![CONVERSION_MARKER, BASE_MORPH, "smile"]);
    assert_eq!(
        pack.find("smile").unwrap().delta_positions.as_deref().unwrap(),
        &[[12.0, 0.0, 0.0], [10.0, 0.0, 0.0], [11.0, 0.0, 0.0], [12.0, 0.0, 0.0]]
    );
    assert_eq!(pack.find(BASE_MORPH).unwrap().vertex_count(), TARGET.len());

    // Working directory is gone
    assert!(!fx.store_dir("MCS/Female/Torso").exists());
}

#[test]
fn test_second_convert_is_skipped() {
    let fx = Fixture::new();
    fx.write_map("Torso", &SOURCE);
    fx.seed_container("MCS/Female/Torso", &[positions(BASE_MORPH, &[[1.0; 3]; 3])]);
    let list = MeshList::from_meshes([torso()]);

    fx.pipeline.convert(&list, &mut NoProgress);
    let container = container_path(&fx.store_dir("MCS/Female/Torso"));
    let before = fs::read(&container).unwrap();

    let report = fx.pipeline.convert(&list, &mut NoProgress);
    assert_eq!(
        report.outcome("Torso"),
        Some(&MeshStatus::Skipped(SkipReason::AlreadyConverted))
    );
    assert_eq!(fs::read(&container).unwrap(), before);
}

#[test]
fn test_gates_skip_without_map_or_morph_path() {
    let fx = Fixture::new();
    let hair = SceneMesh::new("Hair", SOURCE.to_vec());
    fx.write_map("Hair", &SOURCE);

    let report = fx
        .pipeline
        .convert(&MeshList::from_meshes([torso(), hair]), &mut NoProgress);

    assert_eq!(
        report.outcome("Torso"),
        Some(&MeshStatus::Skipped(SkipReason::MissingVertexMap(
            fx.pipeline.config().map_path("Torso")
        )))
    );
    assert_eq!(
        report.outcome("Hair"),
        Some(&MeshStatus::Skipped(SkipReason::MissingMorphPath))
    );
    assert!(report.is_success());
}

#[test]
fn test_morph_path_outside_asset_root_is_skipped() {
    let fx = Fixture::new();
    fx.write_map("Torso", &SOURCE);
    fx.seed_container("MCS/Female/Hair", &[positions(BASE_MORPH, &[[1.0; 3]; 3])]);
    let hair_container = container_path(&fx.store_dir("MCS/Female/Hair"));
    let before = fs::read(&hair_container).unwrap();

    for morph_path in ["", ".", "..", "MCS/../..", "../StreamingAssets"] {
        let mesh = SceneMesh::new("Torso", TARGET.to_vec()).with_morph_path(morph_path);
        let report = fx
            .pipeline
            .convert(&MeshList::from_meshes([mesh]), &mut NoProgress);
        assert_eq!(
            report.outcome("Torso"),
            Some(&MeshStatus::Skipped(SkipReason::InvalidMorphPath(
                PathBuf::from(morph_path)
            ))),
            "{:?}",
            morph_path
        );
    }

    // Other meshes' stores under the asset root are untouched
    assert_eq!(fs::read(&hair_container).unwrap(), before);
    assert!(fx.dir.path().join("ConversionMaps/Torso.json").is_file());
}

#[test]
fn test_store_dir_stays_inside_asset_root() {
    let fx = Fixture::new();
    let config = fx.pipeline.config();
    let mesh = |path: &str| SceneMesh::new("Torso", TARGET.to_vec()).with_morph_path(path);

    assert_eq!(
        config.store_dir(&mesh("MCS/Female/Torso")),
        Some(config.asset_root.join("MCS/Female/Torso"))
    );
    assert_eq!(config.store_dir(&mesh("")), None);
    assert_eq!(config.store_dir(&mesh("..")), None);
    assert_eq!(config.store_dir(&mesh("/tmp/Torso")), None);

    assert!(config.remove_store_dir(&config.asset_root).is_err());
    assert!(config.remove_store_dir(fx.dir.path()).is_err());
    assert!(!config.remove_store_dir(&config.asset_root.join("x")).unwrap());
}

#[test]
fn test_failed_mesh_does_not_stop_batch() {
    let fx = Fixture::new();
    let eyes = SceneMesh::new("Eyes", SOURCE.to_vec()).with_morph_path("MCS/Female/Eyes");
    fx.write_map("Torso", &SOURCE);
    fx.write_map("Eyes", &SOURCE);

    // Torso's smile has fewer deltas than its vertex map has vertices
    fx.seed_container("MCS/Female/Torso", &[positions("smile", &[[1.0; 3]; 2])]);
    fx.seed_container("MCS/Female/Eyes", &[positions(BASE_MORPH, &[[1.0; 3]; 3])]);
    let torso_container = container_path(&fx.store_dir("MCS/Female/Torso"));
    let before = fs::read(&torso_container).unwrap();

    let report = fx
        .pipeline
        .convert(&MeshList::from_meshes([torso(), eyes]), &mut NoProgress);

    match report.outcome("Torso") {
        Some(MeshStatus::Failed(message)) => assert!(message.contains("smile"), "{}", message),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(matches!(
        report.outcome("Eyes"),
        Some(MeshStatus::Converted { remapped: 1, .. })
    ));
    assert!(!report.is_success());

    // Old container untouched and no intermediates left behind
    assert_eq!(fs::read(&torso_container).unwrap(), before);
    assert!(!fx.store_dir("MCS/Female/Torso").exists());
}

#[test]
fn test_cancel_skips_remaining_meshes() {
    let fx = Fixture::new();
    fx.write_map("Torso", &SOURCE);
    fx.pipeline.cancel_flag().store(true, Ordering::Relaxed);

    let report = fx
        .pipeline
        .convert(&MeshList::from_meshes([torso()]), &mut NoProgress);
    assert_eq!(
        report.outcome("Torso"),
        Some(&MeshStatus::Skipped(SkipReason::Cancelled))
    );
}

#[test]
fn test_stale_working_directory_is_cleared() {
    let fx = Fixture::new();
    fx.write_map("Torso", &SOURCE);
    fx.seed_container("MCS/Female/Torso", &[positions(BASE_MORPH, &[[1.0; 3]; 3])]);

    // Leftover from an interrupted run
    let store_dir = fx.store_dir("MCS/Female/Torso");
    DirectoryMorphStore::new()
        .save_morph_record(&store_dir, &positions("stale", &[[5.0; 3]; 3]))
        .unwrap();

    fx.pipeline
        .convert(&MeshList::from_meshes([torso()]), &mut NoProgress);
    let pack = read_container(&container_path(&store_dir)).unwrap();
    assert!(!pack.contains("stale"));
    assert!(pack.contains(CONVERSION_MARKER));
}

#[derive(Default)]
struct Recorder(Vec<(String, f32)>);

impl ConversionProgress for Recorder {
    fn report(&mut self, _mesh: &str, stage: Stage<'_>, fraction: f32) {
        self.0.push((stage.to_string(), fraction));
    }
}

#[test]
fn test_progress_checkpoints() {
    let fx = Fixture::new();
    fx.write_map("Torso", &SOURCE);
    fx.seed_container("MCS/Female/Torso", &[positions(BASE_MORPH, &[[1.0; 3]; 3])]);

    let mut recorder = Recorder::default();
    fx.pipeline
        .convert(&MeshList::from_meshes([torso()]), &mut recorder);

    let stages: Vec<&str> = recorder.0.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(
        stages,
        vec![
            "Loading vertex map",
            "Generating retarget map",
            "Remapping smile",
            "Remapping blink",
            "Remapping base",
            "Rebuilding container",
            "Deleting temporary files",
        ]
    );
    assert!(recorder.0.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(fx.dir.path().exists());
}
