//! Mesh identity and selection state

use std::path::PathBuf;

use crate::report::{ConversionReport, ExtractionReport};

/// A mesh as it exists now, in its current vertex order
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMesh {
    /// Mesh identity; also names its vertex map file
    pub name: String,

    /// Current (target) vertex positions
    pub vertices: Vec<[f32; 3]>,

    /// Morph store location relative to the asset root.
    /// `None` when the mesh has no morph metadata.
    pub morph_path: Option<PathBuf>,
}

impl SceneMesh {
    pub fn new(name: impl Into<String>, vertices: Vec<[f32; 3]>) -> Self {
        Self {
            name: name.into(),
            vertices,
            morph_path: None,
        }
    }

    pub fn with_morph_path(mut self, morph_path: impl Into<PathBuf>) -> Self {
        self.morph_path = Some(morph_path.into());
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// One mesh plus whether extract/convert should act on it
#[derive(Debug, Clone, PartialEq)]
pub struct MeshListItem {
    pub mesh: SceneMesh,
    pub selected: bool,
}

impl MeshListItem {
    pub fn new(mesh: SceneMesh, selected: bool) -> Self {
        Self { mesh, selected }
    }
}

/// Meshes for one batch, in scan order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshList {
    items: Vec<MeshListItem>,
}

impl MeshList {
    /// Build a list from freshly scanned meshes, all selected
    pub fn from_meshes(meshes: impl IntoIterator<Item = SceneMesh>) -> Self {
        Self {
            items: meshes
                .into_iter()
                .map(|m| MeshListItem::new(m, true))
                .collect(),
        }
    }

    pub fn from_items(items: Vec<MeshListItem>) -> Self {
        Self { items }
    }

    /// Replace the meshes with a new scan, keeping selection by name
    ///
    /// Meshes not seen before start selected; meshes that disappeared are
    /// dropped.
    pub fn rescan(&self, scanned: impl IntoIterator<Item = SceneMesh>) -> Self {
        let items = scanned
            .into_iter()
            .map(|mesh| {
                let selected = self
                    .items
                    .iter()
                    .find(|item| item.mesh.name == mesh.name)
                    .is_none_or(|item| item.selected);
                MeshListItem::new(mesh, selected)
            })
            .collect();
        Self { items }
    }

    pub fn items(&self) -> &[MeshListItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Selected meshes, in list order
    pub fn selected(&self) -> impl Iterator<Item = &SceneMesh> {
        self.items.iter().filter(|i| i.selected).map(|i| &i.mesh)
    }

    pub fn select_all(&mut self) {
        self.set_all(true);
    }

    pub fn deselect_all(&mut self) {
        self.set_all(false);
    }

    fn set_all(&mut self, selected: bool) {
        for item in &mut self.items {
            item.selected = selected;
        }
    }

    /// Set the selection of a mesh by name; returns false if not listed
    pub fn set_selected(&mut self, name: &str, selected: bool) -> bool {
        match self.items.iter_mut().find(|i| i.mesh.name == name) {
            Some(item) => {
                item.selected = selected;
                true
            }
            None => false,
        }
    }

    /// Deselect every named mesh (e.g. the ones a batch just processed)
    pub fn deselect<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.set_selected(name, false);
        }
    }

    /// Deselect the meshes an extraction wrote maps for
    pub fn apply_extraction(&mut self, report: &ExtractionReport) {
        self.deselect(report.extracted.iter().map(String::as_str));
    }

    /// Deselect the meshes a conversion batch converted
    ///
    /// Skipped and failed meshes keep their selection so a rerun retries them.
    pub fn apply_conversion(&mut self, report: &ConversionReport) {
        self.deselect(report.converted_names());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(name: &str) -> SceneMesh {
        SceneMesh::new(name, vec![[0.0; 3]])
    }

    #[test]
    fn test_rescan_keeps_selection_by_name() {
        let mut list = MeshList::from_meshes([mesh("Torso"), mesh("Hair"), mesh("Eyes")]);
        list.set_selected("Hair", false);

        let rescanned = list.rescan([mesh("Eyes"), mesh("Hair"), mesh("Shoes")]);
        let state: Vec<(&str, bool)> = rescanned
            .items()
            .iter()
            .map(|i| (i.mesh.name.as_str(), i.selected))
            .collect();
        assert_eq!(state, vec![("Eyes", true), ("Hair", false), ("Shoes", true)]);
    }

    #[test]
    fn test_selected_iterates_in_order() {
        let mut list = MeshList::from_meshes([mesh("A"), mesh("B"), mesh("C")]);
        list.deselect(["B"]);
        let names: Vec<&str> = list.selected().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn test_select_all_and_deselect_all() {
        let mut list = MeshList::from_meshes([mesh("A"), mesh("B")]);
        list.deselect_all();
        assert_eq!(list.selected().count(), 0);
        list.select_all();
        assert_eq!(list.selected().count(), 2);
        assert!(!list.set_selected("Missing", true));
    }

    #[test]
    fn test_apply_reports_deselects_processed_meshes() {
        let mut list = MeshList::from_meshes([mesh("A"), mesh("B"), mesh("C")]);

        list.apply_extraction(&ExtractionReport {
            extracted: vec!["A".to_string()],
            already_extracted: vec!["B".to_string()],
        });
        let names: Vec<&str> = list.selected().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);

        let mut report = ConversionReport::default();
        report.push("B", crate::report::MeshStatus::Failed("boom".to_string()));
        report.push(
            "C",
            crate::report::MeshStatus::Converted {
                remapped: 1,
                missing_morphs: Vec::new(),
                container: PathBuf::from("C.morphs.mr"),
            },
        );
        list.apply_conversion(&report);
        let names: Vec<&str> = list.selected().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["B"]);
    }
}
