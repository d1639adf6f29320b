//! Reorders per-vertex morph deltas through a vertex correspondence

use morph_common::MorphRecord;

use crate::correspondence::CorrespondenceMap;
use crate::error::RemapError;

/// Remap one morph record onto the target vertex order
///
/// Every present delta array is rebuilt with `target_vertex_count` entries,
/// `new[t] = old[map[t]]`. Absent arrays stay absent. Name, frame/shape
/// index and JCT payload are copied unchanged.
///
/// `mesh` only labels errors.
pub fn remap_morph_record(
    map: &CorrespondenceMap,
    old: &MorphRecord,
    target_vertex_count: usize,
    mesh: &str,
) -> Result<MorphRecord, RemapError> {
    let remap = |deltas: &Option<Vec<[f32; 3]>>, attribute: &'static str| {
        deltas
            .as_deref()
            .map(|d| {
                remap_deltas(
                    map,
                    d,
                    target_vertex_count,
                    &Labels {
                        mesh,
                        morph: &old.name,
                        attribute,
                    },
                )
            })
            .transpose()
    };

    Ok(MorphRecord {
        name: old.name.clone(),
        frame_index: old.frame_index,
        shape_index: old.shape_index,
        delta_positions: remap(&old.delta_positions, "position")?,
        delta_normals: remap(&old.delta_normals, "normal")?,
        delta_tangents: remap(&old.delta_tangents, "tangent")?,
        jct_data: old.jct_data.clone(),
    })
}

struct Labels<'a> {
    mesh: &'a str,
    morph: &'a str,
    attribute: &'static str,
}

fn remap_deltas(
    map: &CorrespondenceMap,
    old: &[[f32; 3]],
    target_vertex_count: usize,
    labels: &Labels<'_>,
) -> Result<Vec<[f32; 3]>, RemapError> {
    let mut remapped = vec![[0.0f32; 3]; target_vertex_count];

    for (target, source) in map.iter() {
        if target >= remapped.len() {
            return Err(RemapError::TargetOutOfRange {
                mesh: labels.mesh.to_string(),
                morph: labels.morph.to_string(),
                attribute: labels.attribute,
                target,
                source_index: source,
                len: remapped.len(),
            });
        }
        let Some(&delta) = old.get(source) else {
            return Err(RemapError::SourceOutOfRange {
                mesh: labels.mesh.to_string(),
                morph: labels.morph.to_string(),
                attribute: labels.attribute,
                target,
                source_index: source,
                len: old.len(),
            });
        };
        remapped[target] = delta;
    }

    Ok(remapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MorphRecord {
        MorphRecord {
            name: "FBMHeavy".to_string(),
            frame_index: 0,
            shape_index: 3,
            delta_positions: Some(vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]),
            delta_normals: None,
            delta_tangents: Some(vec![[0.0, 0.0, 0.5], [0.0, 0.0, 1.5], [0.0, 0.0, 2.5]]),
            jct_data: Some(b"jct".to_vec()),
        }
    }

    #[test]
    fn test_remap_reorders_present_arrays() {
        let map = CorrespondenceMap::from_indices(vec![2, 0, 0, 1]);
        let remapped = remap_morph_record(&map, &record(), 4, "Torso").unwrap();

        assert_eq!(
            remapped.delta_positions.unwrap(),
            vec![[2.0, 2.0, 2.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]
        );
        assert!(remapped.delta_normals.is_none());
        assert_eq!(remapped.delta_tangents.unwrap()[3], [0.0, 0.0, 1.5]);
    }

    #[test]
    fn test_remap_preserves_identity_fields() {
        let old = record();
        let map = CorrespondenceMap::from_indices(vec![1, 1]);
        let remapped = remap_morph_record(&map, &old, 2, "Torso").unwrap();

        assert_eq!(remapped.name, old.name);
        assert_eq!(remapped.jct_data, old.jct_data);
        assert_eq!(remapped.shape_index, old.shape_index);
        assert_eq!(remapped.frame_index, old.frame_index);
        assert_eq!(remapped.vertex_count(), 2);
        assert!(remapped.is_consistent());
    }

    #[test]
    fn test_unmapped_targets_are_zero() {
        // Map shorter than the target count leaves the tail at zero deltas
        let map = CorrespondenceMap::from_indices(vec![2]);
        let remapped = remap_morph_record(&map, &record(), 3, "Torso").unwrap();
        assert_eq!(
            remapped.delta_positions.unwrap(),
            vec![[2.0, 2.0, 2.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn test_source_out_of_range_is_fatal() {
        let map = CorrespondenceMap::from_indices(vec![0, 7]);
        let err = remap_morph_record(&map, &record(), 2, "Torso").unwrap_err();

        assert_eq!(
            err,
            RemapError::SourceOutOfRange {
                mesh: "Torso".to_string(),
                morph: "FBMHeavy".to_string(),
                attribute: "position",
                target: 1,
                source_index: 7,
                len: 3,
            }
        );
        let message = err.to_string();
        assert!(message.contains("Torso"));
        assert!(message.contains("1 => 7 | 3"));
    }

    #[test]
    fn test_target_out_of_range_is_fatal() {
        let map = CorrespondenceMap::from_indices(vec![0, 1, 2]);
        let err = remap_morph_record(&map, &record(), 2, "Hair").unwrap_err();
        assert!(matches!(
            err,
            RemapError::TargetOutOfRange {
                target: 2,
                source_index: 2,
                len: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_record_without_deltas_passes_through() {
        let marker = MorphRecord::named("marker");
        let map = CorrespondenceMap::from_indices(vec![99, 100]);
        let remapped = remap_morph_record(&map, &marker, 2, "Torso").unwrap();
        assert_eq!(remapped, marker);
    }
}
