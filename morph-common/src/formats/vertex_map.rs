//! Persisted vertex maps (`<mesh name>.json`)
//!
//! A vertex map is the retargeting baseline: the vertex positions of a mesh
//! captured before its topology changed. Vectors are written as
//! `{"x":..,"y":..,"z":..}` objects so maps captured by older tooling load
//! unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Captured vertex positions of one mesh, in vertex index order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VertexMap {
    #[serde(with = "xyz_list")]
    pub vertices: Vec<[f32; 3]>,
}

impl VertexMap {
    pub fn new(vertices: Vec<[f32; 3]>) -> Self {
        Self { vertices }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

mod xyz_list {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Xyz {
        x: f32,
        y: f32,
        z: f32,
    }

    pub fn serialize<S: Serializer>(vertices: &[[f32; 3]], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(vertices.iter().map(|&[x, y, z]| Xyz { x, y, z }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<[f32; 3]>, D::Error> {
        let list = Vec::<Xyz>::deserialize(d)?;
        Ok(list.into_iter().map(|v| [v.x, v.y, v.z]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let map = VertexMap::new(vec![[1.0, 2.5, -3.0]]);
        let json = map.to_json().unwrap();
        assert_eq!(json, r#"{"vertices":[{"x":1.0,"y":2.5,"z":-3.0}]}"#);
    }

    #[test]
    fn test_reads_existing_map() {
        let json = r#"{"vertices":[{"x":0.0,"y":1.0,"z":2.0},{"x":-0.125,"y":0.5,"z":1e-3}]}"#;
        let map = VertexMap::from_json(json).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.vertices[1], [-0.125, 0.5, 0.001]);
    }

    #[test]
    fn test_values_survive_text() {
        let vertices = vec![
            [0.1, 0.2, 0.3],
            [0.5, -1.0e-3, 123_456.79],
            [1.0 / 3.0, -2.0 / 7.0, 0.0],
        ];
        let map = VertexMap::new(vertices.clone());
        let decoded = VertexMap::from_json(&map.to_json().unwrap()).unwrap();
        assert_eq!(decoded.vertices, vertices);
    }

    #[test]
    fn test_missing_component_rejected() {
        let json = r#"{"vertices":[{"x":0.0,"y":1.0}]}"#;
        assert!(VertexMap::from_json(json).is_err());
    }
}
