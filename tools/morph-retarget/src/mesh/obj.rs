//! OBJ vertex positions

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read `v` positions from an OBJ file in declaration order
///
/// Faces are ignored: the vertex order of the file is the vertex order of
/// the mesh.
pub fn read_obj_positions(input: &Path) -> Result<Vec<[f32; 3]>> {
    let file = File::open(input).with_context(|| format!("Failed to open OBJ: {:?}", input))?;
    let reader = BufReader::new(file);

    let mut positions: Vec<[f32; 3]> = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if parts.next() != Some("v") {
            continue;
        }

        let mut coords = [0.0f32; 3];
        for coord in &mut coords {
            let token = parts.next().with_context(|| {
                format!("{:?}:{}: vertex needs 3 coordinates", input, line_number + 1)
            })?;
            *coord = token.parse().with_context(|| {
                format!("{:?}:{}: invalid coordinate {:?}", input, line_number + 1, token)
            })?;
        }
        positions.push(coords);
    }

    if positions.is_empty() {
        bail!("No vertices found in OBJ file");
    }

    Ok(positions)
}
