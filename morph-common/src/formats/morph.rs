//! Morph record binary format (.morph)
//!
//! One named blendshape frame with optional per-vertex deltas.
//! POD format - no magic bytes, the extension identifies the file.
//!
//! # Layout
//! ```text
//! 0x00: vertex_count u32
//! 0x04: attributes u8 (attribute flags, see ATTR_*)
//! 0x05: padding (3 bytes)
//! 0x08: frame_index i32
//! 0x0C: shape_index i32
//! 0x10: name_len u32, name (UTF-8)
//! var:  position deltas (vertex_count * 12 bytes), if ATTR_POSITIONS
//! var:  normal deltas (vertex_count * 12 bytes), if ATTR_NORMALS
//! var:  tangent deltas (vertex_count * 12 bytes), if ATTR_TANGENTS
//! var:  jct_len u32, jct data, if ATTR_JCT_DATA
//! ```

use anyhow::{Context, Result, bail};
use bitcode::{Decode, Encode};
use std::io::Write;

use super::serialization::BinarySerializable;

/// Record carries position deltas
pub const ATTR_POSITIONS: u8 = 0x01;
/// Record carries normal deltas
pub const ATTR_NORMALS: u8 = 0x02;
/// Record carries tangent deltas
pub const ATTR_TANGENTS: u8 = 0x04;
/// Record carries an opaque JCT payload
pub const ATTR_JCT_DATA: u8 = 0x08;

/// A named per-vertex deformation authored against one mesh topology.
///
/// Each delta array is independently optional. When present, an array holds
/// exactly one entry per vertex of the mesh the record was authored against.
/// `jct_data` is opaque and never index-remapped.
#[derive(Debug, Clone, PartialEq, Default, Encode, Decode)]
pub struct MorphRecord {
    /// Morph name (e.g. "base", "FBMHeavy")
    pub name: String,

    /// Blendshape frame index within its shape
    pub frame_index: i32,

    /// Blendshape shape index on the mesh
    pub shape_index: i32,

    /// Position deltas, one per vertex
    pub delta_positions: Option<Vec<[f32; 3]>>,

    /// Normal deltas, one per vertex
    pub delta_normals: Option<Vec<[f32; 3]>>,

    /// Tangent deltas, one per vertex
    pub delta_tangents: Option<Vec<[f32; 3]>>,

    /// Opaque joint-corrective payload, preserved verbatim
    pub jct_data: Option<Vec<u8>>,
}

impl MorphRecord {
    /// Create a record with no delta arrays (used for markers)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attribute flags describing which arrays are present
    pub fn attributes(&self) -> u8 {
        let mut attributes = 0u8;
        if self.delta_positions.is_some() {
            attributes |= ATTR_POSITIONS;
        }
        if self.delta_normals.is_some() {
            attributes |= ATTR_NORMALS;
        }
        if self.delta_tangents.is_some() {
            attributes |= ATTR_TANGENTS;
        }
        if self.jct_data.is_some() {
            attributes |= ATTR_JCT_DATA;
        }
        attributes
    }

    /// Present delta arrays, in file order
    pub fn delta_arrays(&self) -> impl Iterator<Item = &[[f32; 3]]> {
        [
            self.delta_positions.as_deref(),
            self.delta_normals.as_deref(),
            self.delta_tangents.as_deref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Vertex count of the first present delta array (0 if none)
    pub fn vertex_count(&self) -> usize {
        self.delta_arrays().next().map_or(0, <[_]>::len)
    }

    /// Check that every present delta array has the same length
    pub fn is_consistent(&self) -> bool {
        let count = self.vertex_count();
        self.delta_arrays().all(|a| a.len() == count)
    }
}

/// Morph record header (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct MorphFileHeader {
    pub vertex_count: u32,
    pub attributes: u8,
    pub _padding: [u8; 3],
    pub frame_index: i32,
    pub shape_index: i32,
}

impl MorphFileHeader {
    pub const SIZE: usize = 16;

    pub fn new(vertex_count: u32, attributes: u8, frame_index: i32, shape_index: i32) -> Self {
        Self {
            vertex_count,
            attributes,
            _padding: [0; 3],
            frame_index,
            shape_index,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[4] = self.attributes;
        // padding bytes stay 0
        bytes[8..12].copy_from_slice(&self.frame_index.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.shape_index.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            vertex_count: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            attributes: bytes[4],
            _padding: [0; 3],
            frame_index: i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            shape_index: i32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }

    pub fn has(&self, attribute: u8) -> bool {
        self.attributes & attribute != 0
    }
}

/// Write a complete morph record
pub fn write_morph_record<W: Write>(w: &mut W, record: &MorphRecord) -> Result<()> {
    if !record.is_consistent() {
        bail!(
            "Morph '{}' has delta arrays of different lengths \
             (positions: {:?}, normals: {:?}, tangents: {:?})",
            record.name,
            record.delta_positions.as_ref().map(Vec::len),
            record.delta_normals.as_ref().map(Vec::len),
            record.delta_tangents.as_ref().map(Vec::len),
        );
    }

    let vertex_count = u32::try_from(record.vertex_count())
        .with_context(|| format!("Morph '{}' has too many vertices", record.name))?;
    let header = MorphFileHeader::new(
        vertex_count,
        record.attributes(),
        record.frame_index,
        record.shape_index,
    );
    w.write_all(&header.serialize())?;

    let name = record.name.as_bytes();
    w.write_all(&(name.len() as u32).to_le_bytes())?;
    w.write_all(name)?;

    for array in record.delta_arrays() {
        for v in array {
            for f in v {
                w.write_all(&f.to_le_bytes())?;
            }
        }
    }

    if let Some(jct) = &record.jct_data {
        w.write_all(&(jct.len() as u32).to_le_bytes())?;
        w.write_all(jct)?;
    }

    Ok(())
}

/// Read a complete morph record
pub fn read_morph_record(bytes: &[u8]) -> Result<MorphRecord> {
    let header = MorphFileHeader::deserialize(bytes).context("Morph record too small for header")?;
    let mut reader = ByteReader::new(&bytes[<MorphFileHeader as BinarySerializable>::SIZE..]);

    let name_len = reader.read_u32().context("Missing morph name length")? as usize;
    let name = std::str::from_utf8(reader.take(name_len).context("Truncated morph name")?)
        .context("Morph name is not valid UTF-8")?
        .to_string();

    let count = header.vertex_count as usize;
    let mut read_deltas = |attribute: u8, label: &str| -> Result<Option<Vec<[f32; 3]>>> {
        if !header.has(attribute) {
            return Ok(None);
        }
        let deltas = reader
            .read_vec3s(count)
            .with_context(|| format!("Truncated {} deltas in morph '{}'", label, name))?;
        Ok(Some(deltas))
    };
    let delta_positions = read_deltas(ATTR_POSITIONS, "position")?;
    let delta_normals = read_deltas(ATTR_NORMALS, "normal")?;
    let delta_tangents = read_deltas(ATTR_TANGENTS, "tangent")?;

    let jct_data = if header.has(ATTR_JCT_DATA) {
        let len = reader.read_u32().context("Missing JCT length")? as usize;
        Some(reader.take(len).context("Truncated JCT data")?.to_vec())
    } else {
        None
    };

    if !reader.is_empty() {
        bail!(
            "Morph '{}' has {} trailing bytes",
            name,
            reader.remaining()
        );
    }

    Ok(MorphRecord {
        name,
        frame_index: header.frame_index,
        shape_index: header.shape_index,
        delta_positions,
        delta_normals,
        delta_tangents,
        jct_data,
    })
}

/// Little-endian cursor over a byte slice
struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.bytes.len() < n {
            return None;
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Some(head)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_vec3s(&mut self, count: usize) -> Option<Vec<[f32; 3]>> {
        let data = self.take(count.checked_mul(12)?)?;
        Some(
            data.chunks_exact(12)
                .map(|c| {
                    [
                        f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                        f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                        f32::from_le_bytes([c[8], c[9], c[10], c[11]]),
                    ]
                })
                .collect(),
        )
    }

    fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MorphRecord {
        MorphRecord {
            name: "FBMHeavy".to_string(),
            frame_index: 0,
            shape_index: 7,
            delta_positions: Some(vec![[0.0, 0.1, 0.2], [1.0, -1.0, 0.5]]),
            delta_normals: None,
            delta_tangents: Some(vec![[0.25, 0.0, 0.0], [0.0, 0.0, -0.25]]),
            jct_data: Some(vec![1, 2, 3, 4, 5]),
        }
    }

    #[test]
    fn test_header_layout() {
        let header = MorphFileHeader::new(1200, ATTR_POSITIONS | ATTR_NORMALS, 2, -1);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], &1200u32.to_le_bytes());
        assert_eq!(bytes[4], 0x03);
        assert_eq!(&bytes[5..8], &[0, 0, 0]);

        let parsed = MorphFileHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.has(ATTR_NORMALS));
        assert!(!parsed.has(ATTR_TANGENTS));
    }

    #[test]
    fn test_record_survives_write_read() {
        let record = sample_record();
        let mut bytes = Vec::new();
        write_morph_record(&mut bytes, &record).unwrap();

        let header = MorphFileHeader::deserialize(&bytes).unwrap();
        assert_eq!(header.vertex_count, 2);
        assert_eq!(header.shape_index, 7);
        assert!(header.has(ATTR_TANGENTS));

        let decoded = read_morph_record(&bytes).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.attributes(), ATTR_POSITIONS | ATTR_TANGENTS | ATTR_JCT_DATA);
    }

    #[test]
    fn test_marker_record_is_header_and_name_only() {
        let marker = MorphRecord::named("marker");
        let mut bytes = Vec::new();
        write_morph_record(&mut bytes, &marker).unwrap();

        assert_eq!(bytes.len(), MorphFileHeader::SIZE + 4 + "marker".len());
        assert_eq!(
            &bytes[..MorphFileHeader::SIZE],
            MorphFileHeader::new(0, 0, 0, 0).serialize().as_slice()
        );
        let decoded = read_morph_record(&bytes).unwrap();
        assert_eq!(decoded.vertex_count(), 0);
        assert_eq!(decoded.attributes(), 0);
    }

    #[test]
    fn test_inconsistent_lengths_rejected() {
        let mut record = sample_record();
        record.delta_normals = Some(vec![[0.0; 3]; 5]);

        let mut bytes = Vec::new();
        let err = write_morph_record(&mut bytes, &record).unwrap_err();
        assert!(err.to_string().contains("different lengths"));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let mut bytes = Vec::new();
        write_morph_record(&mut bytes, &sample_record()).unwrap();

        assert!(read_morph_record(&bytes[..bytes.len() - 3]).is_err());
        assert!(read_morph_record(&bytes[..10]).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = Vec::new();
        write_morph_record(&mut bytes, &sample_record()).unwrap();
        bytes.push(0xFF);

        let err = read_morph_record(&bytes).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }
}
