//! Vertex correspondence between two exports of the same mesh
//!
//! Every target vertex is matched to the source vertex nearest to it by
//! Euclidean distance. This is a positional match, not a topological one: it
//! survives vertex reordering and duplication from re-triangulation but
//! assumes both exports share pose, scale and local frame.
//!
//! Ties (several source vertices at the same minimal distance) go to the
//! lowest source index, so the result depends only on the input positions.

use glam::Vec3;
use rayon::prelude::*;

use crate::error::RetargetError;

/// Upper bound on grid resolution along one axis
const MAX_CELLS_PER_AXIS: usize = 128;

/// Slack applied to the ring-distance bound to absorb cell rounding
const RING_BOUND_SLACK: f32 = 1.0 - 1e-4;

/// Mapping from target vertex index to source vertex index
///
/// The domain is exactly `0..len()`: every target vertex has one source
/// vertex. Several targets may share a source and some sources may be unused.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CorrespondenceMap {
    indices: Vec<u32>,
}

impl CorrespondenceMap {
    /// Build a map from raw source indices, one per target vertex
    pub fn from_indices(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    /// Number of target vertices
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Source index for a target vertex
    pub fn get(&self, target: usize) -> Option<usize> {
        self.indices.get(target).map(|&s| s as usize)
    }

    /// `(target, source)` pairs in target order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.indices
            .iter()
            .enumerate()
            .map(|(t, &s)| (t, s as usize))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.indices
    }

    /// True when every target maps to the source with the same index
    pub fn is_identity(&self) -> bool {
        self.indices
            .iter()
            .enumerate()
            .all(|(t, &s)| t == s as usize)
    }
}

/// Correspondence plus match-distance diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub map: CorrespondenceMap,

    /// Largest nearest-match distance over all target vertices
    pub max_distance: f32,

    /// Target vertices whose nearest match lies beyond the configured
    /// threshold (always 0 without a threshold)
    pub far_matches: usize,
}

/// Nearest-position vertex matcher
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexCorrespondenceResolver {
    /// Distance above which a match counts as suspicious
    ///
    /// Matches are never rejected; this only feeds `Resolution::far_matches`.
    pub max_match_distance: Option<f32>,
}

impl VertexCorrespondenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_match_distance(max_match_distance: Option<f32>) -> Self {
        Self { max_match_distance }
    }

    /// Match every target vertex to its nearest source vertex
    pub fn resolve(
        &self,
        source: &[[f32; 3]],
        target: &[[f32; 3]],
    ) -> Result<Resolution, RetargetError> {
        let source = to_vec3s(source, "source")?;
        let target = to_vec3s(target, "target")?;

        if target.is_empty() {
            return Ok(Resolution {
                map: CorrespondenceMap::default(),
                max_distance: 0.0,
                far_matches: 0,
            });
        }
        if source.is_empty() {
            return Err(RetargetError::EmptySource {
                target_count: target.len(),
            });
        }

        let grid = SourceGrid::build(&source);
        let matches: Vec<(u32, f32)> = target.par_iter().map(|&p| grid.nearest(p)).collect();

        let max_distance = matches
            .iter()
            .map(|&(_, d2)| d2)
            .fold(0.0f32, f32::max)
            .sqrt();
        let far_matches = self.max_match_distance.map_or(0, |limit| {
            let limit_sq = limit * limit;
            matches.iter().filter(|&&(_, d2)| d2 > limit_sq).count()
        });

        tracing::debug!(
            "Matched {} target vertices against {} source vertices \
             ({} grid cells, max distance {})",
            target.len(),
            source.len(),
            grid.cell_count(),
            max_distance
        );

        Ok(Resolution {
            map: CorrespondenceMap::from_indices(matches.into_iter().map(|(i, _)| i).collect()),
            max_distance,
            far_matches,
        })
    }
}

/// Match every target vertex to its nearest source vertex
pub fn resolve(
    source: &[[f32; 3]],
    target: &[[f32; 3]],
) -> Result<CorrespondenceMap, RetargetError> {
    VertexCorrespondenceResolver::new()
        .resolve(source, target)
        .map(|r| r.map)
}

fn to_vec3s(positions: &[[f32; 3]], snapshot: &'static str) -> Result<Vec<Vec3>, RetargetError> {
    if u32::try_from(positions.len()).is_err() {
        return Err(RetargetError::TooManyVertices {
            snapshot,
            count: positions.len(),
        });
    }
    positions
        .iter()
        .enumerate()
        .map(|(index, &p)| {
            let v = Vec3::from_array(p);
            if v.is_finite() {
                Ok(v)
            } else {
                Err(RetargetError::NonFinitePosition {
                    snapshot,
                    index,
                    position: p,
                })
            }
        })
        .collect()
}

/// Keep `(d2, index)` if it beats the current best
///
/// Equal distances resolve to the lower index.
#[inline]
fn closer(best: Option<(f32, u32)>, d2: f32, index: u32) -> bool {
    match best {
        None => true,
        Some((best_d2, best_index)) => d2 < best_d2 || (d2 == best_d2 && index < best_index),
    }
}

/// Uniform grid over source positions (cells stored CSR-style)
struct SourceGrid<'a> {
    positions: &'a [Vec3],
    origin: Vec3,
    cell_size: f32,
    dims: [i64; 3],
    /// `cell_start[c]..cell_start[c + 1]` indexes `entries` for cell `c`
    cell_start: Vec<u32>,
    /// Source indices, grouped by cell, ascending within a cell
    entries: Vec<u32>,
}

impl<'a> SourceGrid<'a> {
    fn build(positions: &'a [Vec3]) -> Self {
        let (min, max) = positions.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), &p| (lo.min(p), hi.max(p)),
        );
        let extent = max - min;
        let longest = extent.max_element();

        // Aim for roughly one source vertex per cell along the longest axis
        let per_axis =
            ((positions.len() as f32).cbrt().ceil() as usize).clamp(1, MAX_CELLS_PER_AXIS);
        let cell_size = if longest > 0.0 {
            longest / per_axis as f32
        } else {
            1.0
        };

        let axis_cells = |e: f32, cell_size: f32| {
            (e / cell_size).floor().clamp(0.0, MAX_CELLS_PER_AXIS as f32) as i64 + 1
        };
        // Extents too small or too large for f32 cells collapse into one cell
        let (cell_size, dims) = if cell_size.is_normal() {
            let dims = [
                axis_cells(extent.x, cell_size),
                axis_cells(extent.y, cell_size),
                axis_cells(extent.z, cell_size),
            ];
            (cell_size, dims)
        } else {
            (1.0, [1; 3])
        };

        let mut grid = Self {
            positions,
            origin: min,
            cell_size,
            dims,
            cell_start: Vec::new(),
            entries: Vec::new(),
        };

        // Counting sort of source indices by cell
        let cell_total = (dims[0] * dims[1] * dims[2]) as usize;
        let cells: Vec<usize> = positions
            .iter()
            .map(|&p| grid.linear(grid.clamp_cell(grid.cell_of(p))))
            .collect();
        let mut counts = vec![0u32; cell_total + 1];
        for &c in &cells {
            counts[c + 1] += 1;
        }
        for c in 0..cell_total {
            counts[c + 1] += counts[c];
        }
        let mut cursor = counts.clone();
        let mut entries = vec![0u32; positions.len()];
        for (i, &c) in cells.iter().enumerate() {
            entries[cursor[c] as usize] = i as u32;
            cursor[c] += 1;
        }

        grid.cell_start = counts;
        grid.entries = entries;
        grid
    }

    fn cell_count(&self) -> usize {
        self.cell_start.len() - 1
    }

    fn cell_of(&self, p: Vec3) -> [i64; 3] {
        let rel = (p - self.origin) / self.cell_size;
        [
            rel.x.floor() as i64,
            rel.y.floor() as i64,
            rel.z.floor() as i64,
        ]
    }

    fn clamp_cell(&self, c: [i64; 3]) -> [i64; 3] {
        [
            c[0].clamp(0, self.dims[0] - 1),
            c[1].clamp(0, self.dims[1] - 1),
            c[2].clamp(0, self.dims[2] - 1),
        ]
    }

    fn linear(&self, c: [i64; 3]) -> usize {
        ((c[2] * self.dims[1] + c[1]) * self.dims[0] + c[0]) as usize
    }

    fn scan_cell(&self, c: [i64; 3], p: Vec3, best: &mut Option<(f32, u32)>) {
        let cell = self.linear(c);
        let start = self.cell_start[cell] as usize;
        let end = self.cell_start[cell + 1] as usize;
        for &index in &self.entries[start..end] {
            let d2 = (self.positions[index as usize] - p).length_squared();
            if closer(*best, d2, index) {
                *best = Some((d2, index));
            }
        }
    }

    /// Nearest source vertex to `p` as `(index, squared distance)`
    ///
    /// Searches Chebyshev rings of cells around the cell containing `p`.
    /// Anything outside ring `r` is farther than `r * cell_size`, so the
    /// search stops once the best match is strictly closer than that.
    ///
    /// Queries more than a grid's width outside it are matched by linear
    /// scan, so ring arithmetic only sees small cell coordinates.
    fn nearest(&self, p: Vec3) -> (u32, f32) {
        let rel = (p - self.origin) / self.cell_size;
        let near_grid = (0..3).all(|a| {
            let width = self.dims[a] as f32;
            rel[a] >= -width && rel[a] <= 2.0 * width
        });
        if !near_grid {
            return self.nearest_linear(p);
        }
        let c = self.cell_of(p);

        // First ring that touches the grid, and the ring that covers all of it
        let mut first_ring = 0i64;
        let mut last_ring = 0i64;
        for a in 0..3 {
            let below = -c[a];
            let above = c[a] - (self.dims[a] - 1);
            first_ring = first_ring.max(below).max(above);
            last_ring = last_ring.max(c[a].abs()).max((self.dims[a] - 1 - c[a]).abs());
        }

        let mut best: Option<(f32, u32)> = None;
        for r in first_ring..=last_ring {
            self.scan_ring(c, r, p, &mut best);
            if let Some((d2, _)) = best {
                let reach = r as f32 * self.cell_size * RING_BOUND_SLACK;
                if d2.sqrt() < reach {
                    break;
                }
            }
        }

        // The grid holds at least one vertex and the last ring covers every cell
        let (d2, index) = best.unwrap_or((f32::INFINITY, 0));
        (index, d2)
    }

    fn nearest_linear(&self, p: Vec3) -> (u32, f32) {
        let mut best: Option<(f32, u32)> = None;
        for (index, &s) in self.positions.iter().enumerate() {
            let d2 = (s - p).length_squared();
            if closer(best, d2, index as u32) {
                best = Some((d2, index as u32));
            }
        }
        let (d2, index) = best.unwrap_or((f32::INFINITY, 0));
        (index, d2)
    }

    fn scan_ring(&self, c: [i64; 3], r: i64, p: Vec3, best: &mut Option<(f32, u32)>) {
        let lo = |a: usize| (c[a] - r).max(0);
        let hi = |a: usize| (c[a] + r).min(self.dims[a] - 1);

        for x in lo(0)..=hi(0) {
            let x_edge = (x - c[0]).abs() == r;
            for y in lo(1)..=hi(1) {
                let y_edge = (y - c[1]).abs() == r;
                if x_edge || y_edge {
                    for z in lo(2)..=hi(2) {
                        self.scan_cell([x, y, z], p, best);
                    }
                } else {
                    // Interior column: only the two z faces belong to this ring
                    for z in [c[2] - r, c[2] + r] {
                        if (0..self.dims[2]).contains(&z) {
                            self.scan_cell([x, y, z], p, best);
                        }
                    }
                }
            }
        }
    }
}
