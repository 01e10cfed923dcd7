//! Uniform-grid index over region centroids for fast radius searches.
//!
//! `RegionIndex` bins centroids into square cells of side `cell_size` covering
//! the bounding box of the input. Each cell maps to a compact slice of point
//! indices (`cell_offsets` / `point_indices`), so a query only scans the cells
//! that intersect the search disk before applying the exact distance test.
//!
//! Candidate generation in [`match_scans`](crate::match_scans) builds one index
//! per target scan with `cell_size = radius`, which keeps the candidate set
//! proportional to local grain density instead of the full map size.

/// Upper bound on cells per axis; very small radii over large maps get coarser cells.
const MAX_CELLS_PER_AXIS: usize = 512;

#[derive(Debug, Clone)]
pub struct RegionIndex {
    origin: [f64; 2],
    cell_size: f64,
    n_x: usize,
    n_y: usize,
    points: Vec<[f64; 2]>,
    cell_offsets: Vec<u32>,
    point_indices: Vec<u32>,
}

impl RegionIndex {
    /// Build an index over `points` with the requested cell size.
    ///
    /// Non-positive or non-finite cell sizes fall back to a single cell.
    pub fn new(points: Vec<[f64; 2]>, cell_size: f64) -> Self {
        let (mut min, mut max) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
        for p in &points {
            for d in 0..2 {
                min[d] = min[d].min(p[d]);
                max[d] = max[d].max(p[d]);
            }
        }
        if points.is_empty() {
            min = [0.0; 2];
            max = [0.0; 2];
        }

        let extent = (max[0] - min[0]).max(max[1] - min[1]);
        let mut cell = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            extent.max(1.0)
        };
        if extent / cell > MAX_CELLS_PER_AXIS as f64 {
            cell = extent / MAX_CELLS_PER_AXIS as f64;
        }

        let n_x = (((max[0] - min[0]) / cell).floor() as usize + 1).min(MAX_CELLS_PER_AXIS);
        let n_y = (((max[1] - min[1]) / cell).floor() as usize + 1).min(MAX_CELLS_PER_AXIS);

        let mut bins: Vec<Vec<u32>> = vec![Vec::new(); n_x * n_y];
        for (idx, p) in points.iter().enumerate() {
            let cx = axis_bin(p[0], min[0], cell, n_x);
            let cy = axis_bin(p[1], min[1], cell, n_y);
            bins[cy * n_x + cx].push(idx as u32);
        }

        let mut cell_offsets = Vec::with_capacity(bins.len() + 1);
        let mut point_indices = Vec::with_capacity(points.len());
        cell_offsets.push(0);
        for bin in bins {
            point_indices.extend(bin);
            cell_offsets.push(point_indices.len() as u32);
        }

        Self {
            origin: min,
            cell_size: cell,
            n_x,
            n_y,
            points,
            cell_offsets,
            point_indices,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Indices of all points within `radius` (inclusive) of `center`, ascending.
    pub fn query_indices(&self, center: [f64; 2], radius: f64) -> Vec<usize> {
        if self.is_empty() || radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let r2 = radius * radius;

        let x0 = axis_bin(center[0] - radius, self.origin[0], self.cell_size, self.n_x);
        let x1 = axis_bin(center[0] + radius, self.origin[0], self.cell_size, self.n_x);
        let y0 = axis_bin(center[1] - radius, self.origin[1], self.cell_size, self.n_y);
        let y1 = axis_bin(center[1] + radius, self.origin[1], self.cell_size, self.n_y);

        let mut out = Vec::new();
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                let cell = cy * self.n_x + cx;
                let start = self.cell_offsets[cell] as usize;
                let end = self.cell_offsets[cell + 1] as usize;
                for &idx in &self.point_indices[start..end] {
                    let p = self.points[idx as usize];
                    let dx = p[0] - center[0];
                    let dy = p[1] - center[1];
                    if dx * dx + dy * dy <= r2 {
                        out.push(idx as usize);
                    }
                }
            }
        }

        out.sort_unstable();
        out
    }
}

/// Cell index along one axis, clamped into `[0, n)`.
fn axis_bin(v: f64, origin: f64, cell: f64, n: usize) -> usize {
    let u = ((v - origin) / cell).floor();
    if u.is_nan() || u < 0.0 {
        0
    } else {
        (u as usize).min(n - 1)
    }
}
