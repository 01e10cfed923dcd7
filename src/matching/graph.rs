//! Correspondence edges and candidate generation.

use crate::grain::GrainMap;
use crate::spatial::RegionIndex;
use crate::symmetry::CrystalSymmetry;

use super::MatchConfig;

/// Kind of a scalar error contribution on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Centroid displacement divided by the search radius, in `[0, 1]`.
    Spatial,
    /// Symmetry-aware misorientation, radians.
    Orientation,
}

/// Candidate correspondence between a region of scan *i* and one of scan *i+1*.
///
/// `source` / `target` are positions within the respective grain maps.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceEdge {
    pub source: usize,
    pub target: usize,
    pub source_id: u32,
    pub target_id: u32,
    contributions: Vec<(ErrorKind, f64)>,
}

impl CorrespondenceEdge {
    pub fn new(source: usize, target: usize, source_id: u32, target_id: u32) -> Self {
        Self {
            source,
            target,
            source_id,
            target_id,
            contributions: Vec::with_capacity(2),
        }
    }

    pub fn add_error(&mut self, kind: ErrorKind, value: f64) {
        self.contributions.push((kind, value));
    }

    /// First contribution of the given kind.
    pub fn error(&self, kind: ErrorKind) -> Option<f64> {
        self.contributions
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|&(_, v)| v)
    }

    pub fn errors(&self) -> impl Iterator<Item = f64> + '_ {
        self.contributions.iter().map(|&(_, v)| v)
    }

    /// Mean of the accumulated contributions; lower is a better match.
    /// An edge without contributions has infinite weight.
    pub fn weight(&self) -> f64 {
        if self.contributions.is_empty() {
            return f64::INFINITY;
        }
        self.errors().sum::<f64>() / self.contributions.len() as f64
    }
}

/// Build the candidate edge set between two scans.
///
/// Returns `(kept, over_tolerance)`: edges within `tolerance` and the edges
/// discarded by it. Both lists come out in (source, target) map order.
pub(crate) fn candidate_edges(
    map_a: &GrainMap,
    map_b: &GrainMap,
    config: &MatchConfig,
    symmetry: &CrystalSymmetry,
) -> (Vec<CorrespondenceEdge>, Vec<CorrespondenceEdge>) {
    let targets: Vec<(usize, [f64; 2])> = map_b
        .eligible(config.min_area)
        .map(|(pos, r)| (pos, r.centroid))
        .collect();
    let index = RegionIndex::new(targets.iter().map(|t| t.1).collect(), config.radius);

    let mut kept = Vec::new();
    let mut rejected = Vec::new();

    for (src_pos, src) in map_a.eligible(config.min_area) {
        for local in index.query_indices(src.centroid, config.radius) {
            let tgt_pos = targets[local].0;
            let tgt = &map_b.regions()[tgt_pos];

            let mut edge = CorrespondenceEdge::new(src_pos, tgt_pos, src.id, tgt.id);
            let spatial = if config.radius > 0.0 {
                src.centroid_distance(tgt) / config.radius
            } else {
                0.0
            };
            edge.add_error(ErrorKind::Spatial, spatial);

            let misorientation = symmetry.misorientation(&src.orientation, &tgt.orientation);
            edge.add_error(ErrorKind::Orientation, misorientation);

            if misorientation > config.tolerance {
                rejected.push(edge);
            } else {
                kept.push(edge);
            }
        }
    }

    (kept, rejected)
}
