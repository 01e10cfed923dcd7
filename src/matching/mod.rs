//! Cross-scan grain correspondence.
//!
//! For two adjacent grain maps the matcher:
//!
//! 1. **Generates candidates** — every eligible region of scan *i* is paired with
//!    the eligible regions of scan *i+1* whose centroids lie within `radius`
//!    (via a [`RegionIndex`](crate::spatial::RegionIndex) grid search).
//! 2. **Accumulates errors** — each [`CorrespondenceEdge`] collects a normalized
//!    centroid displacement and the symmetry-aware misorientation. Edges whose
//!    misorientation exceeds `tolerance` are discarded.
//! 3. **Resolves** — edges are accepted greedily in ascending weight order,
//!    skipping any edge whose source or target is already consumed, giving a
//!    one-to-one partial matching.
//!
//! Chain assembly across the whole sequence lives in [`crate::chain`].

mod graph;
mod resolve;

use crate::error::{Result, TrackError};

pub use graph::{CorrespondenceEdge, ErrorKind};
pub use resolve::match_scans;

// ── Configuration ───────────────────────────────────────────────────────────

/// Parameters controlling pairwise matching.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Regions with a smaller area take no part in matching. Default 0.
    pub min_area: f64,
    /// Maximum centroid displacement between scans, in sample units. Default 1.0.
    pub radius: f64,
    /// Maximum symmetry-aware misorientation (radians). Default 5°.
    pub tolerance: f64,
    /// Keep every candidate edge with its outcome in [`MatchResult::edge_records`].
    pub export_errors: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_area: 0.0,
            radius: 1.0,
            tolerance: 5.0_f64.to_radians(),
            export_errors: false,
        }
    }
}

impl MatchConfig {
    pub fn new(min_area: f64, radius: f64, tolerance: f64) -> Self {
        Self {
            min_area,
            radius,
            tolerance,
            ..Default::default()
        }
    }

    /// Check the parameters before any matching.
    ///
    /// `min_area` and `tolerance` must be finite and non-negative. `radius`
    /// must be non-negative and may be infinite (every region is a candidate).
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("min_area", self.min_area, self.min_area.is_finite()),
            ("radius", self.radius, !self.radius.is_nan()),
            ("tolerance", self.tolerance, self.tolerance.is_finite()),
        ];
        for (field, value, ok) in checks {
            if !ok || value < 0.0 {
                return Err(TrackError::InvalidConfig { field, value });
            }
        }
        Ok(())
    }
}

// ── Results ─────────────────────────────────────────────────────────────────

/// Outcome of matching one scan pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// At least one correspondence was accepted.
    Matched,
    /// No edge survived candidate generation and the tolerance filter.
    /// Not fatal: chains ending in scan *i* terminate and scan *i+1* starts new ones.
    NoCandidateMatches,
}

/// One accepted correspondence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMatch {
    pub source_id: u32,
    pub target_id: u32,
    pub weight: f64,
}

/// What happened to a candidate edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Accepted,
    /// Lost to a lower-weight edge sharing an endpoint.
    EndpointConsumed,
    /// Misorientation above `tolerance`.
    ExceedsTolerance,
}

impl EdgeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeOutcome::Accepted => "accepted",
            EdgeOutcome::EndpointConsumed => "endpoint_consumed",
            EdgeOutcome::ExceedsTolerance => "exceeds_tolerance",
        }
    }
}

/// Diagnostic record of one candidate edge (only with `export_errors`).
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub source_id: u32,
    pub target_id: u32,
    pub spatial_error: f64,
    pub orientation_error: f64,
    pub weight: f64,
    pub outcome: EdgeOutcome,
}

/// Result of matching scan `scan_index` against scan `scan_index + 1`.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Index of the earlier scan of the pair.
    pub scan_index: usize,
    pub status: MatchStatus,
    /// Eligible region ids of the earlier scan, in map order.
    pub source_ids: Vec<u32>,
    /// Eligible region ids of the later scan, in map order.
    pub target_ids: Vec<u32>,
    /// Accepted correspondences in acceptance (ascending weight) order.
    pub matches: Vec<RegionMatch>,
    /// Number of edges that passed the proximity test.
    pub num_candidates: usize,
    /// Every candidate edge with its outcome, when `export_errors` was set.
    pub edge_records: Option<Vec<EdgeRecord>>,
}

impl MatchResult {
    /// Accepted target for a source region, if any.
    pub fn target_of(&self, source_id: u32) -> Option<u32> {
        self.matches
            .iter()
            .find(|m| m.source_id == source_id)
            .map(|m| m.target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MatchConfig::default().validate().is_ok());
        assert!(MatchConfig::new(0.0, f64::INFINITY, 0.0).validate().is_ok());
    }

    #[test]
    fn rejects_each_bad_parameter() {
        let cases = [
            (MatchConfig::new(f64::NAN, 1.0, 0.1), "min_area"),
            (MatchConfig::new(f64::INFINITY, 1.0, 0.1), "min_area"),
            (MatchConfig::new(-1.0, 1.0, 0.1), "min_area"),
            (MatchConfig::new(0.0, f64::NAN, 0.1), "radius"),
            (MatchConfig::new(0.0, -0.5, 0.1), "radius"),
            (MatchConfig::new(0.0, 1.0, f64::NAN), "tolerance"),
            (MatchConfig::new(0.0, 1.0, f64::INFINITY), "tolerance"),
            (MatchConfig::new(0.0, 1.0, -0.1), "tolerance"),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(TrackError::InvalidConfig { field, .. }) => assert_eq!(field, expected),
                other => panic!("{config:?} gave {other:?}"),
            }
        }
    }
}
