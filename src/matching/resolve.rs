//! Pairwise matching entry point and greedy one-to-one resolution.

use tracing::debug;

use crate::error::Result;
use crate::grain::GrainMap;
use crate::symmetry::CrystalSymmetry;

use super::graph::{candidate_edges, CorrespondenceEdge, ErrorKind};
use super::{EdgeOutcome, EdgeRecord, MatchConfig, MatchResult, MatchStatus, RegionMatch};

/// Match the regions of `map_a` (scan `scan_index`) to those of `map_b`
/// (scan `scan_index + 1`).
///
/// The result is deterministic for identical inputs: candidates are generated
/// in map order and ties in weight are broken by source, then target position.
///
/// A pair with no surviving candidate edges is not an error; the result has
/// status [`MatchStatus::NoCandidateMatches`] and an empty matching. An
/// invalid `config` fails with [`TrackError::InvalidConfig`](crate::TrackError::InvalidConfig).
pub fn match_scans(
    map_a: &GrainMap,
    map_b: &GrainMap,
    scan_index: usize,
    config: &MatchConfig,
    symmetry: &CrystalSymmetry,
) -> Result<MatchResult> {
    config.validate()?;
    let (mut edges, over_tolerance) = candidate_edges(map_a, map_b, config, symmetry);
    let num_candidates = edges.len() + over_tolerance.len();

    sort_edges(&mut edges);
    let accepted = resolve_greedy(&edges, map_a.len(), map_b.len());

    let matches: Vec<RegionMatch> = edges
        .iter()
        .zip(&accepted)
        .filter(|(_, &ok)| ok)
        .map(|(e, _)| RegionMatch {
            source_id: e.source_id,
            target_id: e.target_id,
            weight: e.weight(),
        })
        .collect();

    let edge_records = config.export_errors.then(|| {
        let mut records: Vec<EdgeRecord> = edges
            .iter()
            .zip(&accepted)
            .map(|(e, &ok)| {
                let outcome = if ok {
                    EdgeOutcome::Accepted
                } else {
                    EdgeOutcome::EndpointConsumed
                };
                edge_record(e, outcome)
            })
            .collect();
        records.extend(
            over_tolerance
                .iter()
                .map(|e| edge_record(e, EdgeOutcome::ExceedsTolerance)),
        );
        records
    });

    let status = if matches.is_empty() {
        MatchStatus::NoCandidateMatches
    } else {
        MatchStatus::Matched
    };

    debug!(
        "Scan pair ({}, {}): {} candidates, {} over tolerance, {} accepted",
        scan_index,
        scan_index + 1,
        num_candidates,
        over_tolerance.len(),
        matches.len()
    );

    Ok(MatchResult {
        scan_index,
        status,
        source_ids: map_a.eligible(config.min_area).map(|(_, r)| r.id).collect(),
        target_ids: map_b.eligible(config.min_area).map(|(_, r)| r.id).collect(),
        matches,
        num_candidates,
        edge_records,
    })
}

/// Sort by ascending weight, then source and target position.
fn sort_edges(edges: &mut [CorrespondenceEdge]) {
    edges.sort_by(|a, b| {
        a.weight()
            .total_cmp(&b.weight())
            .then(a.source.cmp(&b.source))
            .then(a.target.cmp(&b.target))
    });
}

/// Greedy unique 1-to-1 matching over weight-sorted edges.
///
/// Returns an acceptance flag per edge.
fn resolve_greedy(edges: &[CorrespondenceEdge], n_source: usize, n_target: usize) -> Vec<bool> {
    let mut used_source = vec![false; n_source];
    let mut used_target = vec![false; n_target];
    let mut accepted = vec![false; edges.len()];

    for (i, e) in edges.iter().enumerate() {
        if !used_source[e.source] && !used_target[e.target] {
            used_source[e.source] = true;
            used_target[e.target] = true;
            accepted[i] = true;
        }
    }

    accepted
}

fn edge_record(edge: &CorrespondenceEdge, outcome: EdgeOutcome) -> EdgeRecord {
    EdgeRecord {
        source_id: edge.source_id,
        target_id: edge.target_id,
        spatial_error: edge.error(ErrorKind::Spatial).unwrap_or(f64::NAN),
        orientation_error: edge.error(ErrorKind::Orientation).unwrap_or(f64::NAN),
        weight: edge.weight(),
        outcome,
    }
}
