//! Grain identity chains: accepted matches linked across the whole sequence.
//!
//! Assembly walks the scan pairs in temporal order. A match whose source is
//! the tail of an existing chain extends it; eligible regions of the later
//! scan that were not matched start new chains. Chains whose tail found no
//! partner simply end, so a chain need not span every scan.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, TrackError};
use crate::grain::GrainMap;
use crate::matching::MatchResult;

/// One appearance of a tracked grain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    pub scan: usize,
    pub region_id: u32,
}

/// The sequence of regions identified as the same physical grain.
///
/// Scan indices are strictly increasing, and every region appears in at most
/// one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrainIdentityChain {
    /// Tracked grain id, assigned in creation order.
    pub id: u32,
    pub links: Vec<ChainLink>,
}

impl GrainIdentityChain {
    fn start(id: u32, scan: usize, region_id: u32) -> Self {
        Self {
            id,
            links: vec![ChainLink { scan, region_id }],
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn first_scan(&self) -> Option<usize> {
        self.links.first().map(|l| l.scan)
    }

    pub fn last_scan(&self) -> Option<usize> {
        self.links.last().map(|l| l.scan)
    }

    /// Region id of this grain in `scan`, if it was tracked there.
    pub fn region_in(&self, scan: usize) -> Option<u32> {
        self.links
            .iter()
            .find(|l| l.scan == scan)
            .map(|l| l.region_id)
    }
}

/// Link per-pair match results into grain identity chains.
///
/// `results` must cover consecutive scan pairs in temporal order
/// (`scan_index` = k, k+1, k+2, …), as produced by matching each adjacent
/// pair of one sequence.
pub fn assemble_chains(results: &[MatchResult]) -> Result<Vec<GrainIdentityChain>> {
    let Some(first) = results.first() else {
        return Ok(Vec::new());
    };

    let mut chains: Vec<GrainIdentityChain> = Vec::new();
    // Region id in the current scan → chain index.
    let mut tails: HashMap<u32, usize> = HashMap::new();

    for &id in &first.source_ids {
        tails.insert(id, chains.len());
        chains.push(GrainIdentityChain::start(chains.len() as u32, first.scan_index, id));
    }

    let mut expected = first.scan_index;
    for result in results {
        if result.scan_index != expected {
            return Err(TrackError::NonSequentialMatches {
                expected,
                found: result.scan_index,
            });
        }
        let next_scan = result.scan_index + 1;
        let mut next_tails: HashMap<u32, usize> = HashMap::with_capacity(result.target_ids.len());

        for m in &result.matches {
            let chain_idx = match tails.get(&m.source_id) {
                Some(&idx) => idx,
                None => {
                    let idx = chains.len();
                    chains.push(GrainIdentityChain::start(
                        idx as u32,
                        result.scan_index,
                        m.source_id,
                    ));
                    idx
                }
            };
            chains[chain_idx].links.push(ChainLink {
                scan: next_scan,
                region_id: m.target_id,
            });
            next_tails.insert(m.target_id, chain_idx);
        }

        for &id in &result.target_ids {
            if !next_tails.contains_key(&id) {
                next_tails.insert(id, chains.len());
                chains.push(GrainIdentityChain::start(chains.len() as u32, next_scan, id));
            }
        }

        debug!(
            "Scan {}: {} chains extended, {} chains total",
            next_scan,
            result.matches.len(),
            chains.len()
        );
        tails = next_tails;
        expected += 1;
    }

    Ok(chains)
}

/// Single-link chains for every eligible region of one scan.
///
/// Used when a sequence consists of a single scan and there are no pairs to match.
pub fn single_scan_chains(map: &GrainMap, scan: usize, min_area: f64) -> Vec<GrainIdentityChain> {
    map.eligible(min_area)
        .enumerate()
        .map(|(i, (_, r))| GrainIdentityChain::start(i as u32, scan, r.id))
        .collect()
}
