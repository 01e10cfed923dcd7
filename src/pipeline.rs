//! End-to-end reorientation mapping over a sequence of grain maps.
//!
//! [`ReorientationMapper`] resolves the crystal class once, then for a
//! temporally ordered sequence of scans matches every adjacent pair, links the
//! accepted matches into identity chains and smooths each chain into a
//! [`ReorientationTrajectory`]. Scan pairs and chains are independent, so both
//! stages run on a rayon pool.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::chain::{assemble_chains, single_scan_chains, GrainIdentityChain};
use crate::error::{Result, TrackError};
use crate::grain::GrainMap;
use crate::matching::{match_scans, MatchConfig, MatchResult, MatchStatus};
use crate::symmetry::{CrystalSymmetry, SymmetryRegistry};
use crate::trajectory::{smooth_trajectory, FitStatus, ReorientationTrajectory, SmoothingConfig};

/// Parameters for a full mapping run.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Crystal class looked up in the [`SymmetryRegistry`]. Default `"cubic"`.
    pub crystal_class: String,
    pub matching: MatchConfig,
    pub smoothing: SmoothingConfig,
    /// Chains shorter than this get no trajectory. Default 1.
    pub min_chain_length: usize,
    /// Worker threads; `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            crystal_class: "cubic".to_string(),
            matching: MatchConfig::default(),
            smoothing: SmoothingConfig::default(),
            min_chain_length: 1,
            threads: None,
        }
    }
}

/// Summary counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub scan_pairs: usize,
    pub no_candidate_pairs: usize,
    pub accepted_links: usize,
    pub chains: usize,
    pub trajectories: usize,
    pub reduced_degree: usize,
    pub passthrough: usize,
}

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct MappingRun {
    /// One result per adjacent scan pair, in temporal order.
    pub match_results: Vec<MatchResult>,
    pub chains: Vec<GrainIdentityChain>,
    /// Trajectories in chain-id order (chains below `min_chain_length` skipped).
    pub trajectories: Vec<ReorientationTrajectory>,
    pub report: RunReport,
}

/// Drives matching, chain assembly and smoothing for a scan sequence.
#[derive(Debug, Clone)]
pub struct ReorientationMapper {
    symmetry: Arc<CrystalSymmetry>,
    config: MapperConfig,
}

impl ReorientationMapper {
    /// Resolve the configured crystal class against `registry` and check the
    /// matching parameters.
    pub fn new(registry: &SymmetryRegistry, config: MapperConfig) -> Result<Self> {
        config.matching.validate()?;
        let symmetry = registry.get(&config.crystal_class)?;
        Ok(Self { symmetry, config })
    }

    pub fn symmetry(&self) -> &CrystalSymmetry {
        &self.symmetry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Map a temporally ordered sequence of scans.
    ///
    /// `strain_values` overrides the strains stored in the maps (one value per
    /// scan). With `None` each map's own strain is used.
    pub fn run(&self, maps: &[GrainMap], strain_values: Option<&[f64]>) -> Result<MappingRun> {
        let strains: Vec<f64> = match strain_values {
            Some(values) => {
                if values.len() != maps.len() {
                    return Err(TrackError::StrainMismatch {
                        expected: maps.len(),
                        found: values.len(),
                    });
                }
                values.to_vec()
            }
            None => maps.iter().map(GrainMap::strain).collect(),
        };
        if let Some(&bad) = strains.iter().find(|s| !s.is_finite()) {
            return Err(TrackError::InvalidStrain(bad));
        }

        match self.config.threads {
            Some(n) => build_thread_pool(n)?.install(|| self.run_inner(maps, &strains)),
            None => self.run_inner(maps, &strains),
        }
    }

    fn run_inner(&self, maps: &[GrainMap], strains: &[f64]) -> Result<MappingRun> {
        let symmetry = self.symmetry.as_ref();
        let matching = &self.config.matching;

        let match_results: Vec<MatchResult> = (0..maps.len().saturating_sub(1))
            .into_par_iter()
            .map(|i| match_scans(&maps[i], &maps[i + 1], i, matching, symmetry))
            .collect::<Result<Vec<_>>>()?;

        for result in &match_results {
            if result.status == MatchStatus::NoCandidateMatches {
                warn!(
                    "No candidate matches between scans {} and {} ({} and {} eligible regions)",
                    result.scan_index,
                    result.scan_index + 1,
                    result.source_ids.len(),
                    result.target_ids.len()
                );
            }
        }

        let chains = match maps {
            [] => Vec::new(),
            [only] => single_scan_chains(only, 0, matching.min_area),
            _ => assemble_chains(&match_results)?,
        };

        let trajectories: Vec<ReorientationTrajectory> = chains
            .par_iter()
            .filter(|c| c.len() >= self.config.min_chain_length.max(1))
            .map(|c| smooth_trajectory(c, maps, strains, symmetry, &self.config.smoothing))
            .collect::<Result<Vec<_>>>()?;

        let report = RunReport {
            scan_pairs: match_results.len(),
            no_candidate_pairs: match_results
                .iter()
                .filter(|r| r.status == MatchStatus::NoCandidateMatches)
                .count(),
            accepted_links: match_results.iter().map(|r| r.matches.len()).sum(),
            chains: chains.len(),
            trajectories: trajectories.len(),
            reduced_degree: count_status(&trajectories, FitStatus::ReducedDegree),
            passthrough: count_status(&trajectories, FitStatus::Passthrough),
        };

        info!(
            "Mapped {} scans ({}): {} links, {} chains, {} trajectories",
            maps.len(),
            symmetry.name(),
            report.accepted_links,
            report.chains,
            report.trajectories
        );
        if report.reduced_degree + report.passthrough > 0 {
            warn!(
                "{} trajectories fitted with reduced degree, {} single-point",
                report.reduced_degree, report.passthrough
            );
        }

        Ok(MappingRun {
            match_results,
            chains,
            trajectories,
            report,
        })
    }
}

fn count_status(trajectories: &[ReorientationTrajectory], status: FitStatus) -> usize {
    trajectories
        .iter()
        .filter(|t| t.provenance.status == status)
        .count()
}

fn build_thread_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| TrackError::ThreadPool(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grain::{build_grain_map, GrainRecord};
    use crate::orientation::{EulerBunge, EulerConvention};

    fn scan(strain: f64, shift: f64) -> GrainMap {
        let records = vec![
            GrainRecord::new(1, [0.0 + shift, 0.0], 2.0, EulerBunge::new(0.2, 0.3, 0.4)),
            GrainRecord::new(2, [3.0 + shift, 0.0], 2.0, EulerBunge::new(1.2, 0.9, 0.1)),
        ];
        build_grain_map(strain, &records, EulerConvention::Passive).unwrap()
    }

    #[test]
    fn unknown_crystal_class_fails_at_construction() {
        let config = MapperConfig {
            crystal_class: "quasicrystal".to_string(),
            ..Default::default()
        };
        let err = ReorientationMapper::new(&SymmetryRegistry::with_builtin(), config).unwrap_err();
        assert!(matches!(err, TrackError::UnknownCrystalClass(_)));
    }

    #[test]
    fn invalid_matching_parameters_fail_at_construction() {
        let registry = SymmetryRegistry::with_builtin();
        for (matching, field) in [
            (MatchConfig::new(0.0, 0.05, f64::NAN), "tolerance"),
            (MatchConfig::new(f64::NAN, 0.05, 0.1), "min_area"),
            (MatchConfig::new(0.0, f64::NAN, 0.1), "radius"),
        ] {
            let config = MapperConfig {
                matching,
                ..Default::default()
            };
            let err = ReorientationMapper::new(&registry, config).unwrap_err();
            assert_eq!(err.to_string(), format!("invalid configuration: `{field}` = NaN"));
        }
    }

    #[test]
    fn runs_with_dedicated_pool() {
        let config = MapperConfig {
            threads: Some(2),
            ..Default::default()
        };
        let mapper = ReorientationMapper::new(&SymmetryRegistry::with_builtin(), config).unwrap();
        let maps = vec![scan(0.0, 0.0), scan(0.05, 0.1), scan(0.1, 0.2)];
        let run = mapper.run(&maps, None).unwrap();
        assert_eq!(run.report.scan_pairs, 2);
        assert_eq!(run.report.accepted_links, 4);
        assert_eq!(run.chains.len(), 2);
        assert!(run.trajectories.iter().all(|t| t.len() == 3));
    }

    #[test]
    fn single_scan_gives_passthrough_trajectories() {
        let mapper =
            ReorientationMapper::new(&SymmetryRegistry::with_builtin(), MapperConfig::default())
                .unwrap();
        let run = mapper.run(&[scan(0.0, 0.0)], None).unwrap();
        assert!(run.match_results.is_empty());
        assert_eq!(run.chains.len(), 2);
        assert_eq!(run.report.passthrough, 2);
    }

    #[test]
    fn strain_override_is_checked() {
        let mapper =
            ReorientationMapper::new(&SymmetryRegistry::with_builtin(), MapperConfig::default())
                .unwrap();
        let maps = vec![scan(0.0, 0.0), scan(0.05, 0.1)];
        assert_eq!(
            mapper.run(&maps, Some(&[0.0])).unwrap_err(),
            TrackError::StrainMismatch {
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            mapper.run(&maps, Some(&[0.0, f64::NAN])).unwrap_err().to_string(),
            TrackError::InvalidStrain(f64::NAN).to_string()
        );

        let run = mapper.run(&maps, Some(&[1.0, 2.0])).unwrap();
        assert_eq!(run.trajectories[0].points[1].strain, 2.0);
    }

    #[test]
    fn empty_sequence_is_empty_run() {
        let mapper =
            ReorientationMapper::new(&SymmetryRegistry::with_builtin(), MapperConfig::default())
                .unwrap();
        let run = mapper.run(&[], None).unwrap();
        assert_eq!(run.report, RunReport::default());
    }
}
