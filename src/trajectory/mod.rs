//! Reorientation trajectories for tracked grains.
//!
//! For one [`GrainIdentityChain`] the processor:
//!
//! 1. **Aligns branches** — each orientation is replaced by its symmetry
//!    equivalent closest to the previous aligned point (see [`align`]).
//! 2. **Smooths** — the four quaternion components are fitted independently
//!    against strain with a low-degree polynomial (see [`polynomial`]),
//!    evaluated at the measured strains and renormalized.
//! 3. **Reports provenance** — chains too short for the requested degree are
//!    fitted with the highest feasible degree, and single-point chains are
//!    passed through unchanged. Either case is flagged in [`FitProvenance`].

pub mod align;
pub mod polynomial;

use tracing::debug;

use crate::chain::GrainIdentityChain;
use crate::error::{Result, TrackError};
use crate::grain::GrainMap;
use crate::orientation::{EulerBunge, EulerConvention, Orientation};
use crate::symmetry::CrystalSymmetry;

pub use align::align_branches;
pub use polynomial::PolynomialSeries;

/// Parameters controlling trajectory smoothing.
#[derive(Debug, Clone)]
pub struct SmoothingConfig {
    /// Requested polynomial degree. Default 2.
    pub degree: usize,
    /// Convention for the exported Euler angles. Default passive.
    pub convention: EulerConvention,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            degree: 2,
            convention: EulerConvention::Passive,
        }
    }
}

/// How faithfully a trajectory could be fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// Fitted with the requested degree.
    Full,
    /// Too few distinct strains; fitted with a lower degree.
    ReducedDegree,
    /// A single point, returned unchanged.
    Passthrough,
}

/// Provenance of a smoothed trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitProvenance {
    pub requested_degree: usize,
    pub used_degree: usize,
    pub samples: usize,
    pub status: FitStatus,
}

impl FitProvenance {
    /// `true` when the chain was too short for the requested fit.
    pub fn is_underdetermined(&self) -> bool {
        self.status != FitStatus::Full
    }
}

/// One point of a reorientation trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryPoint {
    pub scan: usize,
    pub region_id: u32,
    pub strain: f64,
    /// Measured orientation after branch alignment.
    pub measured: Orientation,
    pub smoothed: Orientation,
    /// `smoothed` as Euler-Bunge angles in the configured convention.
    pub euler: EulerBunge,
    /// Geodesic angle from the first smoothed point, radians.
    pub reorientation: f64,
}

/// Smoothed, branch-consistent orientation history of one tracked grain.
#[derive(Debug, Clone)]
pub struct ReorientationTrajectory {
    pub chain_id: u32,
    pub points: Vec<TrajectoryPoint>,
    pub provenance: FitProvenance,
    series: PolynomialSeries,
    convention: EulerConvention,
}

impl ReorientationTrajectory {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Evaluate the fitted trajectory at externally supplied strains.
    ///
    /// Strains outside the measured range are extrapolated by the polynomial.
    pub fn resample(&self, strains: &[f64]) -> Result<Vec<(f64, Orientation)>> {
        strains
            .iter()
            .map(|&s| {
                if !s.is_finite() {
                    return Err(TrackError::InvalidStrain(s));
                }
                evaluate_orientation(&self.series, s).map(|o| (s, o))
            })
            .collect()
    }

    /// Resampled orientations as Euler-Bunge angles in the trajectory's convention.
    pub fn resample_euler(&self, strains: &[f64]) -> Result<Vec<(f64, EulerBunge)>> {
        Ok(self
            .resample(strains)?
            .into_iter()
            .map(|(s, o)| (s, o.euler(self.convention)))
            .collect())
    }
}

/// Smooth the trajectory of one chain.
///
/// `strain_values` holds one strain per scan of the sequence (normally the
/// grain maps' own strains, or an externally supplied strain-interval list)
/// and must have the same length as `maps`.
pub fn smooth_trajectory(
    chain: &GrainIdentityChain,
    maps: &[GrainMap],
    strain_values: &[f64],
    symmetry: &CrystalSymmetry,
    config: &SmoothingConfig,
) -> Result<ReorientationTrajectory> {
    if strain_values.len() != maps.len() {
        return Err(TrackError::StrainMismatch {
            expected: maps.len(),
            found: strain_values.len(),
        });
    }

    let mut raw = Vec::with_capacity(chain.len());
    let mut strains = Vec::with_capacity(chain.len());
    for link in &chain.links {
        let region = maps
            .get(link.scan)
            .and_then(|m| m.region(link.region_id))
            .ok_or_else(|| TrackError::InvalidRegion {
                id: link.region_id,
                reason: format!("not present in scan {}", link.scan),
            })?;
        let strain = strain_values[link.scan];
        if !strain.is_finite() {
            return Err(TrackError::InvalidStrain(strain));
        }
        raw.push(region.orientation);
        strains.push(strain);
    }

    // A point that fails to evaluate is reported at its own scan and region.
    let smoothed = smooth_located(&raw, &strains, symmetry, config, |i| {
        chain
            .links
            .get(i)
            .map_or((None, None), |l| (Some(l.scan), Some(l.region_id)))
    })?;

    let reference = smoothed.smoothed.first().copied();
    let points = chain
        .links
        .iter()
        .zip(strains.iter())
        .zip(smoothed.aligned.iter().zip(smoothed.smoothed.iter()))
        .map(|((link, &strain), (measured, s))| TrajectoryPoint {
            scan: link.scan,
            region_id: link.region_id,
            strain,
            measured: *measured,
            smoothed: *s,
            euler: s.euler(config.convention),
            reorientation: reference.map(|r| r.angle_to(s)).unwrap_or(0.0),
        })
        .collect();

    debug!(
        "Chain {}: {} points, degree {} of {} ({:?})",
        chain.id,
        chain.len(),
        smoothed.provenance.used_degree,
        smoothed.provenance.requested_degree,
        smoothed.provenance.status
    );

    Ok(ReorientationTrajectory {
        chain_id: chain.id,
        points,
        provenance: smoothed.provenance,
        series: smoothed.series,
        convention: config.convention,
    })
}

/// Branch-aligned and smoothed orientation sequence.
#[derive(Debug, Clone)]
pub struct SmoothedSeries {
    pub aligned: Vec<Orientation>,
    pub smoothed: Vec<Orientation>,
    pub provenance: FitProvenance,
    pub series: PolynomialSeries,
}

/// Core smoothing on plain orientation / strain sequences.
pub fn smooth_orientations(
    raw: &[Orientation],
    strains: &[f64],
    symmetry: &CrystalSymmetry,
    config: &SmoothingConfig,
) -> Result<SmoothedSeries> {
    smooth_located(raw, strains, symmetry, config, |_| (None, None))
}

/// `locate` maps a point index to the scan / region attached to its errors.
fn smooth_located(
    raw: &[Orientation],
    strains: &[f64],
    symmetry: &CrystalSymmetry,
    config: &SmoothingConfig,
    locate: impl Fn(usize) -> (Option<usize>, Option<u32>),
) -> Result<SmoothedSeries> {
    if raw.len() != strains.len() {
        return Err(TrackError::StrainMismatch {
            expected: raw.len(),
            found: strains.len(),
        });
    }
    if raw.is_empty() {
        return Err(TrackError::invalid_orientation("empty orientation sequence"));
    }

    let aligned = align_branches(raw, symmetry);
    let samples: Vec<[f64; 4]> = aligned.iter().map(|o| o.components()).collect();

    let used_degree = config.degree.min(distinct_count(strains) - 1);
    let status = if raw.len() == 1 {
        FitStatus::Passthrough
    } else if used_degree < config.degree {
        FitStatus::ReducedDegree
    } else {
        FitStatus::Full
    };
    let provenance = FitProvenance {
        requested_degree: config.degree,
        used_degree,
        samples: raw.len(),
        status,
    };

    let series = PolynomialSeries::fit(strains, &samples, used_degree)?;
    let smoothed = if status == FitStatus::Passthrough {
        aligned.clone()
    } else {
        strains
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                evaluate_orientation(&series, s).map_err(|e| {
                    let (scan, region) = locate(i);
                    e.at(scan, region)
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    Ok(SmoothedSeries {
        aligned,
        smoothed,
        provenance,
        series,
    })
}

fn evaluate_orientation(series: &PolynomialSeries, strain: f64) -> Result<Orientation> {
    let [w, x, y, z] = series.evaluate(strain);
    Orientation::from_components(w, x, y, z)
}

/// Number of distinct strain values (exact comparison), at least 1 for non-empty input.
fn distinct_count(strains: &[f64]) -> usize {
    let mut sorted = strains.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainLink;
    use crate::grain::{build_grain_map, GrainRecord};

    fn maps_for(eulers: &[[f64; 3]], strains: &[f64]) -> Vec<GrainMap> {
        eulers
            .iter()
            .zip(strains)
            .map(|(e, &s)| {
                build_grain_map(
                    s,
                    &[GrainRecord::new(1, [0.0, 0.0], 1.0, EulerBunge::from(*e))],
                    EulerConvention::Passive,
                )
                .unwrap()
            })
            .collect()
    }

    fn full_chain(n: usize) -> GrainIdentityChain {
        GrainIdentityChain {
            id: 0,
            links: (0..n).map(|scan| ChainLink { scan, region_id: 1 }).collect(),
        }
    }

    #[test]
    fn single_point_is_passed_through() {
        let maps = maps_for(&[[0.3, 0.2, 0.1]], &[0.0]);
        let traj = smooth_trajectory(
            &full_chain(1),
            &maps,
            &[0.0],
            &CrystalSymmetry::cubic(),
            &SmoothingConfig::default(),
        )
        .unwrap();
        assert_eq!(traj.provenance.status, FitStatus::Passthrough);
        assert_eq!(traj.provenance.used_degree, 0);
        assert!(traj.provenance.is_underdetermined());
        assert_eq!(traj.points[0].smoothed, maps[0].regions()[0].orientation);
        assert_eq!(traj.points[0].reorientation, 0.0);
    }

    #[test]
    fn two_points_fall_back_to_linear() {
        let maps = maps_for(&[[0.3, 0.2, 0.1], [0.35, 0.2, 0.1]], &[0.0, 0.1]);
        let traj = smooth_trajectory(
            &full_chain(2),
            &maps,
            &[0.0, 0.1],
            &CrystalSymmetry::cubic(),
            &SmoothingConfig::default(),
        )
        .unwrap();
        assert_eq!(traj.provenance.status, FitStatus::ReducedDegree);
        assert_eq!(traj.provenance.used_degree, 1);
        for (p, m) in traj.points.iter().zip(&maps) {
            assert!(p.smoothed.angle_to(&m.regions()[0].orientation) < 1e-9);
        }
        assert!((traj.points[1].reorientation - 0.05).abs() < 1e-6);
    }

    #[test]
    fn three_points_fit_with_full_degree() {
        let eulers = [[0.3, 0.2, 0.1], [0.32, 0.21, 0.1], [0.35, 0.22, 0.1]];
        let strains = [0.0, 0.05, 0.1];
        let maps = maps_for(&eulers, &strains);
        let traj = smooth_trajectory(
            &full_chain(3),
            &maps,
            &strains,
            &CrystalSymmetry::cubic(),
            &SmoothingConfig::default(),
        )
        .unwrap();
        assert_eq!(traj.provenance.status, FitStatus::Full);
        assert_eq!(traj.provenance.used_degree, 2);

        // Quadratic through three points interpolates them; normalization keeps it close.
        for (p, m) in traj.points.iter().zip(&maps) {
            assert!(p.smoothed.angle_to(&m.regions()[0].orientation) < 1e-6);
        }

        let resampled = traj.resample_euler(&[0.025, 0.075]).unwrap();
        assert_eq!(resampled.len(), 2);
        assert!(resampled[0].1.phi1 > 0.3 && resampled[0].1.phi1 < 0.32);
    }

    #[test]
    fn strain_list_must_cover_every_scan() {
        let maps = maps_for(&[[0.3, 0.2, 0.1], [0.35, 0.2, 0.1]], &[0.0, 0.1]);
        let err = smooth_trajectory(
            &full_chain(2),
            &maps,
            &[0.0],
            &CrystalSymmetry::cubic(),
            &SmoothingConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TrackError::StrainMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn failed_point_is_reported_at_its_own_scan() {
        // Half-angles 72°·k about x: consecutive quaternions stay in one
        // hemisphere and the five sum to zero. A linear fit over uniform
        // strains passes through the data mean at the middle strain, so only
        // the third point collapses to a zero quaternion.
        let maps: Vec<GrainMap> = (0..5)
            .map(|k| {
                let phi = (144.0 * k as f64).to_radians();
                build_grain_map(
                    k as f64,
                    &[GrainRecord::new(
                        10 + k as u32,
                        [0.0, 0.0],
                        1.0,
                        EulerBunge::new(0.0, phi, 0.0),
                    )],
                    EulerConvention::Passive,
                )
                .unwrap()
            })
            .collect();
        let chain = GrainIdentityChain {
            id: 0,
            links: (0..5)
                .map(|scan| ChainLink {
                    scan,
                    region_id: 10 + scan as u32,
                })
                .collect(),
        };
        let config = SmoothingConfig {
            degree: 1,
            ..Default::default()
        };

        let err = smooth_trajectory(
            &chain,
            &maps,
            &[0.0, 1.0, 2.0, 3.0, 4.0],
            &CrystalSymmetry::triclinic(),
            &config,
        )
        .unwrap_err();
        match err {
            TrackError::InvalidOrientation { scan, region, .. } => {
                assert_eq!(scan, Some(2));
                assert_eq!(region, Some(12));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_region_is_reported() {
        let maps = maps_for(&[[0.3, 0.2, 0.1]], &[0.0]);
        let chain = GrainIdentityChain {
            id: 4,
            links: vec![ChainLink {
                scan: 0,
                region_id: 99,
            }],
        };
        let err = smooth_trajectory(
            &chain,
            &maps,
            &[0.0],
            &CrystalSymmetry::cubic(),
            &SmoothingConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TrackError::InvalidRegion { id: 99, .. }));
    }
}
