//! # graintrack
//!
//! Cross-scan **grain correspondence** and **crystallographic reorientation
//! trajectories** for in-situ EBSD deformation experiments.
//!
//! A deformation experiment produces a sequence of EBSD grain maps of the same
//! sample region, each captured at a known strain. Segmentation changes from
//! scan to scan, so region ids are not stable. `graintrack` recovers which
//! region in each scan is the same physical grain and how that grain's lattice
//! rotates as strain increases.
//!
//! ## Features
//!
//! - **Orientation kernel** — Euler-Bunge ⇄ quaternion ⇄ matrix conversions with
//!   an explicit passive/active convention and gimbal-lock handling
//! - **Crystal symmetry** — built-in cubic (432) and triclinic groups, a registry
//!   for custom groups, and symmetry-aware misorientation
//! - **Cross-scan matching** — grid-indexed candidate search, accumulated spatial
//!   and orientation errors, deterministic one-to-one resolution
//! - **Trajectories** — symmetry-branch alignment and polynomial smoothing of the
//!   quaternion components against strain, with degree provenance
//! - **Parallel** — scan pairs and chains are processed on a rayon pool
//! - **Snapshots** — run exports serialize with [rkyv](https://docs.rs/rkyv)
//!
//! ## Example
//!
//! ```no_run
//! use graintrack::{
//!     build_grain_map, EulerBunge, EulerConvention, GrainRecord, MapperConfig,
//!     ReorientationMapper, SymmetryRegistry,
//! };
//!
//! // Pre-parsed grain records for two scans
//! let scan0 = vec![GrainRecord::new(1, [10.0, 4.0], 120.0, EulerBunge::new(0.3, 0.7, 1.1))];
//! let scan1 = vec![GrainRecord::new(8, [10.2, 4.1], 118.0, EulerBunge::new(0.31, 0.7, 1.1))];
//!
//! let maps = vec![
//!     build_grain_map(0.00, &scan0, EulerConvention::Passive).unwrap(),
//!     build_grain_map(0.02, &scan1, EulerConvention::Passive).unwrap(),
//! ];
//!
//! let config = MapperConfig {
//!     crystal_class: "cubic".to_string(),
//!     ..Default::default()
//! };
//! let mapper = ReorientationMapper::new(&SymmetryRegistry::with_builtin(), config).unwrap();
//! let run = mapper.run(&maps, None).unwrap();
//!
//! for traj in &run.trajectories {
//!     for p in &traj.points {
//!         println!("grain {} scan {}: {:?}", traj.chain_id, p.scan, p.euler);
//!     }
//! }
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Ingestion** — region records are validated and their Euler angles
//!    converted to unit quaternions
//! 2. **Candidate generation** — for each adjacent scan pair, regions whose
//!    centroids lie within the search radius become candidate edges
//! 3. **Error accumulation** — each edge collects a normalized displacement and
//!    the minimum misorientation over the crystal symmetry group; edges above
//!    the misorientation tolerance are dropped
//! 4. **Resolution** — edges are accepted in ascending weight order, one per
//!    region, giving a partial one-to-one matching
//! 5. **Chains** — accepted matches are linked across the sequence into grain
//!    identity chains
//! 6. **Smoothing** — each chain is aligned onto one symmetry branch and its
//!    quaternion components fitted against strain, then renormalized

pub mod chain;
pub mod error;
pub mod export;
pub mod grain;
pub mod matching;
pub mod orientation;
pub mod pipeline;
pub mod spatial;
pub mod symmetry;
pub mod trajectory;

pub use chain::{assemble_chains, single_scan_chains, ChainLink, GrainIdentityChain};
pub use error::{Result, TrackError};
pub use export::{EdgeRow, MappingExport, TrajectoryRow};
pub use grain::{build_grain_map, GrainMap, GrainRecord, GrainRegion};
pub use matching::{
    match_scans, EdgeOutcome, EdgeRecord, MatchConfig, MatchResult, MatchStatus, RegionMatch,
};
pub use orientation::{
    euler_to_matrix, euler_to_quaternion, geodesic_distance, matrix_to_euler,
    quaternion_to_euler, EulerBunge, EulerConvention, Orientation,
};
pub use pipeline::{MapperConfig, MappingRun, ReorientationMapper, RunReport};
pub use symmetry::{CrystalSymmetry, SymmetryRegistry};
pub use trajectory::{
    smooth_orientations, smooth_trajectory, FitProvenance, FitStatus, ReorientationTrajectory,
    SmoothingConfig, TrajectoryPoint,
};

// Commonly used types
// Orientations are kept in 64-bit; misorientation tolerances are fractions of a degree.
pub type Quaternion = nalgebra::UnitQuaternion<f64>;
pub type Matrix3 = nalgebra::Matrix3<f64>;
