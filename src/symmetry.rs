//! Crystal symmetry groups and the registry that resolves them by name.
//!
//! A [`SymmetryRegistry`] is built once, wrapped in an `Arc` if needed, and
//! passed explicitly into matching and smoothing. Groups are immutable after
//! registration, so the registry can be read from any number of worker threads
//! without locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use nalgebra::{Rotation3, Unit, Vector3};

use crate::error::{Result, TrackError};
use crate::orientation::{geodesic_distance, Orientation};
use crate::{Matrix3, Quaternion};

/// Point-group rotations of one crystal class.
#[derive(Debug, Clone)]
pub struct CrystalSymmetry {
    name: String,
    matrices: Vec<Matrix3>,
    quaternions: Vec<Quaternion>,
}

impl CrystalSymmetry {
    /// Build a group from its rotation matrices.
    ///
    /// Every matrix must be orthonormal with determinant +1. The identity is
    /// not inserted automatically.
    pub fn new(name: impl Into<String>, matrices: Vec<Matrix3>) -> Result<Self> {
        let name = name.into();
        let mut quaternions = Vec::with_capacity(matrices.len());
        for (index, m) in matrices.iter().enumerate() {
            let finite = m.iter().all(|v| v.is_finite());
            let orthonormal = finite && (m * m.transpose() - Matrix3::identity()).amax() < 1e-6;
            if !orthonormal || (m.determinant() - 1.0).abs() > 1e-6 {
                return Err(TrackError::InvalidSymmetryOperator {
                    class: name.clone(),
                    index,
                });
            }
            quaternions.push(Quaternion::from_rotation_matrix(
                &Rotation3::from_matrix_unchecked(*m),
            ));
        }
        Ok(Self {
            name,
            matrices,
            quaternions,
        })
    }

    /// The 24 proper rotations of the cubic class (432, m-3m Laue group).
    pub fn cubic() -> Self {
        let mut ops: Vec<Quaternion> = vec![Quaternion::identity()];

        let axes_100 = [Vector3::x_axis(), Vector3::y_axis(), Vector3::z_axis()];
        // 90°, 180°, 270° about <100>: 9 operators
        for axis in &axes_100 {
            for k in 1..=3 {
                ops.push(Quaternion::from_axis_angle(
                    axis,
                    k as f64 * std::f64::consts::FRAC_PI_2,
                ));
            }
        }
        // ±120° about <111>: 8 operators
        for &(x, y, z) in &[
            (1.0, 1.0, 1.0),
            (-1.0, 1.0, 1.0),
            (1.0, -1.0, 1.0),
            (1.0, 1.0, -1.0),
        ] {
            let axis = Unit::new_normalize(Vector3::new(x, y, z));
            for angle in [2.0 * std::f64::consts::FRAC_PI_3, 4.0 * std::f64::consts::FRAC_PI_3] {
                ops.push(Quaternion::from_axis_angle(&axis, angle));
            }
        }
        // 180° about <110>: 6 operators
        for &(x, y, z) in &[
            (1.0, 1.0, 0.0),
            (1.0, -1.0, 0.0),
            (1.0, 0.0, 1.0),
            (1.0, 0.0, -1.0),
            (0.0, 1.0, 1.0),
            (0.0, 1.0, -1.0),
        ] {
            let axis = Unit::new_normalize(Vector3::new(x, y, z));
            ops.push(Quaternion::from_axis_angle(&axis, std::f64::consts::PI));
        }

        // Cubic operators are signed permutation matrices; snap away round-off.
        let matrices: Vec<Matrix3> = ops
            .iter()
            .map(|q| q.to_rotation_matrix().into_inner().map(|v| v.round()))
            .collect();
        let quaternions = matrices
            .iter()
            .map(|m| Quaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*m)))
            .collect();

        Self {
            name: "cubic".to_string(),
            matrices,
            quaternions,
        }
    }

    /// The trivial group (identity only).
    pub fn triclinic() -> Self {
        Self {
            name: "triclinic".to_string(),
            matrices: vec![Matrix3::identity()],
            quaternions: vec![Quaternion::identity()],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of operators in the group.
    pub fn order(&self) -> usize {
        self.matrices.len()
    }

    pub fn matrices(&self) -> &[Matrix3] {
        &self.matrices
    }

    pub fn quaternions(&self) -> &[Quaternion] {
        &self.quaternions
    }

    /// All symmetry-equivalent representations of `orientation`, one per operator.
    ///
    /// Coincident entries (special orientations) are not collapsed.
    pub fn equivalent_orientations(&self, orientation: &Orientation) -> Vec<Orientation> {
        self.quaternions
            .iter()
            .map(|op| orientation.symmetric(op))
            .collect()
    }

    /// Equivalent representation of `orientation` closest to `reference`, with its distance.
    ///
    /// Ties resolve to the lowest operator index.
    pub fn closest_equivalent(
        &self,
        orientation: &Orientation,
        reference: &Orientation,
    ) -> (Orientation, f64) {
        let mut best = (*orientation, f64::INFINITY);
        for op in &self.quaternions {
            let candidate = orientation.symmetric(op);
            let d = candidate.angle_to(reference);
            if d < best.1 {
                best = (candidate, d);
            }
        }
        best
    }

    /// Symmetry-aware misorientation angle: the minimum geodesic distance over
    /// every equivalent of `a` against the raw `b`.
    pub fn misorientation(&self, a: &Orientation, b: &Orientation) -> f64 {
        self.quaternions
            .iter()
            .map(|op| geodesic_distance(&(op * a.quaternion()), b.quaternion()))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Name → symmetry group lookup.
///
/// Names are matched case-insensitively. Aliases may point at the same group.
#[derive(Debug, Clone, Default)]
pub struct SymmetryRegistry {
    classes: BTreeMap<String, Arc<CrystalSymmetry>>,
}

impl SymmetryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in classes: `cubic` (aliases `432`, `m-3m`)
    /// and `triclinic` (alias `1`).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let cubic = Arc::new(CrystalSymmetry::cubic());
        registry.register_alias("432", cubic.clone());
        registry.register_alias("m-3m", cubic.clone());
        registry.register_shared(cubic);
        let triclinic = Arc::new(CrystalSymmetry::triclinic());
        registry.register_alias("1", triclinic.clone());
        registry.register_shared(triclinic);
        registry
    }

    /// Register a group under its own name, replacing any previous entry.
    pub fn register(&mut self, symmetry: CrystalSymmetry) -> Arc<CrystalSymmetry> {
        let shared = Arc::new(symmetry);
        self.register_shared(shared.clone());
        shared
    }

    fn register_shared(&mut self, symmetry: Arc<CrystalSymmetry>) {
        self.classes
            .insert(symmetry.name().to_ascii_lowercase(), symmetry);
    }

    /// Register an additional name for an existing group.
    pub fn register_alias(&mut self, alias: &str, symmetry: Arc<CrystalSymmetry>) {
        self.classes.insert(alias.to_ascii_lowercase(), symmetry);
    }

    pub fn get(&self, crystal_class: &str) -> Result<Arc<CrystalSymmetry>> {
        self.classes
            .get(&crystal_class.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| TrackError::UnknownCrystalClass(crystal_class.to_string()))
    }

    /// Registered names, aliases included, in sorted order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Symmetry operators of `crystal_class` as rotation matrices.
    pub fn get_symmetry_matrices(&self, crystal_class: &str) -> Result<Vec<Matrix3>> {
        Ok(self.get(crystal_class)?.matrices().to_vec())
    }

    /// All equivalents of `orientation` under the group registered as `crystal_class`.
    pub fn equivalent_orientations(
        &self,
        orientation: &Orientation,
        crystal_class: &str,
    ) -> Result<Vec<Orientation>> {
        Ok(self.get(crystal_class)?.equivalent_orientations(orientation))
    }
}
