//! Orientation kernel: Euler-Bunge angles, rotation matrices and unit quaternions.
//!
//! Orientations are stored canonically as the unit quaternion of the passive
//! (sample → crystal) orientation matrix
//!
//! ```text
//! g = Rz(φ2) · Rx(Φ) · Rz(φ1)
//!
//!     ⎡  c1·c2 − s1·s2·C    s1·c2 + c1·s2·C    s2·S ⎤
//! g = ⎢ −c1·s2 − s1·c2·C   −s1·s2 + c1·c2·C    c2·S ⎥
//!     ⎣  s1·S              −c1·S               C    ⎦
//! ```
//!
//! where `c1 = cos φ1`, `S = sin Φ` and so on. Crystal symmetry acts on the
//! crystal side of `g` (left multiplication).
//!
//! Whether an EBSD indexer reports `g` or its inverse is a property of the
//! acquisition software, so every Euler conversion takes an [`EulerConvention`].

use std::f64::consts::{PI, TAU};

use nalgebra::{Quaternion as RawQuaternion, Rotation3};

use crate::error::{Result, TrackError};
use crate::{Matrix3, Quaternion};

/// Below this value of `sin Φ` the Euler decomposition is treated as gimbal-locked.
const GIMBAL_EPS: f64 = 1e-10;

/// Tolerance for accepting a 3×3 matrix as a proper rotation.
const ROTATION_TOL: f64 = 1e-6;

/// Euler angles in the Bunge (z-x-z) convention, radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerBunge {
    pub phi1: f64,
    /// Φ, the tilt about the rotated x-axis.
    pub phi: f64,
    pub phi2: f64,
}

impl EulerBunge {
    pub fn new(phi1: f64, phi: f64, phi2: f64) -> Self {
        Self { phi1, phi, phi2 }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.phi1, self.phi, self.phi2]
    }

    pub fn is_finite(&self) -> bool {
        self.phi1.is_finite() && self.phi.is_finite() && self.phi2.is_finite()
    }
}

impl From<[f64; 3]> for EulerBunge {
    fn from(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

/// How a set of Euler angles relates to the stored orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EulerConvention {
    /// Angles describe the passive sample → crystal matrix `g`.
    #[default]
    Passive,
    /// Angles describe the active rotation, i.e. `gᵀ`.
    Active,
}

/// A crystallographic orientation, stored as a unit quaternion.
///
/// `q` and `−q` describe the same orientation; the stored sign is whatever the
/// producing conversion returned and is never relied upon except by the
/// trajectory fit, which fixes hemispheres explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    q: Quaternion,
}

impl Orientation {
    pub fn identity() -> Self {
        Self {
            q: Quaternion::identity(),
        }
    }

    /// Wrap an existing unit quaternion, rejecting non-finite components.
    pub fn from_quaternion(q: Quaternion) -> Result<Self> {
        check_quaternion(&q)?;
        Ok(Self { q })
    }

    /// Build from raw `(w, x, y, z)` components. The input is normalized.
    pub fn from_components(w: f64, x: f64, y: f64, z: f64) -> Result<Self> {
        if !(w.is_finite() && x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(TrackError::invalid_orientation(format!(
                "non-finite quaternion ({w}, {x}, {y}, {z})"
            )));
        }
        let q = Quaternion::try_new(RawQuaternion::new(w, x, y, z), 1e-12).ok_or_else(|| {
            TrackError::invalid_orientation("quaternion has zero norm")
        })?;
        Ok(Self { q })
    }

    pub fn from_euler(euler: &EulerBunge, convention: EulerConvention) -> Result<Self> {
        euler_to_quaternion(euler, convention).map(|q| Self { q })
    }

    /// Build from the passive orientation matrix `g`.
    pub fn from_matrix(g: &Matrix3) -> Result<Self> {
        check_rotation(g)?;
        let rot = Rotation3::from_matrix_unchecked(*g);
        Ok(Self {
            q: Quaternion::from_rotation_matrix(&rot),
        })
    }

    pub fn quaternion(&self) -> &Quaternion {
        &self.q
    }

    /// Components as `[w, x, y, z]`.
    pub fn components(&self) -> [f64; 4] {
        [self.q.w, self.q.i, self.q.j, self.q.k]
    }

    /// Passive orientation matrix `g`.
    pub fn matrix(&self) -> Matrix3 {
        self.q.to_rotation_matrix().into_inner()
    }

    pub fn euler(&self, convention: EulerConvention) -> EulerBunge {
        // Stored quaternions are always finite, so the conversion cannot fail.
        let g = self.matrix();
        let g = match convention {
            EulerConvention::Passive => g,
            EulerConvention::Active => g.transpose(),
        };
        decompose_passive(&g)
    }

    pub fn inverse(&self) -> Self {
        Self {
            q: self.q.inverse(),
        }
    }

    /// The same rotation with the opposite quaternion sign.
    pub fn negated(&self) -> Self {
        Self {
            q: Quaternion::new_unchecked(-self.q.into_inner()),
        }
    }

    /// Apply a crystal symmetry operator (left multiplication on `g`).
    pub fn symmetric(&self, op: &Quaternion) -> Self {
        Self { q: op * self.q }
    }

    /// Geodesic distance to another orientation, ignoring crystal symmetry.
    pub fn angle_to(&self, other: &Orientation) -> f64 {
        geodesic_distance(&self.q, &other.q)
    }
}

// ── Kernel functions ────────────────────────────────────────────────────────

/// Euler-Bunge angles → unit quaternion.
pub fn euler_to_quaternion(euler: &EulerBunge, convention: EulerConvention) -> Result<Quaternion> {
    let m = euler_to_matrix(euler, convention)?;
    Ok(Quaternion::from_rotation_matrix(
        &Rotation3::from_matrix_unchecked(m),
    ))
}

/// Unit quaternion → Euler-Bunge angles.
///
/// φ1 and φ2 are returned in `[0, 2π)` and Φ in `[0, π]`. At gimbal lock the
/// whole in-plane rotation is assigned to φ1 and φ2 is zero.
pub fn quaternion_to_euler(q: &Quaternion, convention: EulerConvention) -> Result<EulerBunge> {
    check_quaternion(q)?;
    Ok(Orientation { q: *q }.euler(convention))
}

/// Euler-Bunge angles → rotation matrix (`g` for passive, `gᵀ` for active).
pub fn euler_to_matrix(euler: &EulerBunge, convention: EulerConvention) -> Result<Matrix3> {
    if !euler.is_finite() {
        return Err(TrackError::invalid_orientation(format!(
            "non-finite Euler angles ({}, {}, {})",
            euler.phi1, euler.phi, euler.phi2
        )));
    }
    let (s1, c1) = euler.phi1.sin_cos();
    let (s, c) = euler.phi.sin_cos();
    let (s2, c2) = euler.phi2.sin_cos();

    #[rustfmt::skip]
    let g = Matrix3::new(
        c1 * c2 - s1 * s2 * c,   s1 * c2 + c1 * s2 * c,  s2 * s,
        -c1 * s2 - s1 * c2 * c,  -s1 * s2 + c1 * c2 * c, c2 * s,
        s1 * s,                  -c1 * s,                c,
    );
    Ok(match convention {
        EulerConvention::Passive => g,
        EulerConvention::Active => g.transpose(),
    })
}

/// Rotation matrix → Euler-Bunge angles. Inverse of [`euler_to_matrix`].
pub fn matrix_to_euler(m: &Matrix3, convention: EulerConvention) -> Result<EulerBunge> {
    check_rotation(m)?;
    let g = match convention {
        EulerConvention::Passive => *m,
        EulerConvention::Active => m.transpose(),
    };
    Ok(decompose_passive(&g))
}

/// Shortest rotation angle between two unit quaternions, in `[0, π]`.
///
/// Equal to `2·acos(|⟨q1, q2⟩|)`. It is evaluated as `2·atan2(|v|, |w|)` of the
/// relative rotation `q1⁻¹·q2`, whose scalar part is that same dot product;
/// the atan2 form keeps full precision for nearly identical orientations.
pub fn geodesic_distance(q1: &Quaternion, q2: &Quaternion) -> f64 {
    let rel = q1.inverse() * q2;
    2.0 * rel.imag().norm().atan2(rel.scalar().abs())
}

/// Algebraic inverse rotation.
pub fn inverse(orientation: &Orientation) -> Orientation {
    orientation.inverse()
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn decompose_passive(g: &Matrix3) -> EulerBunge {
    let sin_phi = (g[(2, 0)] * g[(2, 0)] + g[(2, 1)] * g[(2, 1)]).sqrt();

    let (phi1, phi, phi2) = if sin_phi > GIMBAL_EPS {
        (
            g[(2, 0)].atan2(-g[(2, 1)]),
            sin_phi.atan2(g[(2, 2)]),
            g[(0, 2)].atan2(g[(1, 2)]),
        )
    } else {
        // Φ = 0: g11 = cos(φ1+φ2). Φ = π: g11 = cos(φ1−φ2). Either way the
        // combined angle is atan2(g12, g11) once φ2 is pinned to zero.
        let phi = if g[(2, 2)] > 0.0 { 0.0 } else { PI };
        (g[(0, 1)].atan2(g[(0, 0)]), phi, 0.0)
    };

    EulerBunge::new(wrap_tau(phi1), phi, wrap_tau(phi2))
}

fn wrap_tau(angle: f64) -> f64 {
    let w = angle.rem_euclid(TAU);
    if w >= TAU {
        0.0
    } else {
        w
    }
}

fn check_quaternion(q: &Quaternion) -> Result<()> {
    if q.coords.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(TrackError::invalid_orientation(format!(
            "non-finite quaternion {:?}",
            q.coords.as_slice()
        )))
    }
}

fn check_rotation(m: &Matrix3) -> Result<()> {
    if !m.iter().all(|v| v.is_finite()) {
        return Err(TrackError::invalid_orientation("non-finite rotation matrix"));
    }
    let orthonormal = (m * m.transpose() - Matrix3::identity()).amax() < ROTATION_TOL;
    if !orthonormal || (m.determinant() - 1.0).abs() > ROTATION_TOL {
        return Err(TrackError::invalid_orientation(
            "matrix is not a proper rotation",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn angle_grid() -> Vec<EulerBunge> {
        let mut out = Vec::new();
        for i in 0..7 {
            for j in 0..5 {
                for k in 0..7 {
                    out.push(EulerBunge::new(
                        0.1 + i as f64 * 0.87,
                        0.05 + j as f64 * 0.74,
                        0.2 + k as f64 * 0.85,
                    ));
                }
            }
        }
        out
    }

    #[test]
    fn euler_quaternion_round_trip_passive() {
        for e in angle_grid() {
            let q = euler_to_quaternion(&e, EulerConvention::Passive).unwrap();
            let back = quaternion_to_euler(&q, EulerConvention::Passive).unwrap();
            assert_relative_eq!(back.phi1, e.phi1, epsilon = 1e-9);
            assert_relative_eq!(back.phi, e.phi, epsilon = 1e-9);
            assert_relative_eq!(back.phi2, e.phi2, epsilon = 1e-9);
        }
    }

    #[test]
    fn euler_quaternion_round_trip_active() {
        for e in angle_grid() {
            let q = euler_to_quaternion(&e, EulerConvention::Active).unwrap();
            let back = quaternion_to_euler(&q, EulerConvention::Active).unwrap();
            assert_relative_eq!(back.phi1, e.phi1, epsilon = 1e-9);
            assert_relative_eq!(back.phi, e.phi, epsilon = 1e-9);
            assert_relative_eq!(back.phi2, e.phi2, epsilon = 1e-9);
        }
    }

    #[test]
    fn conventions_are_mutually_inverse() {
        let e = EulerBunge::new(0.3, 1.1, 2.4);
        let passive = euler_to_quaternion(&e, EulerConvention::Passive).unwrap();
        let active = euler_to_quaternion(&e, EulerConvention::Active).unwrap();
        assert!(geodesic_distance(&passive.inverse(), &active) < 1e-12);
    }

    #[test]
    fn matrix_matches_bunge_definition() {
        let g = euler_to_matrix(
            &EulerBunge::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0),
            EulerConvention::Passive,
        )
        .unwrap();
        let expected = Matrix3::new(0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(g, expected, epsilon = 1e-12);

        let back = matrix_to_euler(&g, EulerConvention::Passive).unwrap();
        assert_relative_eq!(back.phi1, std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn gimbal_lock_preserves_orientation() {
        for &(e, phi_expected) in &[
            (EulerBunge::new(0.4, 0.0, 0.7), 0.0),
            (EulerBunge::new(0.4, PI, 0.7), PI),
        ] {
            let q = euler_to_quaternion(&e, EulerConvention::Passive).unwrap();
            let back = quaternion_to_euler(&q, EulerConvention::Passive).unwrap();
            assert_eq!(back.phi, phi_expected);
            assert_eq!(back.phi2, 0.0);
            let q_back = euler_to_quaternion(&back, EulerConvention::Passive).unwrap();
            assert!(geodesic_distance(&q, &q_back) < 1e-9);
        }
    }

    #[test]
    fn geodesic_distance_basics() {
        let a = euler_to_quaternion(&EulerBunge::new(0.1, 0.2, 0.3), EulerConvention::Passive)
            .unwrap();
        let b = euler_to_quaternion(&EulerBunge::new(1.1, 0.9, 2.3), EulerConvention::Passive)
            .unwrap();
        assert!(geodesic_distance(&a, &a) < 1e-12);
        assert_relative_eq!(geodesic_distance(&a, &b), geodesic_distance(&b, &a), epsilon = 1e-12);

        // Double cover: q and −q are the same rotation.
        let neg = Quaternion::new_unchecked(-a.into_inner());
        assert!(geodesic_distance(&a, &neg) < 1e-12);

        // A pure rotation about z by θ is at distance θ from identity.
        let rz = Quaternion::from_axis_angle(&nalgebra::Vector3::z_axis(), 0.25);
        assert_relative_eq!(
            geodesic_distance(&Quaternion::identity(), &rz),
            0.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn negated_is_the_same_rotation() {
        let o = Orientation::from_euler(&EulerBunge::new(0.7, 1.2, 2.9), EulerConvention::Passive)
            .unwrap();
        let n = o.negated();
        let (a, b) = (o.components(), n.components());
        for c in 0..4 {
            assert_eq!(b[c], -a[c]);
        }
        assert!(o.angle_to(&n) < 1e-12);
        assert_relative_eq!(n.matrix(), o.matrix(), epsilon = 1e-12);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let err = euler_to_quaternion(&EulerBunge::new(f64::NAN, 0.0, 0.0), EulerConvention::Passive)
            .unwrap_err();
        assert!(matches!(err, TrackError::InvalidOrientation { .. }));

        assert!(Orientation::from_components(1.0, f64::INFINITY, 0.0, 0.0).is_err());
        assert!(Orientation::from_components(0.0, 0.0, 0.0, 0.0).is_err());
        assert!(matrix_to_euler(&Matrix3::from_element(f64::NAN), EulerConvention::Passive).is_err());
        assert!(Orientation::from_matrix(&(Matrix3::identity() * 2.0)).is_err());
    }

    #[test]
    fn inverse_composes_to_identity() {
        let o = Orientation::from_euler(&EulerBunge::new(0.5, 0.6, 0.7), EulerConvention::Passive)
            .unwrap();
        let prod = o.quaternion() * inverse(&o).quaternion();
        assert!(geodesic_distance(&prod, &Quaternion::identity()) < 1e-12);
    }
}
