//! Least-squares polynomial fit of quaternion components against strain.
//!
//! Each of the four components is fitted independently:
//!
//! ```text
//! c(s) = Σ a_k · u^k,   u = (s − center) / scale,   0 ≤ k ≤ degree
//! ```
//!
//! Strain is centered and scaled before building the Vandermonde matrix so the
//! system stays well conditioned for small strain increments. The system is
//! solved by SVD.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, TrackError};

/// Fitted polynomial series for the four quaternion components `(w, x, y, z)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialSeries {
    degree: usize,
    center: f64,
    scale: f64,
    /// Coefficients per component, lowest order first.
    coeffs: [Vec<f64>; 4],
}

impl PolynomialSeries {
    /// Fit `samples` (quaternion components) against `strains` with the given degree.
    ///
    /// The caller guarantees `strains.len() == samples.len() > degree`.
    pub fn fit(strains: &[f64], samples: &[[f64; 4]], degree: usize) -> Result<Self> {
        let n = strains.len();
        let center = strains.iter().sum::<f64>() / n.max(1) as f64;
        let spread = strains
            .iter()
            .map(|s| (s - center).abs())
            .fold(0.0, f64::max);
        let scale = if spread > 0.0 { spread } else { 1.0 };

        let mut a_mat = DMatrix::<f64>::zeros(n, degree + 1);
        for (row, &s) in strains.iter().enumerate() {
            let u = (s - center) / scale;
            let mut p = 1.0;
            for col in 0..=degree {
                a_mat[(row, col)] = p;
                p *= u;
            }
        }

        let svd = a_mat.svd(true, true);
        let mut coeffs: [Vec<f64>; 4] = Default::default();
        for (c, out) in coeffs.iter_mut().enumerate() {
            let b_vec = DVector::<f64>::from_iterator(n, samples.iter().map(|q| q[c]));
            let x = svd
                .solve(&b_vec, 1e-12)
                .map_err(|e| TrackError::FitFailed(e.to_string()))?;
            *out = x.iter().copied().collect();
        }

        Ok(Self {
            degree,
            center,
            scale,
            coeffs,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Evaluate all four components at `strain` (not normalized).
    pub fn evaluate(&self, strain: f64) -> [f64; 4] {
        let u = (strain - self.center) / self.scale;
        std::array::from_fn(|c| {
            // Horner
            self.coeffs[c]
                .iter()
                .rev()
                .fold(0.0, |acc, &a| acc * u + a)
        })
    }
}
