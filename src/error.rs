//! Error taxonomy for the grain-tracking pipeline.
//!
//! Only unrecoverable conditions are errors. Per-pair and per-chain degradations
//! (a scan pair with no candidate edges, a chain too short for the configured
//! polynomial degree) are reported through [`MatchStatus`](crate::MatchStatus)
//! and [`FitStatus`](crate::FitStatus) instead.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Fatal errors that abort a mapping run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// Non-finite or malformed orientation data reached the orientation kernel.
    #[error("invalid orientation{}: {reason}", location(.scan, .region))]
    InvalidOrientation {
        scan: Option<usize>,
        region: Option<u32>,
        reason: String,
    },
    /// No symmetry group is registered under this name.
    #[error("unknown crystal class `{0}`")]
    UnknownCrystalClass(String),
    /// A symmetry operator handed to the registry is not a proper rotation.
    #[error("symmetry operator {index} of class `{class}` is not a proper rotation")]
    InvalidSymmetryOperator { class: String, index: usize },
    /// Two regions in the same scan share an id.
    #[error("duplicate grain region id {id}")]
    DuplicateRegion { id: u32 },
    /// A region record violates an ingestion invariant (area, centroid).
    #[error("grain region {id} is invalid: {reason}")]
    InvalidRegion { id: u32, reason: String },
    /// A strain value is NaN or infinite.
    #[error("non-finite strain value {0}")]
    InvalidStrain(f64),
    /// The strain list does not line up with the scans it should describe.
    #[error("expected {expected} strain values, found {found}")]
    StrainMismatch { expected: usize, found: usize },
    /// Match results were not supplied as consecutive scan pairs.
    #[error("match results out of order: expected scan pair starting at {expected}, found {found}")]
    NonSequentialMatches { expected: usize, found: usize },
    /// A configuration parameter is NaN, infinite or negative where that is not allowed.
    #[error("invalid configuration: `{field}` = {value}")]
    InvalidConfig { field: &'static str, value: f64 },
    /// The least-squares trajectory fit could not be solved.
    #[error("trajectory fit failed: {0}")]
    FitFailed(String),
    /// The worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl TrackError {
    /// Build an `InvalidOrientation` without scan context.
    pub(crate) fn invalid_orientation(reason: impl Into<String>) -> Self {
        TrackError::InvalidOrientation {
            scan: None,
            region: None,
            reason: reason.into(),
        }
    }

    /// Attach scan / region context to an `InvalidOrientation`.
    ///
    /// Other variants are returned unchanged. Context already present is kept.
    pub fn at(self, scan: Option<usize>, region: Option<u32>) -> Self {
        match self {
            TrackError::InvalidOrientation {
                scan: s,
                region: r,
                reason,
            } => TrackError::InvalidOrientation {
                scan: s.or(scan),
                region: r.or(region),
                reason,
            },
            other => other,
        }
    }
}

fn location(scan: &Option<usize>, region: &Option<u32>) -> String {
    match (scan, region) {
        (Some(s), Some(r)) => format!(" (scan {s}, region {r})"),
        (Some(s), None) => format!(" (scan {s})"),
        (None, Some(r)) => format!(" (region {r})"),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_attached_once() {
        let err = TrackError::invalid_orientation("phi1 is NaN").at(Some(3), Some(17));
        assert_eq!(
            err.to_string(),
            "invalid orientation (scan 3, region 17): phi1 is NaN"
        );

        // A second call does not overwrite the original location.
        let err = err.at(Some(9), None);
        assert!(err.to_string().contains("scan 3"));
    }

    #[test]
    fn context_is_ignored_for_other_variants() {
        let err = TrackError::UnknownCrystalClass("hexagonal".into()).at(Some(1), Some(2));
        assert_eq!(err, TrackError::UnknownCrystalClass("hexagonal".into()));
    }
}
