//! Grain maps: the per-scan collection of grain regions.
//!
//! Grain maps are produced by an external EBSD reader and handed to the core
//! as [`GrainRecord`]s, one per segmented grain. Ingestion validates the
//! records and converts the Euler angles into canonical orientations.

use std::collections::HashMap;

use crate::error::{Result, TrackError};
use crate::orientation::{EulerBunge, EulerConvention, Orientation};

/// Pre-parsed region record as supplied by the file-ingestion collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainRecord {
    /// Region id, unique within its scan only.
    pub id: u32,
    /// Centroid in sample coordinates.
    pub centroid: [f64; 2],
    /// Region area (pixel count or physical area, consistently per sequence).
    pub area: f64,
    /// Mean orientation, Euler-Bunge radians.
    pub euler: EulerBunge,
}

impl GrainRecord {
    pub fn new(id: u32, centroid: [f64; 2], area: f64, euler: EulerBunge) -> Self {
        Self {
            id,
            centroid,
            area,
            euler,
        }
    }
}

/// A validated grain region belonging to exactly one [`GrainMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct GrainRegion {
    pub id: u32,
    pub centroid: [f64; 2],
    pub area: f64,
    /// Mean orientation as reported by the indexer.
    pub orientation: Orientation,
}

impl GrainRegion {
    /// Euclidean distance between the centroids of two regions.
    pub fn centroid_distance(&self, other: &GrainRegion) -> f64 {
        let dx = self.centroid[0] - other.centroid[0];
        let dy = self.centroid[1] - other.centroid[1];
        (dx * dx + dy * dy).sqrt()
    }
}

/// One scan: an ordered set of grain regions captured at a given strain.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainMap {
    strain: f64,
    regions: Vec<GrainRegion>,
    /// Region id → position in `regions`.
    index: HashMap<u32, usize>,
}

impl GrainMap {
    /// Strain at which the scan was captured.
    pub fn strain(&self) -> f64 {
        self.strain
    }

    /// Regions in ingestion order.
    pub fn regions(&self) -> &[GrainRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Position of region `id` within [`regions`](Self::regions).
    pub fn position(&self, id: u32) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn region(&self, id: u32) -> Option<&GrainRegion> {
        self.position(id).map(|pos| &self.regions[pos])
    }

    /// Regions large enough to take part in matching, with their positions.
    pub fn eligible(&self, min_area: f64) -> impl Iterator<Item = (usize, &GrainRegion)> {
        self.regions
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.area >= min_area)
    }
}

/// Validate region records and build a grain map.
///
/// Fails on duplicate ids, non-positive or non-finite areas, non-finite
/// centroids, and non-finite Euler angles (as `InvalidOrientation` carrying
/// the offending region id).
pub fn build_grain_map(
    strain: f64,
    records: &[GrainRecord],
    convention: EulerConvention,
) -> Result<GrainMap> {
    if !strain.is_finite() {
        return Err(TrackError::InvalidStrain(strain));
    }

    let mut index = HashMap::with_capacity(records.len());
    let mut regions = Vec::with_capacity(records.len());

    for (pos, rec) in records.iter().enumerate() {
        if index.insert(rec.id, pos).is_some() {
            return Err(TrackError::DuplicateRegion { id: rec.id });
        }
        if !(rec.area.is_finite() && rec.area > 0.0) {
            return Err(TrackError::InvalidRegion {
                id: rec.id,
                reason: format!("area must be positive, got {}", rec.area),
            });
        }
        if !(rec.centroid[0].is_finite() && rec.centroid[1].is_finite()) {
            return Err(TrackError::InvalidRegion {
                id: rec.id,
                reason: "non-finite centroid".to_string(),
            });
        }
        let orientation =
            Orientation::from_euler(&rec.euler, convention).map_err(|e| e.at(None, Some(rec.id)))?;

        regions.push(GrainRegion {
            id: rec.id,
            centroid: rec.centroid,
            area: rec.area,
            orientation,
        });
    }

    Ok(GrainMap {
        strain,
        regions,
        index,
    })
}
