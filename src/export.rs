//! Flat, serializable snapshot of a mapping run.
//!
//! Downstream reporting (CSV writers, plotting) consumes [`MappingExport`]
//! rather than the in-memory run. Snapshots serialize with rkyv so a run can be
//! stored and reloaded without recomputation.

use rkyv::{Archive, Deserialize, Serialize};
use tracing::info;

use crate::orientation::EulerConvention;
use crate::pipeline::MappingRun;

/// One trajectory point, Euler-Bunge radians.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub grain: u32,
    pub scan: u32,
    pub region_id: u32,
    pub strain: f64,
    pub smoothed: [f64; 3],
    pub measured: [f64; 3],
    pub reorientation: f64,
    /// Polynomial degree actually used for the chain.
    pub degree: u32,
    /// The chain was fitted with less than the requested degree.
    pub degraded: bool,
}

/// One candidate edge with its error contributions.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct EdgeRow {
    pub scan: u32,
    pub source_id: u32,
    pub target_id: u32,
    pub spatial_error: f64,
    pub orientation_error: f64,
    pub weight: f64,
    pub outcome: String,
}

/// Serializable view of a [`MappingRun`].
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct MappingExport {
    pub trajectories: Vec<TrajectoryRow>,
    /// Empty unless the run was made with `export_errors`.
    pub edges: Vec<EdgeRow>,
}

impl MappingExport {
    /// Flatten a run. Euler angles are expressed in `convention`.
    pub fn from_run(run: &MappingRun, convention: EulerConvention) -> Self {
        let trajectories = run
            .trajectories
            .iter()
            .flat_map(|t| {
                t.points.iter().map(move |p| TrajectoryRow {
                    grain: t.chain_id,
                    scan: p.scan as u32,
                    region_id: p.region_id,
                    strain: p.strain,
                    smoothed: p.smoothed.euler(convention).to_array(),
                    measured: p.measured.euler(convention).to_array(),
                    reorientation: p.reorientation,
                    degree: t.provenance.used_degree as u32,
                    degraded: t.provenance.is_underdetermined(),
                })
            })
            .collect();

        let edges = run
            .match_results
            .iter()
            .flat_map(|r| {
                r.edge_records.iter().flatten().map(move |e| EdgeRow {
                    scan: r.scan_index as u32,
                    source_id: e.source_id,
                    target_id: e.target_id,
                    spatial_error: e.spatial_error,
                    orientation_error: e.orientation_error,
                    weight: e.weight,
                    outcome: e.outcome.as_str().to_string(),
                })
            })
            .collect();

        Self {
            trajectories,
            edges,
        }
    }

    /// Serialize the snapshot using rkyv.
    pub fn to_rkyv_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| anyhow::anyhow!("rkyv serialization failed: {}", e))?;
        Ok(bytes.to_vec())
    }

    /// Deserialize a snapshot produced by [`to_rkyv_bytes`](Self::to_rkyv_bytes).
    pub fn from_rkyv_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        // Archived data must be aligned; plain byte buffers carry no such guarantee.
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        let export = rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| anyhow::anyhow!("rkyv deserialization failed: {}", e))?;
        Ok(export)
    }

    /// Save the snapshot to a file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let bytes = self.to_rkyv_bytes()?;
        std::fs::write(path, &bytes)?;
        info!("Saved mapping export to {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    /// Load a snapshot from a file.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let export = Self::from_rkyv_bytes(&bytes)?;
        info!(
            "Loaded mapping export: {} trajectory rows, {} edges",
            export.trajectories.len(),
            export.edges.len()
        );
        Ok(export)
    }
}
