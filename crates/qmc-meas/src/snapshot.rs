use qmc_core::{Communicator, ErrorInfo, QmcError, SchemaVersion, SnapshotProvenance};
use serde_json::{json, Value as Json};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::ReductionConfig;
use crate::estimate::Mode;
use crate::measurements::Measurements;
use crate::normalize::normalize;
use crate::schema::{structure_hash, verify_structure};
use crate::serde::{to_canonical_json_bytes, to_json};
use crate::tree::Value;

/// Reduced document of one process at a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// How and where the snapshot was produced.
    pub provenance: SnapshotProvenance,
    /// Normalized subspace document.
    pub document: Value,
    /// Whether this process's document carries numbers worth reporting.
    pub reporting: bool,
}

impl Snapshot {
    /// JSON rendering with provenance and document.
    pub fn to_json(&self) -> Result<Json, QmcError> {
        let provenance = serde_json::to_value(&self.provenance).map_err(|err| {
            QmcError::Serde(ErrorInfo::new("json-serialize", err.to_string()))
        })?;
        Ok(json!({
            "provenance": provenance,
            "document": to_json(&self.document)?,
        }))
    }
}

/// SHA-256 of the canonical JSON rendering.
pub fn snapshot_hash(snapshot: &Snapshot) -> Result<String, QmcError> {
    let bytes = to_canonical_json_bytes(&snapshot.to_json()?)?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Runs one checkpoint: optional shape check, then normalization.
///
/// Collective; every process must call it at the same point of the run.
pub fn reduce_snapshot(
    comm: &dyn Communicator,
    measurements: &Measurements,
    config: &ReductionConfig,
) -> Result<Snapshot, QmcError> {
    let document = measurements.document()?;
    let structure = if config.verify_structure {
        verify_structure(comm, &document)?
    } else {
        structure_hash(&document)
    };
    let reduced = normalize(
        comm,
        &document,
        &config.weights,
        config.mode,
        config.binary_encode,
    )?;
    info!(
        rank = comm.rank(),
        ranks = comm.size(),
        mode = config.mode.as_str(),
        leaves = document.leaf_count(),
        "reduced checkpoint snapshot"
    );
    Ok(Snapshot {
        provenance: SnapshotProvenance {
            schema_version: SchemaVersion::default(),
            mode: config.mode.as_str().to_string(),
            rank: comm.rank(),
            ranks: comm.size(),
            binary_encode: config.binary_encode,
            structure_hash: hex::encode(structure.to_be_bytes()),
        },
        document: reduced,
        reporting: config.mode == Mode::Jackknife || comm.is_master(),
    })
}
