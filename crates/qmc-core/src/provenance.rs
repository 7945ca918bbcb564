//! Provenance and schema descriptors attached to reduced snapshots.

use serde::{Deserialize, Serialize};

/// Semantic version describing the schema of serialized snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version incremented for breaking changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
    /// Patch version incremented for bug fixes and documentation updates.
    pub patch: u32,
}

impl SchemaVersion {
    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Where and how a reduced snapshot was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SnapshotProvenance {
    /// Schema version of the reduced document.
    pub schema_version: SchemaVersion,
    /// Estimator used for the pass (`all` or `jackknife`).
    pub mode: String,
    /// Rank of the process that holds this snapshot.
    pub rank: usize,
    /// Number of cooperating processes.
    pub ranks: usize,
    /// Whether mean leaves were flagged for binary encoding.
    pub binary_encode: bool,
    /// Hex encoded structural hash of the local document before reduction.
    pub structure_hash: String,
}
