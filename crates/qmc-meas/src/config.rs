use std::fs;
use std::path::Path;

use qmc_core::{ErrorInfo, QmcError};
use serde::{Deserialize, Serialize};

use crate::estimate::Mode;
use crate::weights::WeightTable;

/// YAML-configurable settings of a reduction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Estimator used for every pass of the run.
    #[serde(default)]
    pub mode: Mode,
    /// Flag mean leaves for compact binary encoding.
    #[serde(default)]
    pub binary_encode: bool,
    /// Compare tree shapes across processes before the first per-leaf collective.
    #[serde(default = "default_verify_structure")]
    pub verify_structure: bool,
    /// Reweighting factor per subspace, partition included.
    #[serde(default)]
    pub weights: WeightTable,
}

fn default_verify_structure() -> bool {
    true
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            binary_encode: false,
            verify_structure: default_verify_structure(),
            weights: WeightTable::default(),
        }
    }
}

impl ReductionConfig {
    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, QmcError> {
        serde_yaml::from_str(yaml)
            .map_err(|err| QmcError::Config(ErrorInfo::new("yaml-parse", err.to_string())))
    }

    /// Loads a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, QmcError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            QmcError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }
}
