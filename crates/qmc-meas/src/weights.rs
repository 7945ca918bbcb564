use std::collections::BTreeMap;

use qmc_core::{ErrorInfo, QmcError};
use serde::{Deserialize, Serialize};

/// Reweighting factor (`eta`) per subspace, supplied once per run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable(BTreeMap<String, f64>);

impl WeightTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insertion.
    pub fn with(mut self, subspace: impl Into<String>, eta: f64) -> Self {
        self.insert(subspace, eta);
        self
    }

    /// Sets the weight of a subspace.
    pub fn insert(&mut self, subspace: impl Into<String>, eta: f64) {
        self.0.insert(subspace.into(), eta);
    }

    /// Number of subspaces with a weight.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weight of a subspace that is about to be used as a divisor.
    pub fn eta(&self, subspace: &str) -> Result<f64, QmcError> {
        let Some(&eta) = self.0.get(subspace) else {
            return Err(QmcError::Config(
                ErrorInfo::new("missing-weight", "no weight supplied for subspace")
                    .with_context("subspace", subspace)
                    .with_hint("the weight table needs one entry per sampled subspace"),
            ));
        };
        if !eta.is_finite() {
            return Err(QmcError::Normalization(
                ErrorInfo::new("non-finite-weight", "subspace weight is not finite")
                    .with_context("subspace", subspace)
                    .with_context("eta", eta.to_string()),
            ));
        }
        if eta == 0.0 {
            return Err(QmcError::Normalization(
                ErrorInfo::new("zero-weight", "subspace weight is zero")
                    .with_context("subspace", subspace),
            ));
        }
        Ok(eta)
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for WeightTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, eta)| (name.into(), eta)).collect())
    }
}
