use indexmap::IndexMap;
use qmc_core::{ErrorInfo, QmcError};

use crate::sample::{fix, Observe};
use crate::schema::{PARTITION, SIGN, STEPS};
use crate::tree::Value;

/// Samples and step count collected in one subspace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WormMeasurements {
    steps: i64,
    observables: Value,
}

impl WormMeasurements {
    /// Steps attributed to the subspace so far.
    pub fn steps(&self) -> i64 {
        self.steps
    }

    /// Observable tree of the subspace.
    pub fn observables(&self) -> &Value {
        &self.observables
    }

    /// Counts `steps` more elementary moves.
    pub fn add_steps(&mut self, steps: i64) -> Result<(), QmcError> {
        if steps < 0 {
            return Err(QmcError::Measurement(
                ErrorInfo::new("negative-steps", "step counts only grow")
                    .with_context("steps", steps.to_string()),
            ));
        }
        self.steps += steps;
        Ok(())
    }

    fn record<S: Observe>(&mut self, path: &[&str], sample: S) -> Result<(), QmcError> {
        self.observables
            .slot_mut(path)
            .and_then(|slot| sample.record_into(slot))
    }

    /// Subspace node of the document: the observables plus `steps`.
    pub fn document(&self) -> Result<Value, QmcError> {
        let mut node = match &self.observables {
            Value::Empty => Value::object(),
            other => other.clone(),
        };
        node.insert(STEPS, Value::Int(self.steps))?;
        Ok(node)
    }
}

/// All measurements of one process, keyed by subspace name.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    worms: IndexMap<String, WormMeasurements>,
}

impl Default for Measurements {
    fn default() -> Self {
        Self::new()
    }
}

impl Measurements {
    /// Creates a set holding only the partition subspace.
    pub fn new() -> Self {
        let mut worms = IndexMap::new();
        worms.insert(PARTITION.to_string(), WormMeasurements::default());
        Self { worms }
    }

    /// Subspace measurements, created on first use.
    pub fn worm_mut(&mut self, name: &str) -> &mut WormMeasurements {
        self.worms.entry(name.to_string()).or_default()
    }

    /// Subspace measurements if the subspace exists.
    pub fn worm(&self, name: &str) -> Option<&WormMeasurements> {
        self.worms.get(name)
    }

    /// Subspace names in creation order.
    pub fn subspaces(&self) -> impl Iterator<Item = &str> {
        self.worms.keys().map(String::as_str)
    }

    /// Records a sample of an observable at `path` inside subspace `worm`.
    pub fn add<S: Observe>(&mut self, worm: &str, path: &[&str], sample: S) -> Result<(), QmcError> {
        let Some(&head) = path.first() else {
            return Err(QmcError::Schema(
                ErrorInfo::new("empty-path", "observables live below the subspace root")
                    .with_context("path", worm),
            ));
        };
        if head == STEPS || (worm == PARTITION && head == SIGN) {
            return Err(QmcError::Schema(
                ErrorInfo::new("reserved-key", "observable name is reserved")
                    .with_context("path", format!("{worm}/{}", path.join("/"))),
            ));
        }
        self.worm_mut(worm)
            .record(path, sample)
            .map_err(|err| err.at_path(&format!("{worm}/{}", path.join("/"))))
    }

    /// Counts steps spent in subspace `worm`.
    pub fn add_steps(&mut self, worm: &str, steps: i64) -> Result<(), QmcError> {
        self.worm_mut(worm).add_steps(steps)
    }

    /// Records the Monte Carlo sign of the partition subspace.
    pub fn add_sign(&mut self, sign: f64, multiplicity: i64) -> Result<(), QmcError> {
        self.worm_mut(PARTITION)
            .record(&[SIGN], fix(sign, multiplicity))
            .map_err(|err| err.at_path(&format!("{PARTITION}/{SIGN}")))
    }

    /// Subspace document handed to the normalizer.
    pub fn document(&self) -> Result<Value, QmcError> {
        let mut document = Value::object();
        for (name, worm) in &self.worms {
            document.insert(name, worm.document()?)?;
        }
        Ok(document)
    }
}
