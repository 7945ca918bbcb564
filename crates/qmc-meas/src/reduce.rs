//! Recursive collective reduction of observable trees.
//!
//! Every process must walk its tree in the same order so that the per-leaf
//! collectives line up. Object keys are visited in sorted order and array
//! entries by index, independent of the order in which producers created
//! them.

use qmc_core::{Communicator, QmcError, ReduceOp};
use tracing::debug;

use crate::accumulator::Leaf;
use crate::estimate::{MeanVector, Mode, Reduced};
use crate::tree::Value;

/// Reduction settings bound to a communicator for one pass.
#[derive(Clone, Copy)]
pub struct Reducer<'a> {
    comm: &'a dyn Communicator,
    mode: Mode,
    binary: bool,
}

impl<'a> Reducer<'a> {
    /// Creates a reducer for one pass.
    pub fn new(comm: &'a dyn Communicator, mode: Mode, binary: bool) -> Self {
        Self { comm, mode, binary }
    }

    /// Estimator used by this pass.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Reduces `source` into a fresh tree.
    pub fn reduce(&self, source: &Value, factor: f64) -> Result<Value, QmcError> {
        let mut out = Value::Empty;
        self.reduce_into(&mut out, source, factor)?;
        Ok(out)
    }

    /// Reduces `source` into `dest`, keeping destination keys the source lacks.
    pub fn reduce_into(&self, dest: &mut Value, source: &Value, factor: f64) -> Result<(), QmcError> {
        let mut path = Vec::new();
        self.walk(dest, source, factor, &mut path)
    }

    /// Like [`Reducer::reduce_into`] with errors reported below `prefix`.
    pub fn reduce_into_at(
        &self,
        dest: &mut Value,
        source: &Value,
        factor: f64,
        prefix: &[&str],
    ) -> Result<(), QmcError> {
        let mut path: Vec<String> = prefix.iter().map(|key| key.to_string()).collect();
        self.walk(dest, source, factor, &mut path)
    }

    /// Combines a single accumulator.
    pub fn reduce_leaf(&self, leaf: &Leaf, factor: f64) -> Result<Reduced<MeanVector>, QmcError> {
        leaf.combine(self.comm, factor, self.mode, self.binary)
    }

    /// Combines a step counter: the global total on the coordinator in
    /// [`Mode::All`], the leave-one-out total on every process in
    /// [`Mode::Jackknife`].
    pub fn reduce_steps(&self, steps: i64) -> Result<Reduced<i64>, QmcError> {
        let mut total = [steps];
        match self.mode {
            Mode::All => {
                let holds = self
                    .comm
                    .reduce_i64(&mut total, ReduceOp::Sum, self.comm.master())?;
                Ok(if holds {
                    Reduced::Present(total[0])
                } else {
                    Reduced::Absent
                })
            }
            Mode::Jackknife => {
                self.comm.all_reduce_i64(&mut total, ReduceOp::Sum)?;
                Ok(Reduced::Present(total[0] - steps))
            }
        }
    }

    fn walk(
        &self,
        dest: &mut Value,
        source: &Value,
        factor: f64,
        path: &mut Vec<String>,
    ) -> Result<(), QmcError> {
        match source {
            Value::Leaf(leaf) => {
                debug!(
                    path = %path.join("/"),
                    kind = leaf.kind(),
                    count = leaf.count(),
                    mode = self.mode.as_str(),
                    factor,
                    "reducing leaf"
                );
                let reduced = self
                    .reduce_leaf(leaf, factor)
                    .map_err(|err| err.at_path(&path.join("/")))?;
                *dest = match reduced {
                    Reduced::Present(mean) => Value::Mean(mean),
                    Reduced::Absent => Value::Absent,
                };
            }
            Value::Object(entries) => {
                let out = dest.ensure_object();
                let mut keys: Vec<&String> = entries.keys().collect();
                keys.sort();
                for key in keys {
                    path.push(key.clone());
                    let slot = out.entry(key.clone()).or_default();
                    self.walk(slot, &entries[key.as_str()], factor, path)?;
                    path.pop();
                }
            }
            Value::Array(items) => {
                let out = dest.ensure_array(items.len());
                for (index, (slot, item)) in out.iter_mut().zip(items).enumerate() {
                    path.push(index.to_string());
                    self.walk(slot, item, factor, path)?;
                    path.pop();
                }
            }
            other => *dest = other.clone(),
        }
        Ok(())
    }
}

/// Reduces a whole tree in one call.
pub fn reduce(
    comm: &dyn Communicator,
    source: &Value,
    factor: f64,
    mode: Mode,
    binary: bool,
) -> Result<Value, QmcError> {
    Reducer::new(comm, mode, binary).reduce(source, factor)
}
