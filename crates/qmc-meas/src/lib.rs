#![deny(missing_docs)]

//! Measurement accumulation and cross-process reduction for Monte Carlo runs.
//!
//! Producers record samples into per-subspace observable trees. At a
//! checkpoint every process walks its tree in lockstep, the accumulators are
//! combined through a [`qmc_core::Communicator`] (either as one global mean
//! or as delete-one jackknife estimates) and the subspaces are rescaled onto
//! the partition function of the reference subspace.
//!
//! ```
//! use qmc_core::SingleProcess;
//! use qmc_meas::{fix, normalize, Measurements, Mode, WeightTable};
//!
//! let mut measurements = Measurements::new();
//! measurements.add_steps("partition", 10)?;
//! measurements.add_sign(10.0, 10)?;
//! measurements.add("partition", &["energy"], fix(-5.0, 10))?;
//!
//! let weights = WeightTable::new().with("partition", 1.0);
//! let document = measurements.document()?;
//! let reduced = normalize(&SingleProcess, &document, &weights, Mode::All, false)?;
//!
//! let energy = reduced.at(&["partition", "energy"]).and_then(|node| node.as_mean());
//! let energy = energy.and_then(|mean| mean.real()).map(|values| values[0]);
//! assert!((energy.unwrap_or(f64::NAN) + 0.5).abs() < 1e-12);
//! # Ok::<(), qmc_core::QmcError>(())
//! ```

/// Running sums with fixed or growable length and their collective combine.
pub mod accumulator;
/// YAML configuration of a reduction pass.
pub mod config;
/// Estimator modes and reduced leaf values.
pub mod estimate;
/// Producer side registry of per-subspace measurements.
pub mod measurements;
/// Cross-subspace normalization.
pub mod normalize;
/// Recursive tree reduction.
pub mod reduce;
/// Samples tagged with multiplicity and growth policy.
pub mod sample;
/// Real and complex element types.
pub mod scalar;
/// Reserved document keys and structural verification.
pub mod schema;
/// JSON export and canonical encodings.
pub mod serde;
/// Checkpoint driver and snapshot hashing.
pub mod snapshot;
/// Jackknife error bars.
pub mod stats;
/// Dynamically typed observable tree.
pub mod tree;
/// Per-subspace reweighting factors.
pub mod weights;

pub use accumulator::{
    Accumulator, CVecFix, CVecVar, Fixed, GrowthPolicy, Leaf, RVecFix, RVecVar, Slot, Variable,
};
pub use config::ReductionConfig;
pub use estimate::{MeanData, MeanVector, Mode, Reduced};
pub use measurements::{Measurements, WormMeasurements};
pub use normalize::normalize;
pub use reduce::{reduce, Reducer};
pub use sample::{fix, var, Observe, Sample, SampleValue};
pub use scalar::Scalar;
pub use snapshot::{reduce_snapshot, snapshot_hash, Snapshot};
pub use stats::{jackknife_error, jackknife_error_collective, ErrorBar};
pub use tree::Value;
pub use weights::WeightTable;
