//! Cross-subspace normalization of a subspace document.
//!
//! Subspaces are sampled with frequencies biased by their weights `eta`.
//! `Z_w = steps_w / eta_w` undoes that bias, and dividing by the partition
//! term `sign * Z_partition` puts every observable on the physical scale.

use qmc_core::{Communicator, ErrorInfo, QmcError, ReduceOp};
use tracing::info;

use crate::estimate::{MeanVector, Mode, Reduced};
use crate::reduce::Reducer;
use crate::schema::{self, PARTITION, SIGN, STEPS};
use crate::tree::Value;
use crate::weights::WeightTable;

/// Reduces and rescales every subspace of `document` onto one scale.
///
/// Under [`Mode::All`] only the coordinator receives numbers; the other
/// processes get the same keys with [`Value::Absent`] leaves.
pub fn normalize(
    comm: &dyn Communicator,
    document: &Value,
    weights: &WeightTable,
    mode: Mode,
    binary: bool,
) -> Result<Value, QmcError> {
    let worms = schema::validate_document(document, weights)?;
    let reducer = Reducer::new(comm, mode, binary);

    let partition = &worms[PARTITION];
    let sign = reducer
        .reduce_leaf(schema::sign_of(partition)?, 1.0)
        .map_err(|err| err.at_path(&format!("{PARTITION}/{SIGN}")))?;
    let steps_p = reducer.reduce_steps(schema::steps_of(partition, PARTITION)?)?;
    let eta_p = weights.eta(PARTITION)?;
    let local = partition_norm(&sign, &steps_p, eta_p);
    let (sign_value, sign_x_zp) = agree_on_norm(comm, local)?;
    info!(
        rank = comm.rank(),
        mode = mode.as_str(),
        subspaces = worms.len(),
        sign = sign_value,
        sign_x_zp = sign_x_zp.unwrap_or(f64::NAN),
        "normalizing subspace document"
    );

    let mut out = Value::object();
    let mut names: Vec<&String> = worms.keys().collect();
    names.sort();
    for name in names {
        let worm = &worms[name.as_str()];
        let steps_w = reducer.reduce_steps(schema::steps_of(worm, name)?)?;
        let eta_w = weights.eta(name)?;
        // processes without a result still walk the tree to keep collectives aligned
        let factor = match (&steps_w, sign_x_zp) {
            (Reduced::Present(steps), Some(norm)) => (*steps as f64 / eta_w) / norm,
            _ => 1.0,
        };

        let dest = out.entry(name)?;
        if let Value::Object(observables) = worm {
            let mut keys: Vec<&String> = observables
                .keys()
                .filter(|key| !is_reserved(name, key))
                .collect();
            keys.sort();
            for key in keys {
                let slot = dest.entry(key)?;
                let source = &observables[key.as_str()];
                reducer.reduce_into_at(slot, source, factor, &[name.as_str(), key.as_str()])?;
            }
        }
        dest.insert(
            STEPS,
            match steps_w {
                Reduced::Present(steps) => Value::Int(steps),
                Reduced::Absent => Value::Absent,
            },
        )?;
    }

    out.entry(PARTITION)?.insert(
        SIGN,
        match sign {
            Reduced::Present(mean) => Value::Mean(mean),
            Reduced::Absent => Value::Absent,
        },
    )?;
    Ok(out)
}

fn is_reserved(worm: &str, key: &str) -> bool {
    key == STEPS || (worm == PARTITION && key == SIGN)
}

/// Why the partition term cannot be used as a divisor.
#[derive(Debug)]
enum NormFailure {
    SignShape { len: usize },
    Vanishing { sign: f64, steps: i64, eta: f64 },
}

impl NormFailure {
    const SIGN_SHAPE: i64 = 1;
    const VANISHING: i64 = 2;

    fn class(&self) -> i64 {
        match self {
            NormFailure::SignShape { .. } => Self::SIGN_SHAPE,
            NormFailure::Vanishing { .. } => Self::VANISHING,
        }
    }

    fn into_error(self) -> QmcError {
        match self {
            NormFailure::SignShape { len } => {
                sign_shape_error().with_context("len", len.to_string())
            }
            NormFailure::Vanishing { sign, steps, eta } => vanishing_error()
                .with_context("sign", sign.to_string())
                .with_context("steps", steps.to_string())
                .with_context("eta", eta.to_string()),
        }
    }
}

fn sign_shape_error() -> QmcError {
    QmcError::Schema(
        ErrorInfo::new("leaf-kind", "sign must reduce to a real scalar")
            .with_context("path", format!("{PARTITION}/{SIGN}")),
    )
}

fn vanishing_error() -> QmcError {
    QmcError::Normalization(
        ErrorInfo::new("zero-normalization", "partition normalization vanishes")
            .with_hint("the partition space must be sampled with a non-zero average sign"),
    )
}

/// Local view of `sign * Z_partition`; `None` on processes without a result.
fn partition_norm(
    sign: &Reduced<MeanVector>,
    steps: &Reduced<i64>,
    eta: f64,
) -> Result<(f64, Option<f64>), NormFailure> {
    let sign_value = match sign {
        Reduced::Present(mean) => mean
            .real()
            .and_then(|values| values.first().copied())
            .ok_or(NormFailure::SignShape { len: mean.len() })?,
        Reduced::Absent => 1.0,
    };
    let Reduced::Present(steps) = *steps else {
        return Ok((sign_value, None));
    };
    let norm = sign_value * steps as f64 / eta;
    if norm == 0.0 || !norm.is_finite() {
        return Err(NormFailure::Vanishing {
            sign: sign_value,
            steps,
            eta,
        });
    }
    Ok((sign_value, Some(norm)))
}

/// Shares the outcome of [`partition_norm`] so that every process fails
/// together before any subspace is walked. The highest failure class wins.
fn agree_on_norm(
    comm: &dyn Communicator,
    local: Result<(f64, Option<f64>), NormFailure>,
) -> Result<(f64, Option<f64>), QmcError> {
    let mut class = [local.as_ref().err().map_or(0, NormFailure::class)];
    comm.all_reduce_i64(&mut class, ReduceOp::Max)?;
    match (local, class[0]) {
        (Ok(norm), 0) => Ok(norm),
        (Err(failure), agreed) if failure.class() == agreed => Err(failure.into_error()),
        (_, NormFailure::SIGN_SHAPE) => Err(sign_shape_error().with_context("detected", "peer")),
        _ => Err(vanishing_error().with_context("detected", "peer")),
    }
}
