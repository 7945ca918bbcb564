use qmc_core::{Communicator, QmcError, ReduceOp};
use serde::{Deserialize, Serialize};

/// Point estimate with its statistical error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorBar {
    /// Mean of the jackknife estimates.
    pub mean: f64,
    /// Jackknife standard error.
    pub error: f64,
}

/// Error bar from a gathered set of P leave-one-out estimates:
/// `sqrt((P - 1) / P * sum((x_i - mean)^2))`.
pub fn jackknife_error(estimates: &[f64]) -> Option<ErrorBar> {
    if estimates.is_empty() {
        return None;
    }
    let count = estimates.len() as f64;
    let mean = estimates.iter().sum::<f64>() / count;
    let spread = estimates.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    Some(ErrorBar {
        mean,
        error: ((count - 1.0) / count * spread).sqrt(),
    })
}

/// Elementwise jackknife error bars of the per-process estimates `local`,
/// computed with a single sum all-reduce. Every process gets the result.
pub fn jackknife_error_collective(
    comm: &dyn Communicator,
    local: &[f64],
) -> Result<Vec<ErrorBar>, QmcError> {
    let len = local.len();
    let mut moments: Vec<f64> = local
        .iter()
        .copied()
        .chain(local.iter().map(|x| x * x))
        .collect();
    comm.all_reduce_f64(&mut moments, ReduceOp::Sum)?;

    let count = comm.size() as f64;
    Ok((0..len)
        .map(|index| {
            let sum = moments[index];
            let squares = moments[len + index];
            let mean = sum / count;
            let spread = (squares - sum * mean).max(0.0);
            ErrorBar {
                mean,
                error: ((count - 1.0) / count * spread).sqrt(),
            }
        })
        .collect())
}
