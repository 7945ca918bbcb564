use std::fmt::Debug;
use std::ops::{AddAssign, SubAssign};

use num_complex::Complex64;

use crate::estimate::MeanData;

/// Element type an accumulator can sum over.
///
/// Collectives only move `f64` buffers, so every scalar knows how to flatten
/// itself into (and rebuild itself from) a run of `WIDTH` reals per element.
pub trait Scalar: Copy + Debug + PartialEq + AddAssign + SubAssign + Send + Sync + 'static {
    /// Single letter tag used in accumulator kind names (`r` or `c`).
    const KIND: &'static str;
    /// Number of `f64` lanes per element.
    const WIDTH: usize;

    /// Additive identity used for zero padding.
    fn zero() -> Self;

    /// Multiplies the element by a real factor.
    fn scale(self, factor: f64) -> Self;

    /// Flattens elements into interleaved `f64` lanes.
    fn flatten(values: &[Self]) -> Vec<f64>;

    /// Inverse of [`Scalar::flatten`].
    fn unflatten(raw: &[f64]) -> Vec<Self>;

    /// Wraps finished means into the tagged representation stored in trees.
    fn into_mean(values: Vec<Self>) -> MeanData;
}

impl Scalar for f64 {
    const KIND: &'static str = "r";
    const WIDTH: usize = 1;

    fn zero() -> Self {
        0.0
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn flatten(values: &[Self]) -> Vec<f64> {
        values.to_vec()
    }

    fn unflatten(raw: &[f64]) -> Vec<Self> {
        raw.to_vec()
    }

    fn into_mean(values: Vec<Self>) -> MeanData {
        MeanData::Real(values)
    }
}

impl Scalar for Complex64 {
    const KIND: &'static str = "c";
    const WIDTH: usize = 2;

    fn zero() -> Self {
        Complex64::new(0.0, 0.0)
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn flatten(values: &[Self]) -> Vec<f64> {
        values.iter().flat_map(|z| [z.re, z.im]).collect()
    }

    fn unflatten(raw: &[f64]) -> Vec<Self> {
        raw.chunks_exact(2)
            .map(|pair| Complex64::new(pair[0], pair[1]))
            .collect()
    }

    fn into_mean(values: Vec<Self>) -> MeanData {
        MeanData::Complex(values)
    }
}
