use std::fmt::Debug;
use std::marker::PhantomData;

use num_complex::Complex64;
use qmc_core::{Communicator, ErrorInfo, QmcError, ReduceOp};

use crate::estimate::{MeanVector, Mode, Reduced};
use crate::scalar::Scalar;

/// How the length of an accumulator's running sum may evolve.
pub trait GrowthPolicy: Copy + Default + Debug + PartialEq + Send + Sync + 'static {
    /// Short tag used in accumulator kind names (`fix` or `var`).
    const NAME: &'static str;

    /// Makes `sum` ready to absorb a sample of `incoming` elements.
    fn prepare<T: Scalar>(sum: &mut Vec<T>, incoming: usize) -> Result<(), QmcError>;

    /// Agrees on the vector length every process reduces over.
    fn unify_len(comm: &dyn Communicator, local: usize) -> Result<usize, QmcError>;
}

/// Length is set by the first sample and never changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fixed;

/// Length grows to the longest sample seen, shorter sums are zero padded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Variable;

impl GrowthPolicy for Fixed {
    const NAME: &'static str = "fix";

    fn prepare<T: Scalar>(sum: &mut Vec<T>, incoming: usize) -> Result<(), QmcError> {
        if sum.is_empty() {
            sum.resize(incoming, T::zero());
        }
        if sum.len() != incoming {
            return Err(QmcError::Shape(
                ErrorInfo::new(
                    "shape-mismatch",
                    format!("{}vec{}: mismatch in array size", T::KIND, Self::NAME),
                )
                .with_context("established", sum.len().to_string())
                .with_context("incoming", incoming.to_string()),
            ));
        }
        Ok(())
    }

    /// Ranks that never sampled the observable still hold an empty sum and
    /// are padded; two different established lengths fail on every rank.
    fn unify_len(comm: &dyn Communicator, local: usize) -> Result<usize, QmcError> {
        let len = local as i64;
        let mut probe = [len, if len > 0 { -len } else { i64::MIN }];
        comm.all_reduce_i64(&mut probe, ReduceOp::Max)?;
        let longest = probe[0].max(0);
        if longest > 0 && probe[1] != -longest {
            return Err(QmcError::Shape(
                ErrorInfo::new("shape-mismatch", "vecfix: ranks disagree on the array size")
                    .with_context("local", local.to_string())
                    .with_context("longest", longest.to_string())
                    .with_context("shortest", (-probe[1]).to_string()),
            ));
        }
        Ok(longest as usize)
    }
}

impl GrowthPolicy for Variable {
    const NAME: &'static str = "var";

    fn prepare<T: Scalar>(sum: &mut Vec<T>, incoming: usize) -> Result<(), QmcError> {
        if incoming > sum.len() {
            sum.resize(incoming, T::zero());
        }
        Ok(())
    }

    fn unify_len(comm: &dyn Communicator, local: usize) -> Result<usize, QmcError> {
        let mut len = [local as i64];
        comm.all_reduce_i64(&mut len, ReduceOp::Max)?;
        Ok(len[0].max(0) as usize)
    }
}

/// Running elementwise sum of samples and the number of draws behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator<T, P> {
    sum: Vec<T>,
    count: i64,
    policy: PhantomData<P>,
}

impl<T: Scalar, P: GrowthPolicy> Default for Accumulator<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar, P: GrowthPolicy> Accumulator<T, P> {
    /// Creates an accumulator that has not seen any sample.
    pub fn new() -> Self {
        Self {
            sum: Vec::new(),
            count: 0,
            policy: PhantomData,
        }
    }

    /// Kind name such as `rvecfix` or `cvecvar`.
    pub fn kind() -> String {
        format!("{}vec{}", T::KIND, P::NAME)
    }

    /// Running elementwise sum.
    pub fn sum(&self) -> &[T] {
        &self.sum
    }

    /// Total multiplicity absorbed so far.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Adds one sample worth `multiplicity` elementary draws.
    pub fn add(&mut self, values: &[T], multiplicity: i64) -> Result<(), QmcError> {
        if multiplicity < 0 {
            return Err(QmcError::Measurement(
                ErrorInfo::new(
                    "negative-multiplicity",
                    format!("{}: multiplicity must not be negative", Self::kind()),
                )
                .with_context("multiplicity", multiplicity.to_string()),
            ));
        }
        P::prepare(&mut self.sum, values.len())?;
        for (slot, value) in self.sum.iter_mut().zip(values) {
            *slot += *value;
        }
        self.count += multiplicity;
        Ok(())
    }

    /// Collective mean over every process, delivered to the coordinator only.
    ///
    /// The count is combined on every rank so that an empty measurement fails
    /// everywhere at once instead of on the coordinator alone.
    pub fn combine_all(
        &self,
        comm: &dyn Communicator,
        factor: f64,
        binary: bool,
    ) -> Result<Reduced<MeanVector>, QmcError> {
        let mut count = [self.count];
        comm.all_reduce_i64(&mut count, ReduceOp::Sum)?;

        let mut raw = self.padded(comm)?;
        let holds = comm.reduce_f64(&mut raw, ReduceOp::Sum, comm.master())?;

        if count[0] == 0 {
            return Err(self.empty_measurement(Mode::All, count[0]));
        }
        if !holds {
            return Ok(Reduced::Absent);
        }
        Ok(Reduced::Present(finish::<T>(&raw, factor / count[0] as f64, binary)))
    }

    /// Collective delete-one estimate: global sums minus this process's own.
    ///
    /// If any process holds every sample, its leave-one-out set is empty and
    /// all processes fail together before the sums are exchanged.
    pub fn combine_jackknife(
        &self,
        comm: &dyn Communicator,
        factor: f64,
        binary: bool,
    ) -> Result<Reduced<MeanVector>, QmcError> {
        let mut count = [self.count];
        comm.all_reduce_i64(&mut count, ReduceOp::Sum)?;
        let mut largest = [self.count];
        comm.all_reduce_i64(&mut largest, ReduceOp::Max)?;

        let remaining = count[0] - self.count;
        if largest[0] == count[0] {
            return Err(self
                .empty_measurement(Mode::Jackknife, remaining)
                .with_context("total", count[0].to_string()));
        }

        let mut raw = self.padded(comm)?;
        comm.all_reduce_f64(&mut raw, ReduceOp::Sum)?;
        for (slot, own) in raw.iter_mut().zip(T::flatten(&self.sum)) {
            *slot -= own;
        }
        Ok(Reduced::Present(finish::<T>(&raw, factor / remaining as f64, binary)))
    }

    /// Dispatches to the estimator selected by `mode`.
    pub fn combine(
        &self,
        comm: &dyn Communicator,
        factor: f64,
        mode: Mode,
        binary: bool,
    ) -> Result<Reduced<MeanVector>, QmcError> {
        match mode {
            Mode::All => self.combine_all(comm, factor, binary),
            Mode::Jackknife => self.combine_jackknife(comm, factor, binary),
        }
    }

    fn padded(&self, comm: &dyn Communicator) -> Result<Vec<f64>, QmcError> {
        let len = P::unify_len(comm, self.sum.len())?;
        let mut data = self.sum.clone();
        data.resize(len, T::zero());
        Ok(T::flatten(&data))
    }

    fn empty_measurement(&self, mode: Mode, total: i64) -> QmcError {
        QmcError::Measurement(
            ErrorInfo::new(
                "empty-measurement",
                format!("{}: no measurements taken", Self::kind()),
            )
            .with_context("mode", mode.as_str())
            .with_context("count", total.to_string())
            .with_hint("the observable is configured but was never sampled"),
        )
    }
}

fn finish<T: Scalar>(raw: &[f64], scale: f64, binary: bool) -> MeanVector {
    let means = T::unflatten(raw)
        .into_iter()
        .map(|value| value.scale(scale))
        .collect();
    MeanVector::new(T::into_mean(means), binary)
}

/// Real, fixed length.
pub type RVecFix = Accumulator<f64, Fixed>;
/// Complex, fixed length.
pub type CVecFix = Accumulator<Complex64, Fixed>;
/// Real, growable.
pub type RVecVar = Accumulator<f64, Variable>;
/// Complex, growable.
pub type CVecVar = Accumulator<Complex64, Variable>;

/// The four concrete accumulators a tree leaf can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    /// Real, fixed length.
    RVecFix(RVecFix),
    /// Complex, fixed length.
    CVecFix(CVecFix),
    /// Real, growable.
    RVecVar(RVecVar),
    /// Complex, growable.
    CVecVar(CVecVar),
}

impl Leaf {
    /// Kind name of the wrapped accumulator.
    pub fn kind(&self) -> &'static str {
        match self {
            Leaf::RVecFix(_) => "rvecfix",
            Leaf::CVecFix(_) => "cvecfix",
            Leaf::RVecVar(_) => "rvecvar",
            Leaf::CVecVar(_) => "cvecvar",
        }
    }

    /// Sample count of the wrapped accumulator.
    pub fn count(&self) -> i64 {
        match self {
            Leaf::RVecFix(acc) => acc.count(),
            Leaf::CVecFix(acc) => acc.count(),
            Leaf::RVecVar(acc) => acc.count(),
            Leaf::CVecVar(acc) => acc.count(),
        }
    }

    /// Collective combine of the wrapped accumulator.
    pub fn combine(
        &self,
        comm: &dyn Communicator,
        factor: f64,
        mode: Mode,
        binary: bool,
    ) -> Result<Reduced<MeanVector>, QmcError> {
        match self {
            Leaf::RVecFix(acc) => acc.combine(comm, factor, mode, binary),
            Leaf::CVecFix(acc) => acc.combine(comm, factor, mode, binary),
            Leaf::RVecVar(acc) => acc.combine(comm, factor, mode, binary),
            Leaf::CVecVar(acc) => acc.combine(comm, factor, mode, binary),
        }
    }
}

/// Conversion between a concrete accumulator and its [`Leaf`] variant.
pub trait Slot: Sized {
    /// Wraps the accumulator into a leaf.
    fn into_leaf(self) -> Leaf;
    /// Mutably borrows the accumulator if the leaf holds this kind.
    fn from_leaf_mut(leaf: &mut Leaf) -> Option<&mut Self>;
}

macro_rules! impl_slot {
    ($variant:ident) => {
        impl Slot for $variant {
            fn into_leaf(self) -> Leaf {
                Leaf::$variant(self)
            }

            fn from_leaf_mut(leaf: &mut Leaf) -> Option<&mut Self> {
                match leaf {
                    Leaf::$variant(acc) => Some(acc),
                    _ => None,
                }
            }
        }
    };
}

impl_slot!(RVecFix);
impl_slot!(CVecFix);
impl_slot!(RVecVar);
impl_slot!(CVecVar);
