use std::marker::PhantomData;

use num_complex::Complex64;
use qmc_core::{ErrorInfo, QmcError};

use crate::accumulator::{Accumulator, Fixed, GrowthPolicy, Slot, Variable};
use crate::scalar::Scalar;
use crate::tree::Value;

/// Anything that can be viewed as a run of scalars.
pub trait SampleValue {
    /// Element type of the sample.
    type Elem: Scalar;

    /// The sample as a slice.
    fn values(&self) -> &[Self::Elem];
}

impl SampleValue for f64 {
    type Elem = f64;

    fn values(&self) -> &[f64] {
        std::slice::from_ref(self)
    }
}

impl SampleValue for Complex64 {
    type Elem = Complex64;

    fn values(&self) -> &[Complex64] {
        std::slice::from_ref(self)
    }
}

impl<T: Scalar> SampleValue for Vec<T> {
    type Elem = T;

    fn values(&self) -> &[T] {
        self
    }
}

impl<T: Scalar> SampleValue for &[T] {
    type Elem = T;

    fn values(&self) -> &[T] {
        self
    }
}

impl<T: Scalar, const N: usize> SampleValue for [T; N] {
    type Elem = T;

    fn values(&self) -> &[T] {
        self
    }
}

/// A value tagged with its multiplicity and growth policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<V, P> {
    value: V,
    multiplicity: i64,
    policy: PhantomData<P>,
}

impl<V: SampleValue, P: GrowthPolicy> Sample<V, P> {
    /// Wraps `value` as `multiplicity` elementary draws.
    pub fn new(value: V, multiplicity: i64) -> Self {
        Self {
            value,
            multiplicity,
            policy: PhantomData,
        }
    }
}

/// Sample for a fixed-length accumulator.
pub fn fix<V: SampleValue>(value: V, multiplicity: i64) -> Sample<V, Fixed> {
    Sample::new(value, multiplicity)
}

/// Sample for a growable accumulator.
pub fn var<V: SampleValue>(value: V, multiplicity: i64) -> Sample<V, Variable> {
    Sample::new(value, multiplicity)
}

/// Writes a sample into a tree slot.
pub trait Observe {
    /// Adds the sample to the accumulator in `slot`, creating it when the slot is empty.
    fn record_into(&self, slot: &mut Value) -> Result<(), QmcError>;
}

impl<V, P> Observe for Sample<V, P>
where
    V: SampleValue,
    P: GrowthPolicy,
    Accumulator<V::Elem, P>: Slot,
{
    fn record_into(&self, slot: &mut Value) -> Result<(), QmcError> {
        if slot.is_empty() {
            *slot = Value::Leaf(Accumulator::<V::Elem, P>::new().into_leaf());
        }
        let found = slot.kind();
        let accumulator = match slot {
            Value::Leaf(leaf) => Accumulator::<V::Elem, P>::from_leaf_mut(leaf),
            _ => None,
        };
        let Some(accumulator) = accumulator else {
            return Err(QmcError::Schema(
                ErrorInfo::new("leaf-kind", "sample does not match the accumulator in this slot")
                    .with_context("expected", Accumulator::<V::Elem, P>::kind())
                    .with_context("found", found),
            ));
        };
        accumulator.add(self.value.values(), self.multiplicity)
    }
}

impl<S: Observe + ?Sized> Observe for &S {
    fn record_into(&self, slot: &mut Value) -> Result<(), QmcError> {
        (**self).record_into(slot)
    }
}
