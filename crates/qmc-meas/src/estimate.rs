use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Estimator applied during a reduction pass. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Single best estimate over all samples, delivered to the coordinator only.
    #[default]
    All,
    /// Delete-one estimate on every process, leaving out that process's samples.
    Jackknife,
}

impl Mode {
    /// Stable lowercase label used in logs and provenance.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::All => "all",
            Mode::Jackknife => "jackknife",
        }
    }
}

/// Outcome of a collective reduction on one process.
///
/// `Absent` means this process is not the one that reports the value, which
/// is different from a value that was reduced but turned out empty (an error).
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced<T> {
    /// No result on this process.
    Absent,
    /// The reduced value.
    Present(T),
}

impl<T> Reduced<T> {
    /// Borrows the result if present.
    pub fn present(&self) -> Option<&T> {
        match self {
            Reduced::Present(value) => Some(value),
            Reduced::Absent => None,
        }
    }

    /// Consumes the outcome, returning the result if present.
    pub fn into_present(self) -> Option<T> {
        match self {
            Reduced::Present(value) => Some(value),
            Reduced::Absent => None,
        }
    }
}

/// Elementwise means, real or complex.
#[derive(Debug, Clone, PartialEq)]
pub enum MeanData {
    /// Real valued means.
    Real(Vec<f64>),
    /// Complex valued means.
    Complex(Vec<Complex64>),
}

/// A reduced leaf: normalized means plus the serialization hint.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanVector {
    /// The elementwise means, already multiplied by the reduction factor.
    pub data: MeanData,
    /// Request for compact binary encoding when the tree is serialized.
    pub binary: bool,
}

impl MeanVector {
    /// Creates a mean vector.
    pub fn new(data: MeanData, binary: bool) -> Self {
        Self { data, binary }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match &self.data {
            MeanData::Real(values) => values.len(),
            MeanData::Complex(values) => values.len(),
        }
    }

    /// Whether the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Real means, if this is a real vector.
    pub fn real(&self) -> Option<&[f64]> {
        match &self.data {
            MeanData::Real(values) => Some(values),
            MeanData::Complex(_) => None,
        }
    }

    /// Complex means, if this is a complex vector.
    pub fn complex(&self) -> Option<&[Complex64]> {
        match &self.data {
            MeanData::Complex(values) => Some(values),
            MeanData::Real(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_labels_match_serde_names() {
        for mode in [Mode::All, Mode::Jackknife] {
            let encoded = serde_json::to_value(mode).unwrap();
            assert_eq!(encoded, serde_json::Value::from(mode.as_str()));
        }
    }
}
