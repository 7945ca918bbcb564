//! Structured error types shared across the QMC reduction crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`QmcError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (key paths, lengths, ranks, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for accumulation, reduction and normalization.
///
/// Every failure in this subsystem is fatal for the run: nothing is retried
/// or silently recovered, the caller is expected to abort with the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum QmcError {
    /// Sample length does not match an established fixed-length accumulator.
    #[error("shape error: {0}")]
    Shape(ErrorInfo),
    /// A reduction found no samples to average over.
    #[error("measurement error: {0}")]
    Measurement(ErrorInfo),
    /// Cross-subspace normalization failed (zero weights, zero partition norm).
    #[error("normalization error: {0}")]
    Normalization(ErrorInfo),
    /// Document or tree structure does not match what the operation expects.
    #[error("schema error: {0}")]
    Schema(ErrorInfo),
    /// Failure inside the collective layer.
    #[error("collective error: {0}")]
    Collective(ErrorInfo),
    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl QmcError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            QmcError::Shape(info)
            | QmcError::Measurement(info)
            | QmcError::Normalization(info)
            | QmcError::Schema(info)
            | QmcError::Collective(info)
            | QmcError::Config(info)
            | QmcError::Serde(info) => info,
        }
    }

    fn info_mut(&mut self) -> &mut ErrorInfo {
        match self {
            QmcError::Shape(info)
            | QmcError::Measurement(info)
            | QmcError::Normalization(info)
            | QmcError::Schema(info)
            | QmcError::Collective(info)
            | QmcError::Config(info)
            | QmcError::Serde(info) => info,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Adds a context entry, keeping the first value when the key is already set.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info_mut()
            .context
            .entry(key.into())
            .or_insert_with(|| value.into());
        self
    }

    /// Records the key path of the offending observable.
    ///
    /// Errors bubble up through the tree walk innermost first, so the first
    /// path recorded is the full one and later calls leave it alone.
    pub fn at_path(self, path: &str) -> Self {
        self.with_context("path", path)
    }
}
