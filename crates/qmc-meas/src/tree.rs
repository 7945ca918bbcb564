use indexmap::IndexMap;
use qmc_core::{ErrorInfo, QmcError};

use crate::accumulator::Leaf;
use crate::estimate::MeanVector;
use crate::sample::Observe;

/// Dynamically typed tree of named observables held by one process.
///
/// Before a reduction pass the interesting leaves are accumulators; after it
/// they are [`Value::Mean`] (or [`Value::Absent`] on processes that do not
/// report). Step counters are plain [`Value::Int`] leaves.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Nothing recorded here.
    #[default]
    Empty,
    /// A reduction ran but this process does not hold the result.
    Absent,
    /// Integer counter, such as the steps of a subspace.
    Int(i64),
    /// Named children, iteration follows insertion order.
    Object(IndexMap<String, Value>),
    /// Ordered children.
    Array(Vec<Value>),
    /// Accumulator collecting samples.
    Leaf(Leaf),
    /// Reduced means.
    Mean(MeanVector),
}

impl Value {
    /// An object without entries.
    pub fn object() -> Self {
        Value::Object(IndexMap::new())
    }

    /// An array of `len` empty nodes.
    pub fn array(len: usize) -> Self {
        Value::Array(vec![Value::Empty; len])
    }

    /// Tag describing the node, leaves report their accumulator kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Absent => "absent",
            Value::Int(_) => "int",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Leaf(leaf) => leaf.kind(),
            Value::Mean(_) => "mean",
        }
    }

    /// Whether the node is [`Value::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Child of an object node.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Follows `path` through object nodes.
    pub fn at(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Integer payload of a counter node.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Reduced means of a mean node.
    pub fn as_mean(&self) -> Option<&MeanVector> {
        match self {
            Value::Mean(mean) => Some(mean),
            _ => None,
        }
    }

    /// Accumulator of a leaf node.
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Value::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Turns the node into an object unless it already is one.
    pub(crate) fn ensure_object(&mut self) -> &mut IndexMap<String, Value> {
        if !matches!(self, Value::Object(_)) {
            *self = Value::object();
        }
        match self {
            Value::Object(entries) => entries,
            _ => unreachable!("node was just replaced by an object"),
        }
    }

    /// Turns the node into an array of `len` entries unless it already is one.
    pub(crate) fn ensure_array(&mut self, len: usize) -> &mut Vec<Value> {
        if !matches!(self, Value::Array(items) if items.len() == len) {
            *self = Value::array(len);
        }
        match self {
            Value::Array(items) => items,
            _ => unreachable!("node was just replaced by an array"),
        }
    }

    /// Child slot under `key`, created if missing. Empty nodes become objects.
    pub fn entry(&mut self, key: &str) -> Result<&mut Value, QmcError> {
        if !matches!(self, Value::Empty | Value::Object(_)) {
            return Err(QmcError::Schema(
                ErrorInfo::new("path-conflict", "cannot descend into a non-object node")
                    .with_context("key", key)
                    .with_context("kind", self.kind()),
            ));
        }
        Ok(self.ensure_object().entry(key.to_owned()).or_default())
    }

    /// Replaces (or creates) the child under `key`.
    pub fn insert(&mut self, key: &str, value: Value) -> Result<(), QmcError> {
        *self.entry(key)? = value;
        Ok(())
    }

    /// Slot at `path`, creating intermediate objects.
    pub fn slot_mut(&mut self, path: &[&str]) -> Result<&mut Value, QmcError> {
        let mut node = self;
        for key in path {
            node = node.entry(key)?;
        }
        Ok(node)
    }

    /// Records a sample into the accumulator at `path`.
    pub fn record<S: Observe>(&mut self, path: &[&str], sample: S) -> Result<(), QmcError> {
        self.slot_mut(path)
            .and_then(|slot| sample.record_into(slot))
            .map_err(|err| err.at_path(&path.join("/")))
    }

    /// Number of accumulator leaves below this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Value::Leaf(_) => 1,
            Value::Object(entries) => entries.values().map(Value::leaf_count).sum(),
            Value::Array(items) => items.iter().map(Value::leaf_count).sum(),
            _ => 0,
        }
    }
}
