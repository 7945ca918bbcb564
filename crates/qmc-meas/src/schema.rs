//! Reserved keys of the subspace document and structural checks.

use std::hash::Hasher;

use indexmap::IndexMap;
use qmc_core::{Communicator, ErrorInfo, QmcError, ReduceOp};
use siphasher::sip::SipHasher13;
use tracing::warn;

use crate::accumulator::Leaf;
use crate::tree::Value;
use crate::weights::WeightTable;

/// Name of the reference subspace.
pub const PARTITION: &str = "partition";
/// Step counter present in every subspace.
pub const STEPS: &str = "steps";
/// Monte Carlo sign accumulator of the partition subspace.
pub const SIGN: &str = "sign";

/// Hash of the tree shape: node tags, sorted object keys, array lengths and
/// accumulator kinds. Vector lengths and numeric contents are left out since
/// they legitimately differ between processes.
pub fn structure_hash(value: &Value) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    feed(&mut hasher, value);
    hasher.finish()
}

fn feed(hasher: &mut SipHasher13, value: &Value) {
    match value {
        Value::Empty => hasher.write_u8(0),
        Value::Absent => hasher.write_u8(1),
        Value::Int(_) => hasher.write_u8(2),
        Value::Object(entries) => {
            hasher.write_u8(3);
            hasher.write_u64(entries.len() as u64);
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            for key in keys {
                hasher.write(key.as_bytes());
                hasher.write_u8(0xff);
                feed(hasher, &entries[key.as_str()]);
            }
        }
        Value::Array(items) => {
            hasher.write_u8(4);
            hasher.write_u64(items.len() as u64);
            for item in items {
                feed(hasher, item);
            }
        }
        Value::Leaf(leaf) => {
            hasher.write_u8(5);
            hasher.write(leaf.kind().as_bytes());
        }
        Value::Mean(_) => hasher.write_u8(6),
    }
}

/// Checks that every process holds a tree of the same shape.
///
/// Costs one collective. On divergence every rank fails, so no rank is left
/// waiting inside a later per-leaf collective.
pub fn verify_structure(comm: &dyn Communicator, value: &Value) -> Result<u64, QmcError> {
    let local = structure_hash(value);
    let signed = local as i64;
    let mut probe = [signed, !signed];
    comm.all_reduce_i64(&mut probe, ReduceOp::Max)?;
    let (highest, lowest) = (probe[0], !probe[1]);
    if highest != lowest {
        warn!(
            rank = comm.rank(),
            local = %hex::encode(local.to_be_bytes()),
            "observable trees differ between processes"
        );
        return Err(QmcError::Schema(
            ErrorInfo::new(
                "structure-divergence",
                "observable trees are not isomorphic across processes",
            )
            .with_context("rank", comm.rank().to_string())
            .with_context("local", hex::encode(local.to_be_bytes()))
            .with_hint("every process must create the same observables before a checkpoint"),
        ));
    }
    Ok(local)
}

fn missing(key: &str, within: &str) -> QmcError {
    QmcError::Schema(
        ErrorInfo::new("missing-key", format!("{within} has no `{key}` entry"))
            .with_context("key", key)
            .with_context("path", within),
    )
}

/// Step count of a subspace node.
pub fn steps_of(worm: &Value, name: &str) -> Result<i64, QmcError> {
    match worm.get(STEPS) {
        Some(Value::Int(steps)) => Ok(*steps),
        Some(other) => Err(QmcError::Schema(
            ErrorInfo::new("leaf-kind", "steps must be an integer counter")
                .with_context("found", other.kind())
                .with_context("path", format!("{name}/{STEPS}")),
        )),
        None => Err(missing(STEPS, name)),
    }
}

/// Sign accumulator of the partition node.
pub fn sign_of(partition: &Value) -> Result<&Leaf, QmcError> {
    match partition.get(SIGN) {
        Some(Value::Leaf(leaf @ Leaf::RVecFix(_))) => Ok(leaf),
        Some(other) => Err(QmcError::Schema(
            ErrorInfo::new("leaf-kind", "sign must be a real fixed-length accumulator")
                .with_context("found", other.kind())
                .with_context("path", format!("{PARTITION}/{SIGN}")),
        )),
        None => Err(missing(SIGN, PARTITION)),
    }
}

/// Checks that `document` is a subspace document the normalizer can handle
/// and returns its subspaces.
pub fn validate_document<'a>(
    document: &'a Value,
    weights: &WeightTable,
) -> Result<&'a IndexMap<String, Value>, QmcError> {
    let Value::Object(worms) = document else {
        return Err(QmcError::Schema(
            ErrorInfo::new("document-kind", "subspace document must be an object")
                .with_context("found", document.kind()),
        ));
    };
    let partition = worms.get(PARTITION).ok_or_else(|| missing(PARTITION, "document"))?;
    sign_of(partition)?;
    for (name, worm) in worms {
        if !matches!(worm, Value::Object(_)) {
            return Err(QmcError::Schema(
                ErrorInfo::new("document-kind", "subspace entry must be an object")
                    .with_context("path", name.as_str())
                    .with_context("found", worm.kind()),
            ));
        }
        steps_of(worm, name)?;
        weights.eta(name)?;
    }
    Ok(worms)
}
