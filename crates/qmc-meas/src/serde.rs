use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use qmc_core::{ErrorInfo, QmcError};
use serde::Serialize;
use serde_json::{json, Map, Value as Json};

use crate::estimate::{MeanData, MeanVector};
use crate::tree::Value;

fn serde_error(code: &str, err: impl ToString) -> QmcError {
    QmcError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Exports a reduced tree as JSON.
///
/// Mean leaves become arrays of numbers (`{"real", "imag"}` pairs of arrays
/// for complex data), or base64 strings of little-endian `f64` bytes when the
/// leaf asks for binary encoding. Empty and absent nodes become `null`.
pub fn to_json(value: &Value) -> Result<Json, QmcError> {
    let mut path = Vec::new();
    export(value, &mut path)
}

fn export(value: &Value, path: &mut Vec<String>) -> Result<Json, QmcError> {
    Ok(match value {
        Value::Empty | Value::Absent => Json::Null,
        Value::Int(steps) => json!(steps),
        Value::Mean(mean) => mean_to_json(mean),
        Value::Object(entries) => {
            let mut map = Map::new();
            for (key, child) in entries {
                path.push(key.clone());
                map.insert(key.clone(), export(child, path)?);
                path.pop();
            }
            Json::Object(map)
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                out.push(export(item, path)?);
                path.pop();
            }
            Json::Array(out)
        }
        Value::Leaf(leaf) => {
            return Err(QmcError::Serde(
                ErrorInfo::new("unreduced-leaf", "accumulators must be reduced before export")
                    .with_context("kind", leaf.kind())
                    .with_context("path", path.join("/")),
            ))
        }
    })
}

fn mean_to_json(mean: &MeanVector) -> Json {
    match (&mean.data, mean.binary) {
        (MeanData::Real(values), false) => json!(values),
        (MeanData::Real(values), true) => Json::String(encode_f64s(values.iter().copied())),
        (MeanData::Complex(values), false) => json!({
            "real": values.iter().map(|z| z.re).collect::<Vec<_>>(),
            "imag": values.iter().map(|z| z.im).collect::<Vec<_>>(),
        }),
        (MeanData::Complex(values), true) => json!({
            "real": encode_f64s(values.iter().map(|z| z.re)),
            "imag": encode_f64s(values.iter().map(|z| z.im)),
        }),
    }
}

/// Base64 of the little-endian bytes of `values`.
pub fn encode_f64s(values: impl Iterator<Item = f64>) -> String {
    let bytes: Vec<u8> = values.flat_map(f64::to_le_bytes).collect();
    STANDARD.encode(bytes)
}

/// Inverse of [`encode_f64s`].
pub fn decode_f64s(encoded: &str) -> Result<Vec<f64>, QmcError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| serde_error("base64-decode", err))?;
    if bytes.len() % 8 != 0 {
        return Err(QmcError::Serde(
            ErrorInfo::new("base64-length", "payload is not a whole number of f64 values")
                .with_context("bytes", bytes.len().to_string()),
        ));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect())
}

fn canonicalize(value: Json) -> Json {
    match value {
        Json::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Json::Object(Map::from_iter(ordered))
        }
        Json::Array(values) => Json::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, QmcError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical).map_err(|err| serde_error("json-write", err))?;
    Ok(bytes)
}
