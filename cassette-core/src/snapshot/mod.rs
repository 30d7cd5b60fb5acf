//! Snapshot documents
//!
//! Converts a proxy, and everything recorded under it, into a single JSON
//! document and back. A proxy snapshot is an object with three fields:
//!
//! ```json
//! {"proxy": true, "keys": [["getattr", "bugs"]], "values": [{"proxy": true, "keys": [], "values": []}]}
//! ```
//!
//! Keys are operation keys in their array form. Values are plain JSON data,
//! nested snapshots, arrays holding nested snapshots (iteration results), or
//! captured failures:
//!
//! ```json
//! {"failure": true, "kind": "KeyError", "message": "1", "proxy": {"proxy": true, "keys": [], "values": []}}
//! ```
//!
//! A JSON object counts as a snapshot (or failure record) only when its marker
//! field is exactly `true`. Recorded data objects that could be mistaken for
//! one (any object with a `proxy` or `failure` field, or an object whose only
//! field is `data`) are written escaped as `{"data": <object>}` and read back
//! verbatim.
//!
//! Rebuilt proxies have ghost subjects and are meant to be used in
//! replay-only mode.

use serde_json::{Map, Value};
use std::fmt::Write as _;

use crate::error::{CassetteError, Result};
use crate::proxy::{
    CapturedFailure, Engine, OperationKey, OperationStore, Outcome, Proxy, Resolved,
};

/// Marker field identifying a proxy snapshot
pub const PROXY_MARKER: &str = "proxy";

/// Marker field identifying a captured failure
pub const FAILURE_MARKER: &str = "failure";

/// Sole field of an escaped data object
pub const DATA_ESCAPE: &str = "data";

const KEYS: &str = "keys";
const VALUES: &str = "values";

/// Serialize `proxy` into a document
pub fn to_document(proxy: &Proxy, pretty: bool) -> Result<String> {
    let value = encode_proxy(proxy);
    tracing::trace!(entries = proxy.entry_count(), pretty, "encoding snapshot");
    let text = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(text)
}

/// Rebuild a ghost proxy tree owned by `engine` from a document
pub fn from_document(engine: &Engine, document: &str) -> Result<Proxy> {
    let value: Value = serde_json::from_str(document)?;
    tracing::trace!(bytes = document.len(), "decoding snapshot");
    decode_proxy(engine, &value)
}

/// Encode one proxy as a snapshot value
pub fn encode_proxy(proxy: &Proxy) -> Value {
    let (keys, values): (Vec<Value>, Vec<Value>) = proxy
        .entries()
        .into_iter()
        .map(|(key, outcome)| (key.to_value(), encode_outcome(&outcome)))
        .unzip();

    let mut record = Map::new();
    record.insert(PROXY_MARKER.to_string(), Value::Bool(true));
    record.insert(KEYS.to_string(), Value::Array(keys));
    record.insert(VALUES.to_string(), Value::Array(values));
    Value::Object(record)
}

fn encode_outcome(outcome: &Outcome) -> Value {
    match outcome {
        Outcome::Value(resolved) => encode_resolved(resolved),
        Outcome::Failure(failure) => {
            let mut record = Map::new();
            record.insert(FAILURE_MARKER.to_string(), Value::Bool(true));
            record.insert("kind".to_string(), Value::String(failure.kind.clone()));
            record.insert("message".to_string(), Value::String(failure.message.clone()));
            record.insert(PROXY_MARKER.to_string(), encode_proxy(&failure.proxy));
            Value::Object(record)
        }
    }
}

fn encode_resolved(resolved: &Resolved) -> Value {
    match resolved {
        Resolved::Data(value) => encode_data(value),
        Resolved::Proxy(proxy) => encode_proxy(proxy),
        Resolved::List(items) => Value::Array(items.iter().map(encode_resolved).collect()),
    }
}

/// Plain data, with marker-shaped objects escaped
fn encode_data(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(encode_data).collect()),
        Value::Object(record) if needs_escape(record) => {
            let mut escaped = Map::new();
            escaped.insert(DATA_ESCAPE.to_string(), value.clone());
            Value::Object(escaped)
        }
        other => other.clone(),
    }
}

fn needs_escape(record: &Map<String, Value>) -> bool {
    record.contains_key(PROXY_MARKER)
        || record.contains_key(FAILURE_MARKER)
        || is_escaped_record(record)
}

fn is_escaped_record(record: &Map<String, Value>) -> bool {
    record.len() == 1 && record.contains_key(DATA_ESCAPE)
}

/// The data inside an escaped object
fn escaped_data(value: &Value) -> Option<&Value> {
    value
        .as_object()
        .filter(|record| is_escaped_record(record))
        .and_then(|record| record.get(DATA_ESCAPE))
}

fn has_marker(value: &Value, marker: &str) -> bool {
    value
        .as_object()
        .and_then(|record| record.get(marker))
        .is_some_and(|flag| flag == &Value::Bool(true))
}

/// Whether `value` is a proxy snapshot
pub fn is_snapshot(value: &Value) -> bool {
    has_marker(value, PROXY_MARKER)
}

fn is_failure(value: &Value) -> bool {
    has_marker(value, FAILURE_MARKER)
}

/// Decode a snapshot value into a ghost proxy owned by `engine`
pub fn decode_proxy(engine: &Engine, value: &Value) -> Result<Proxy> {
    let record = value
        .as_object()
        .ok_or_else(|| malformed(format!("snapshot must be an object, got {}", kind_of(value))))?;
    if !is_snapshot(value) {
        return Err(malformed(format!(
            "snapshot is missing `\"{}\": true`",
            PROXY_MARKER
        )));
    }
    let keys = array_field(record, KEYS)?;
    let values = array_field(record, VALUES)?;
    if keys.len() != values.len() {
        return Err(malformed(format!(
            "snapshot has {} keys but {} values",
            keys.len(),
            values.len()
        )));
    }

    let mut store = OperationStore::new();
    for (key, value) in keys.iter().zip(values) {
        let key = OperationKey::from_value(key).map_err(malformed)?;
        let outcome = decode_outcome(engine, value)?;
        store.put(key, outcome);
    }
    Ok(Proxy::ghost(engine.clone(), store))
}

fn decode_outcome(engine: &Engine, value: &Value) -> Result<Outcome> {
    if !is_failure(value) {
        return decode_resolved(engine, value).map(Outcome::Value);
    }

    let record = value.as_object().ok_or_else(|| malformed("failure record must be an object"))?;
    let text_field = |name: &str| {
        record
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| malformed(format!("failure record is missing string `{}`", name)))
    };
    let kind = text_field("kind")?;
    let message = text_field("message")?;
    let proxy = record
        .get(PROXY_MARKER)
        .ok_or_else(|| malformed("failure record is missing its proxy snapshot"))
        .and_then(|snapshot| decode_proxy(engine, snapshot))?;

    Ok(Outcome::Failure(CapturedFailure {
        kind,
        message,
        proxy,
    }))
}

fn decode_resolved(engine: &Engine, value: &Value) -> Result<Resolved> {
    if let Some(data) = escaped_data(value) {
        return Ok(Resolved::Data(data.clone()));
    }
    if is_snapshot(value) {
        return decode_proxy(engine, value).map(Resolved::Proxy);
    }
    match value {
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| decode_resolved(engine, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(Resolved::normalize_list(items))
        }
        other => Ok(Resolved::Data(other.clone())),
    }
}

fn array_field<'a>(record: &'a Map<String, Value>, name: &str) -> Result<&'a Vec<Value>> {
    match record.get(name) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(malformed(format!(
            "snapshot field `{}` must be an array, got {}",
            name,
            kind_of(other)
        ))),
        None => Err(malformed(format!("snapshot is missing field `{}`", name))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn malformed(message: impl Into<String>) -> CassetteError {
    CassetteError::Malformed(message.into())
}

/// Render the recorded tree under `proxy` as indented text
pub fn outline(proxy: &Proxy) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "proxy over {} ({} entries)",
        proxy.subject_repr(),
        proxy.entry_count()
    );
    outline_entries(proxy, 1, &mut out);
    out
}

fn outline_entries(proxy: &Proxy, depth: usize, out: &mut String) {
    for (key, outcome) in proxy.entries() {
        let indent = "  ".repeat(depth);
        match outcome {
            Outcome::Value(resolved) => {
                let _ = write!(out, "{}{} => ", indent, key);
                outline_resolved(&resolved, depth, out);
            }
            Outcome::Failure(failure) => {
                let _ = writeln!(out, "{}{} => raises {}", indent, key, failure);
                outline_entries(&failure.proxy, depth + 1, out);
            }
        }
    }
}

fn outline_resolved(resolved: &Resolved, depth: usize, out: &mut String) {
    match resolved {
        Resolved::Data(value) => {
            let _ = writeln!(out, "{}", value);
        }
        Resolved::Proxy(proxy) => {
            let _ = writeln!(out, "proxy ({} entries)", proxy.entry_count());
            outline_entries(proxy, depth + 1, out);
        }
        Resolved::List(items) => {
            let _ = writeln!(out, "list of {}", items.len());
            let indent = "  ".repeat(depth + 1);
            for (index, item) in items.iter().enumerate() {
                let _ = write!(out, "{}[{}] ", indent, index);
                outline_resolved(item, depth + 1, out);
            }
        }
    }
}

#[cfg(test)]
mod tests;
