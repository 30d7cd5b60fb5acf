//! Resolved values and captured outcomes

use serde_json::Value;
use std::fmt;

use super::Proxy;
use crate::error::{CassetteError, Result};

/// A value handed back to the caller by a proxy operation
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Plain data, passed through unwrapped
    Data(Value),
    /// A nested proxy over a non-primitive result
    Proxy(Proxy),
    /// Iteration results that contain at least one proxy
    List(Vec<Resolved>),
}

impl Resolved {
    /// Plain data, if this is not a proxy or a list of proxies
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Resolved::Data(value) => Some(value),
            _ => None,
        }
    }

    /// String data
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(Value::as_str)
    }

    /// Boolean data
    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(Value::as_bool)
    }

    /// Integer data
    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(Value::as_i64)
    }

    /// The nested proxy, if any
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Resolved::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Take the nested proxy, failing for pass-through values
    pub fn into_proxy(self) -> Result<Proxy> {
        match self {
            Resolved::Proxy(proxy) => Ok(proxy),
            other => Err(CassetteError::NotAProxy(other.to_string())),
        }
    }

    /// Elements of an iteration result.
    ///
    /// Plain-data arrays are split into data elements so callers can treat
    /// both shapes the same way.
    pub fn into_items(self) -> Option<Vec<Resolved>> {
        match self {
            Resolved::List(items) => Some(items),
            Resolved::Data(Value::Array(values)) => {
                Some(values.into_iter().map(Resolved::Data).collect())
            }
            _ => None,
        }
    }

    /// Collapse lists whose elements are all plain data into a data array
    pub(crate) fn normalize_list(items: Vec<Resolved>) -> Resolved {
        if items.iter().all(|item| matches!(item, Resolved::Data(_))) {
            Resolved::Data(Value::Array(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Resolved::Data(value) => Some(value),
                        _ => None,
                    })
                    .collect(),
            ))
        } else {
            Resolved::List(items)
        }
    }
}

/// Proxies compare by identity, data by value
impl PartialEq for Resolved {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Resolved::Data(a), Resolved::Data(b)) => a == b,
            (Resolved::Proxy(a), Resolved::Proxy(b)) => a.ptr_eq(b),
            (Resolved::List(a), Resolved::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        Resolved::Data(value)
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Data(value) => write!(f, "{}", value),
            Resolved::Proxy(proxy) => write!(f, "{}", proxy),
            Resolved::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A subject failure recorded as an outcome.
///
/// `proxy` wraps the fault itself, so attributes of the failure can be read
/// (and recorded) through the usual proxy operations.
#[derive(Debug, Clone)]
pub struct CapturedFailure {
    pub kind: String,
    pub message: String,
    pub proxy: Proxy,
}

impl CapturedFailure {
    /// Whether two failures have the same observable shape
    pub fn same_shape(&self, other: &CapturedFailure) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl fmt::Display for CapturedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// What the store keeps for one operation key
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The operation succeeded
    Value(Resolved),
    /// The operation raised
    Failure(CapturedFailure),
}

impl Outcome {
    /// Unwrap at the call boundary: return values, re-raise failures
    pub fn unwrap_outcome(self) -> Result<Resolved> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Failure(failure) => Err(CassetteError::Raised(failure)),
        }
    }

    /// Whether this outcome is a captured failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(value) => write!(f, "{}", value),
            Outcome::Failure(failure) => write!(f, "raises {}", failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_data_list_collapses_to_array() {
        let list = Resolved::normalize_list(vec![json!(1).into(), json!("a").into()]);
        assert_eq!(list, Resolved::Data(json!([1, "a"])));
    }

    #[test]
    fn test_into_items_splits_data_arrays() {
        let items = Resolved::Data(json!([1, 2])).into_items().unwrap();
        assert_eq!(items, vec![Resolved::Data(json!(1)), Resolved::Data(json!(2))]);
        assert!(Resolved::Data(json!(1)).into_items().is_none());
    }

    #[test]
    fn test_into_proxy_rejects_data() {
        let err = Resolved::Data(json!("foo")).into_proxy().unwrap_err();
        assert!(matches!(err, CassetteError::NotAProxy(_)));
    }

    #[test]
    fn test_value_outcome_unwraps() {
        let outcome = Outcome::Value(Resolved::Data(json!(true)));
        assert!(!outcome.is_failure());
        assert_eq!(outcome.unwrap_outcome().unwrap().as_bool(), Some(true));
    }
}
