//! Capability interface for wrapped subjects
//!
//! A subject is the real object behind a proxy. It implements whichever
//! operations it supports; everything else falls back to a default that
//! fails with an `unsupported` [`Fault`].

use serde_json::{Map, Value};
use std::fmt;

use super::operation::Comparison;

/// What a subject hands back from one operation
pub enum Reply {
    /// Plain data: passed through as-is, never proxied
    Data(Value),
    /// A non-primitive result, wrapped in a nested proxy
    Object(Box<dyn Subject>),
    /// A sequence of results (iteration), each wrapped independently
    List(Vec<Reply>),
}

impl Reply {
    /// Wrap a live subject
    pub fn object(subject: impl Subject + 'static) -> Self {
        Reply::Object(Box::new(subject))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Data(value)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Reply::Object(subject) => f.debug_tuple("Object").field(&subject.repr()).finish(),
            Reply::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

/// Result of invoking a subject
pub type SubjectResult = std::result::Result<Reply, Fault>;

/// A failure raised by a subject.
///
/// `kind` names the failure class (e.g. `KeyError`), `message` carries the
/// human-readable text, and `detail` holds any extra attributes the caller
/// may want to inspect through the captured proxy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: String,
    pub message: String,
    pub detail: Map<String, Value>,
}

impl Fault {
    /// Create a fault with no extra detail
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            detail: Map::new(),
        }
    }

    /// The subject does not implement `operation`
    pub fn unsupported(operation: &str) -> Self {
        Self::new(
            "Unsupported",
            format!("subject does not support `{}`", operation),
        )
    }

    /// Attach an extra attribute
    pub fn with_detail(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.detail.insert(name.into(), value.into());
        self
    }
}

/// Operations a proxied subject may support.
///
/// Methods take `&mut self` because subjects are free to change state between
/// calls; a proxy only assumes purity when the caller asks it to reuse
/// recorded outcomes.
pub trait Subject {
    /// Human-readable identity, used for diagnostics and presentation
    fn repr(&self) -> String {
        format!("<{}>", std::any::type_name::<Self>())
    }

    /// Stringification
    fn str(&mut self) -> SubjectResult {
        Err(Fault::unsupported("str"))
    }

    /// Length
    fn len(&mut self) -> SubjectResult {
        Err(Fault::unsupported("len"))
    }

    /// Ordering or equality comparison against `other`
    fn compare(&mut self, comparison: Comparison, other: &Value) -> SubjectResult {
        let _ = (comparison, other);
        Err(Fault::unsupported("compare"))
    }

    /// Hash value
    fn hash(&mut self) -> SubjectResult {
        Err(Fault::unsupported("hash"))
    }

    /// Truthiness
    fn truthy(&mut self) -> SubjectResult {
        Err(Fault::unsupported("bool"))
    }

    /// Forward iteration
    fn iter(&mut self) -> SubjectResult {
        Err(Fault::unsupported("iter"))
    }

    /// Reverse iteration
    fn reversed(&mut self) -> SubjectResult {
        Err(Fault::unsupported("reversed"))
    }

    /// Membership test
    fn contains(&mut self, item: &Value) -> SubjectResult {
        let _ = item;
        Err(Fault::unsupported("contains"))
    }

    /// Item read
    fn get_item(&mut self, key: &Value) -> SubjectResult {
        let _ = key;
        Err(Fault::unsupported("getitem"))
    }

    /// Item write
    fn set_item(&mut self, key: &Value, value: Value) -> Result<(), Fault> {
        let _ = (key, value);
        Err(Fault::unsupported("setitem"))
    }

    /// Item delete
    fn del_item(&mut self, key: &Value) -> Result<(), Fault> {
        let _ = key;
        Err(Fault::unsupported("delitem"))
    }

    /// Attribute read
    fn get_attr(&mut self, name: &str) -> SubjectResult {
        Err(Fault::unsupported(&format!("getattr {}", name)))
    }

    /// Calling the subject itself
    fn call(&mut self, args: &[Value], kwargs: &Map<String, Value>) -> SubjectResult {
        let _ = (args, kwargs);
        Err(Fault::unsupported("call"))
    }
}

/// A captured fault seen as a subject, so the raised failure can be
/// inspected (and recorded) like any other object.
#[derive(Debug, Clone)]
pub(crate) struct FaultSubject(pub(crate) Fault);

impl Subject for FaultSubject {
    fn repr(&self) -> String {
        format!("{}({:?})", self.0.kind, self.0.message)
    }

    fn str(&mut self) -> SubjectResult {
        Ok(Reply::Data(Value::String(self.0.message.clone())))
    }

    fn truthy(&mut self) -> SubjectResult {
        Ok(Reply::Data(Value::Bool(true)))
    }

    fn get_attr(&mut self, name: &str) -> SubjectResult {
        match name {
            "kind" => Ok(Reply::Data(Value::String(self.0.kind.clone()))),
            "message" => Ok(Reply::Data(Value::String(self.0.message.clone()))),
            _ => self
                .0
                .detail
                .get(name)
                .cloned()
                .map(Reply::Data)
                .ok_or_else(|| {
                    Fault::new(
                        "AttributeError",
                        format!("{} has no attribute `{}`", self.0.kind, name),
                    )
                }),
        }
    }
}
