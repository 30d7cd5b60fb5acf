//! Operation table and operation keys
//!
//! Every operation a proxy can intercept is a variant of [`Operation`]. The
//! enum doubles as the dispatch table: it knows its wire name, how many
//! arguments it takes, whether its outcome is cached, and which [`Subject`]
//! method performs it.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::subject::{Fault, Reply, Subject, SubjectResult};

/// Comparison flavour passed to [`Subject::compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    /// Three-way comparison returning a negative, zero or positive number
    Cmp,
}

/// An interceptable operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Str,
    Repr,
    Len,
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    Cmp,
    Hash,
    Bool,
    Iter,
    Reversed,
    Contains,
    GetItem,
    SetItem,
    DelItem,
    GetAttr,
    Call,
}

impl Operation {
    /// Every operation, in table order
    pub const ALL: [Operation; 20] = [
        Operation::Str,
        Operation::Repr,
        Operation::Len,
        Operation::Lt,
        Operation::Le,
        Operation::Eq,
        Operation::Ne,
        Operation::Gt,
        Operation::Ge,
        Operation::Cmp,
        Operation::Hash,
        Operation::Bool,
        Operation::Iter,
        Operation::Reversed,
        Operation::Contains,
        Operation::GetItem,
        Operation::SetItem,
        Operation::DelItem,
        Operation::GetAttr,
        Operation::Call,
    ];

    /// Stable name used in keys and documents
    pub fn name(self) -> &'static str {
        match self {
            Operation::Str => "str",
            Operation::Repr => "repr",
            Operation::Len => "len",
            Operation::Lt => "lt",
            Operation::Le => "le",
            Operation::Eq => "eq",
            Operation::Ne => "ne",
            Operation::Gt => "gt",
            Operation::Ge => "ge",
            Operation::Cmp => "cmp",
            Operation::Hash => "hash",
            Operation::Bool => "bool",
            Operation::Iter => "iter",
            Operation::Reversed => "reversed",
            Operation::Contains => "contains",
            Operation::GetItem => "getitem",
            Operation::SetItem => "setitem",
            Operation::DelItem => "delitem",
            Operation::GetAttr => "getattr",
            Operation::Call => "call",
        }
    }

    /// Number of arguments the operation takes
    pub fn arity(self) -> usize {
        match self {
            Operation::Str
            | Operation::Repr
            | Operation::Len
            | Operation::Hash
            | Operation::Bool
            | Operation::Iter
            | Operation::Reversed => 0,
            Operation::Lt
            | Operation::Le
            | Operation::Eq
            | Operation::Ne
            | Operation::Gt
            | Operation::Ge
            | Operation::Cmp
            | Operation::Contains
            | Operation::GetItem
            | Operation::DelItem
            | Operation::GetAttr => 1,
            Operation::SetItem | Operation::Call => 2,
        }
    }

    /// Whether outcomes of this operation go through the cache.
    ///
    /// Item writes and deletes are mutations of the subject and are always
    /// forwarded directly.
    pub fn is_cached(self) -> bool {
        !matches!(self, Operation::SetItem | Operation::DelItem)
    }

    /// The comparison this operation performs, if it is one
    pub fn comparison(self) -> Option<Comparison> {
        match self {
            Operation::Lt => Some(Comparison::Lt),
            Operation::Le => Some(Comparison::Le),
            Operation::Eq => Some(Comparison::Eq),
            Operation::Ne => Some(Comparison::Ne),
            Operation::Gt => Some(Comparison::Gt),
            Operation::Ge => Some(Comparison::Ge),
            Operation::Cmp => Some(Comparison::Cmp),
            _ => None,
        }
    }

    /// Check that `args` have the shape this operation expects
    pub fn check_args(self, args: &[Value]) -> Result<(), String> {
        if args.len() != self.arity() {
            return Err(format!(
                "operation `{}` takes {} argument(s), got {}",
                self.name(),
                self.arity(),
                args.len()
            ));
        }
        match self {
            Operation::GetAttr if !args[0].is_string() => Err(format!(
                "operation `getattr` needs a string attribute name, got {}",
                args[0]
            )),
            Operation::Call if !args[0].is_array() || !args[1].is_object() => Err(format!(
                "operation `call` needs [positional array, named object], got {} and {}",
                args[0], args[1]
            )),
            _ => Ok(()),
        }
    }

    /// Perform the operation against a live subject
    pub fn dispatch(self, subject: &mut dyn Subject, args: &[Value]) -> SubjectResult {
        self.check_args(args)
            .map_err(|message| Fault::new("TypeError", message))?;

        if let Some(comparison) = self.comparison() {
            return subject.compare(comparison, &args[0]);
        }

        match self {
            Operation::Str => subject.str(),
            Operation::Repr => Ok(Reply::Data(Value::String(subject.repr()))),
            Operation::Len => subject.len(),
            Operation::Hash => subject.hash(),
            Operation::Bool => subject.truthy(),
            Operation::Iter => subject.iter(),
            Operation::Reversed => subject.reversed(),
            Operation::Contains => subject.contains(&args[0]),
            Operation::GetItem => subject.get_item(&args[0]),
            Operation::SetItem => subject
                .set_item(&args[0], args[1].clone())
                .map(|()| Reply::Data(Value::Null)),
            Operation::DelItem => subject
                .del_item(&args[0])
                .map(|()| Reply::Data(Value::Null)),
            Operation::GetAttr => subject.get_attr(args[0].as_str().unwrap_or_default()),
            Operation::Call => {
                let positional = args[0].as_array().map(Vec::as_slice).unwrap_or_default();
                let empty = Map::new();
                let named = args[1].as_object().unwrap_or(&empty);
                subject.call(positional, named)
            }
            _ => unreachable!("comparisons are dispatched above"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| format!("unknown operation `{}`", s))
    }
}

/// Identifies one operation: its name plus its arguments, in order.
///
/// Two keys are equal iff the operations match and every argument compares
/// equal. Arguments may be any JSON value; arrays compare structurally and
/// order-sensitively, which is what makes keys read back from a document
/// match the keys that were recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationKey {
    pub op: Operation,
    pub args: Vec<Value>,
}

impl OperationKey {
    /// Build a key from an operation and its arguments
    pub fn new(op: Operation, args: Vec<Value>) -> Self {
        Self { op, args }
    }

    /// Key for a zero-argument operation
    pub fn bare(op: Operation) -> Self {
        Self::new(op, Vec::new())
    }

    /// Key for a call with positional and named arguments
    pub fn call(positional: Vec<Value>, named: Map<String, Value>) -> Self {
        Self::new(
            Operation::Call,
            vec![Value::Array(positional), Value::Object(named)],
        )
    }

    /// Key for an attribute read
    pub fn attr(name: impl Into<String>) -> Self {
        Self::new(Operation::GetAttr, vec![Value::String(name.into())])
    }

    /// Flatten into the wire form `[name, arg0, arg1, ...]`
    pub fn to_value(&self) -> Value {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(Value::String(self.op.name().to_string()));
        parts.extend(self.args.iter().cloned());
        Value::Array(parts)
    }

    /// Rebuild a key from its wire form
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let parts = value
            .as_array()
            .ok_or_else(|| format!("operation key must be an array, got {}", value))?;
        let (head, args) = parts
            .split_first()
            .ok_or_else(|| "operation key is empty".to_string())?;
        let name = head
            .as_str()
            .ok_or_else(|| format!("operation key must start with a name, got {}", head))?;
        let op: Operation = name.parse()?;
        op.check_args(args)?;
        Ok(Self::new(op, args.to_vec()))
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for OperationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.args.len() + 1))?;
        seq.serialize_element(self.op.name())?;
        for arg in &self.args {
            seq.serialize_element(arg)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for OperationKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        OperationKey::from_value(&value).map_err(de::Error::custom)
    }
}
