//! Live subject over a JSON document
//!
//! Object fields are readable as attributes or items, array elements as
//! items. Nested objects and arrays come back as further [`JsonSubject`]s
//! pointing into the same shared document, so item writes through any
//! handle are visible to every other handle.

use serde_json::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::Rc;

use crate::proxy::{Comparison, Fault, Reply, Subject, SubjectResult};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
}

/// A subject backed by (part of) a shared JSON document
#[derive(Debug, Clone)]
pub struct JsonSubject {
    root: Rc<RefCell<Value>>,
    path: Vec<Segment>,
}

impl JsonSubject {
    /// Wrap a whole document
    pub fn new(document: Value) -> Self {
        Self {
            root: Rc::new(RefCell::new(document)),
            path: Vec::new(),
        }
    }

    /// A copy of the value this subject points at, if it still exists
    pub fn value(&self) -> Option<Value> {
        let root = self.root.borrow();
        Self::walk(&root, &self.path).cloned()
    }

    /// JSON pointer of this subject within the document
    pub fn pointer(&self) -> String {
        if self.path.is_empty() {
            return "/".to_string();
        }
        self.path
            .iter()
            .map(|segment| match segment {
                Segment::Field(name) => format!("/{}", name.replace('~', "~0").replace('/', "~1")),
                Segment::Index(index) => format!("/{}", index),
            })
            .collect()
    }

    fn walk<'a>(root: &'a Value, path: &[Segment]) -> Option<&'a Value> {
        path.iter().try_fold(root, |node, segment| match segment {
            Segment::Field(name) => node.as_object()?.get(name),
            Segment::Index(index) => node.as_array()?.get(*index),
        })
    }

    fn walk_mut<'a>(root: &'a mut Value, path: &[Segment]) -> Option<&'a mut Value> {
        path.iter().try_fold(root, |node, segment| match segment {
            Segment::Field(name) => node.as_object_mut()?.get_mut(name),
            Segment::Index(index) => node.as_array_mut()?.get_mut(*index),
        })
    }

    fn gone(&self) -> Fault {
        Fault::new(
            "LookupError",
            format!("{} no longer exists in the document", self.pointer()),
        )
    }

    /// Run `f` against the current node
    fn with_node<R>(&self, f: impl FnOnce(&Value) -> Result<R, Fault>) -> Result<R, Fault> {
        let root = self.root.borrow();
        let node = Self::walk(&root, &self.path).ok_or_else(|| self.gone())?;
        f(node)
    }

    fn with_node_mut<R>(
        &self,
        f: impl FnOnce(&mut Value) -> Result<R, Fault>,
    ) -> Result<R, Fault> {
        let mut root = self.root.borrow_mut();
        let node = Self::walk_mut(&mut root, &self.path).ok_or_else(|| self.gone())?;
        f(node)
    }

    /// Reply for the child at `segment`: scalars as data, containers as subjects
    fn child(&self, segment: Segment, value: &Value) -> Reply {
        match value {
            Value::Array(_) | Value::Object(_) => {
                let mut path = self.path.clone();
                path.push(segment);
                Reply::object(JsonSubject {
                    root: Rc::clone(&self.root),
                    path,
                })
            }
            scalar => Reply::Data(scalar.clone()),
        }
    }

    fn children(&self, node: &Value) -> Result<Vec<Reply>, Fault> {
        match node {
            Value::Array(items) => Ok(items
                .iter()
                .enumerate()
                .map(|(index, item)| self.child(Segment::Index(index), item))
                .collect()),
            Value::Object(fields) => Ok(fields
                .keys()
                .map(|name| Reply::Data(Value::String(name.clone())))
                .collect()),
            Value::String(text) => Ok(text
                .chars()
                .map(|c| Reply::Data(Value::String(c.to_string())))
                .collect()),
            other => Err(type_error("iterate", other)),
        }
    }
}

fn type_error(operation: &str, value: &Value) -> Fault {
    Fault::new(
        "TypeError",
        format!("cannot {} a JSON {}", operation, type_name(value)),
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resolve a possibly negative index against `len`
fn array_index(key: &Value, len: usize) -> Result<usize, Fault> {
    let raw = key
        .as_i64()
        .ok_or_else(|| Fault::new("TypeError", format!("array index must be an integer, got {}", key)))?;
    let index = if raw < 0 { raw + len as i64 } else { raw };
    if index < 0 || index >= len as i64 {
        return Err(Fault::new("IndexError", format!("index {} out of range", raw))
            .with_detail("index", raw));
    }
    Ok(index as usize)
}

fn object_key(key: &Value) -> Result<&str, Fault> {
    key.as_str()
        .ok_or_else(|| Fault::new("TypeError", format!("object key must be a string, got {}", key)))
}

fn order(left: &Value, right: &Value) -> Result<Ordering, Fault> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b)
                .ok_or_else(|| Fault::new("ValueError", "numbers are not comparable"))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (a, b) => Err(Fault::new(
            "TypeError",
            format!("cannot order a JSON {} against a {}", type_name(a), type_name(b)),
        )),
    }
}

impl Subject for JsonSubject {
    fn repr(&self) -> String {
        format!("<json {}>", self.pointer())
    }

    fn str(&mut self) -> SubjectResult {
        self.with_node(|node| {
            let text = match node {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            Ok(Reply::Data(Value::String(text)))
        })
    }

    fn len(&mut self) -> SubjectResult {
        self.with_node(|node| {
            let len = match node {
                Value::Array(items) => items.len(),
                Value::Object(fields) => fields.len(),
                Value::String(text) => text.chars().count(),
                other => return Err(type_error("take the length of", other)),
            };
            Ok(Reply::Data(Value::from(len)))
        })
    }

    fn compare(&mut self, comparison: Comparison, other: &Value) -> SubjectResult {
        self.with_node(|node| {
            let answer = match comparison {
                Comparison::Eq => Value::Bool(node == other),
                Comparison::Ne => Value::Bool(node != other),
                Comparison::Lt => Value::Bool(order(node, other)? == Ordering::Less),
                Comparison::Le => Value::Bool(order(node, other)? != Ordering::Greater),
                Comparison::Gt => Value::Bool(order(node, other)? == Ordering::Greater),
                Comparison::Ge => Value::Bool(order(node, other)? != Ordering::Less),
                Comparison::Cmp => Value::from(order(node, other)? as i8),
            };
            Ok(Reply::Data(answer))
        })
    }

    fn hash(&mut self) -> SubjectResult {
        self.with_node(|node| {
            let mut hasher = DefaultHasher::new();
            node.to_string().hash(&mut hasher);
            Ok(Reply::Data(Value::from(hasher.finish())))
        })
    }

    fn truthy(&mut self) -> SubjectResult {
        self.with_node(|node| {
            let truth = match node {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                Value::String(text) => !text.is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(fields) => !fields.is_empty(),
            };
            Ok(Reply::Data(Value::Bool(truth)))
        })
    }

    fn iter(&mut self) -> SubjectResult {
        self.with_node(|node| self.children(node).map(Reply::List))
    }

    fn reversed(&mut self) -> SubjectResult {
        self.with_node(|node| {
            let mut items = self.children(node)?;
            items.reverse();
            Ok(Reply::List(items))
        })
    }

    fn contains(&mut self, item: &Value) -> SubjectResult {
        self.with_node(|node| {
            let found = match (node, item) {
                (Value::Array(items), item) => items.contains(item),
                (Value::Object(fields), Value::String(name)) => fields.contains_key(name),
                (Value::String(text), Value::String(needle)) => text.contains(needle.as_str()),
                (other, _) => return Err(type_error("test membership in", other)),
            };
            Ok(Reply::Data(Value::Bool(found)))
        })
    }

    fn get_item(&mut self, key: &Value) -> SubjectResult {
        self.with_node(|node| match node {
            Value::Array(items) => {
                let index = array_index(key, items.len())?;
                Ok(self.child(Segment::Index(index), &items[index]))
            }
            Value::Object(fields) => {
                let name = object_key(key)?;
                fields
                    .get(name)
                    .map(|value| self.child(Segment::Field(name.to_string()), value))
                    .ok_or_else(|| {
                        Fault::new("KeyError", key.to_string()).with_detail("key", key.clone())
                    })
            }
            other => Err(type_error("index", other)),
        })
    }

    fn set_item(&mut self, key: &Value, value: Value) -> Result<(), Fault> {
        self.with_node_mut(|node| match node {
            Value::Array(items) => {
                let index = array_index(key, items.len())?;
                items[index] = value;
                Ok(())
            }
            Value::Object(fields) => {
                fields.insert(object_key(key)?.to_string(), value);
                Ok(())
            }
            other => Err(type_error("assign into", other)),
        })
    }

    fn del_item(&mut self, key: &Value) -> Result<(), Fault> {
        self.with_node_mut(|node| match node {
            Value::Array(items) => {
                let index = array_index(key, items.len())?;
                items.remove(index);
                Ok(())
            }
            Value::Object(fields) => fields
                .remove(object_key(key)?)
                .map(|_| ())
                .ok_or_else(|| Fault::new("KeyError", key.to_string()).with_detail("key", key.clone())),
            other => Err(type_error("delete from", other)),
        })
    }

    fn get_attr(&mut self, name: &str) -> SubjectResult {
        self.with_node(|node| {
            node.as_object()
                .and_then(|fields| fields.get(name))
                .map(|value| self.child(Segment::Field(name.to_string()), value))
                .ok_or_else(|| {
                    Fault::new(
                        "AttributeError",
                        format!("JSON {} has no attribute `{}`", type_name(node), name),
                    )
                    .with_detail("name", name)
                })
        })
    }
}
