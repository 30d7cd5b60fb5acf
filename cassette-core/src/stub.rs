//! Scripted stub subjects for deterministic tests and demos
//!
//! A [`StubSubject`] answers operations from predetermined entries instead of
//! a live resource, and counts every operation it receives. Callable stubs
//! return their scripted responses in order; once the script runs out the
//! last response repeats.
//!
//! Handles are cheap clones sharing one state, so the stub handed to a proxy
//! can still be inspected by the test that created it.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::Rc;

use crate::proxy::{Comparison, Fault, Reply, Subject, SubjectResult};

/// Predetermined answer for one attribute, item or call
#[derive(Debug, Clone)]
pub enum StubEntry {
    /// Plain data
    Data(Value),
    /// A nested stub (proxied by the caller)
    Object(StubSubject),
    /// A failure to raise
    Fail(Fault),
}

impl StubEntry {
    /// Plain data entry
    pub fn data(value: impl Into<Value>) -> Self {
        StubEntry::Data(value.into())
    }

    /// Nested stub entry
    pub fn object(subject: StubSubject) -> Self {
        StubEntry::Object(subject)
    }

    /// Failure entry
    pub fn fail(kind: impl Into<String>, message: impl Into<String>) -> Self {
        StubEntry::Fail(Fault::new(kind, message))
    }

    fn to_reply(&self) -> SubjectResult {
        match self {
            StubEntry::Data(value) => Ok(Reply::Data(value.clone())),
            StubEntry::Object(subject) => Ok(Reply::object(subject.clone())),
            StubEntry::Fail(fault) => Err(fault.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct StubState {
    name: String,
    attrs: BTreeMap<String, StubEntry>,
    items: Vec<(Value, StubEntry)>,
    responses: Vec<StubEntry>,
    call_history: Vec<Vec<Value>>,
    invocations: HashMap<&'static str, usize>,
}

/// A subject that answers from a script
#[derive(Debug, Clone)]
pub struct StubSubject {
    state: Rc<RefCell<StubState>>,
}

impl StubSubject {
    /// Create a stub with no attributes, items or responses
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Rc::new(RefCell::new(StubState {
                name: name.into(),
                ..Default::default()
            })),
        }
    }

    /// Create a callable stub returning `responses` in order
    pub fn with_responses(name: impl Into<String>, responses: Vec<StubEntry>) -> Self {
        let stub = Self::new(name);
        stub.state.borrow_mut().responses = responses;
        stub
    }

    /// Add an attribute
    pub fn with_attr(self, name: impl Into<String>, entry: StubEntry) -> Self {
        self.state.borrow_mut().attrs.insert(name.into(), entry);
        self
    }

    /// Add a callable attribute returning `responses` in order
    pub fn with_method(self, name: impl Into<String>, responses: Vec<StubEntry>) -> Self {
        let name = name.into();
        let method = StubSubject::with_responses(name.clone(), responses);
        self.with_attr(name, StubEntry::Object(method))
    }

    /// Add an item
    pub fn with_item(self, key: impl Into<Value>, entry: StubEntry) -> Self {
        self.state.borrow_mut().items.push((key.into(), entry));
        self
    }

    /// Stub name
    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    /// The stub behind attribute `name`, if it is one
    pub fn attr_stub(&self, name: &str) -> Option<StubSubject> {
        match self.state.borrow().attrs.get(name) {
            Some(StubEntry::Object(subject)) => Some(subject.clone()),
            _ => None,
        }
    }

    /// Number of times the stub itself has been called
    pub fn call_count(&self) -> usize {
        self.invocations("call")
    }

    /// Positional arguments of every call, in order
    pub fn call_history(&self) -> Vec<Vec<Value>> {
        self.state.borrow().call_history.clone()
    }

    /// Number of times operation `name` (e.g. `"getitem"`) reached the stub
    pub fn invocations(&self, name: &str) -> usize {
        self.state
            .borrow()
            .invocations
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of operations that reached the stub
    pub fn total_invocations(&self) -> usize {
        self.state.borrow().invocations.values().sum()
    }

    /// Current item keys, in insertion order
    pub fn item_keys(&self) -> Vec<Value> {
        self.state
            .borrow()
            .items
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Reset call count, history and invocation counters
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.call_history.clear();
        state.invocations.clear();
    }

    fn touch(&self, operation: &'static str) -> std::cell::RefMut<'_, StubState> {
        let mut state = self.state.borrow_mut();
        *state.invocations.entry(operation).or_insert(0) += 1;
        state
    }
}

fn key_error(key: &Value) -> Fault {
    Fault::new("KeyError", key.to_string()).with_detail("key", key.clone())
}

impl Subject for StubSubject {
    fn repr(&self) -> String {
        format!("<stub {}>", self.state.borrow().name)
    }

    fn str(&mut self) -> SubjectResult {
        let state = self.touch("str");
        Ok(Reply::Data(Value::String(state.name.clone())))
    }

    fn len(&mut self) -> SubjectResult {
        let state = self.touch("len");
        Ok(Reply::Data(Value::from(state.items.len())))
    }

    fn compare(&mut self, comparison: Comparison, other: &Value) -> SubjectResult {
        let state = self.touch("compare");
        let other = other.as_str().ok_or_else(|| {
            Fault::new("TypeError", format!("cannot compare stub with {}", other))
        })?;
        let ordering = state.name.as_str().cmp(other);
        let answer = match comparison {
            Comparison::Lt => Value::Bool(ordering == Ordering::Less),
            Comparison::Le => Value::Bool(ordering != Ordering::Greater),
            Comparison::Eq => Value::Bool(ordering == Ordering::Equal),
            Comparison::Ne => Value::Bool(ordering != Ordering::Equal),
            Comparison::Gt => Value::Bool(ordering == Ordering::Greater),
            Comparison::Ge => Value::Bool(ordering != Ordering::Less),
            Comparison::Cmp => Value::from(ordering as i8),
        };
        Ok(Reply::Data(answer))
    }

    fn hash(&mut self) -> SubjectResult {
        let state = self.touch("hash");
        let mut hasher = DefaultHasher::new();
        state.name.hash(&mut hasher);
        Ok(Reply::Data(Value::from(hasher.finish())))
    }

    fn truthy(&mut self) -> SubjectResult {
        let state = self.touch("bool");
        let non_empty =
            !state.items.is_empty() || !state.attrs.is_empty() || !state.responses.is_empty();
        Ok(Reply::Data(Value::Bool(non_empty)))
    }

    fn iter(&mut self) -> SubjectResult {
        let state = self.touch("iter");
        let items = state
            .items
            .iter()
            .map(|(_, entry)| entry.to_reply())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Reply::List(items))
    }

    fn reversed(&mut self) -> SubjectResult {
        let state = self.touch("reversed");
        let items = state
            .items
            .iter()
            .rev()
            .map(|(_, entry)| entry.to_reply())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Reply::List(items))
    }

    fn contains(&mut self, item: &Value) -> SubjectResult {
        let state = self.touch("contains");
        let found = state.items.iter().any(|(key, _)| key == item);
        Ok(Reply::Data(Value::Bool(found)))
    }

    fn get_item(&mut self, key: &Value) -> SubjectResult {
        let state = self.touch("getitem");
        state
            .items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| entry.to_reply())
            .unwrap_or_else(|| Err(key_error(key)))
    }

    fn set_item(&mut self, key: &Value, value: Value) -> Result<(), Fault> {
        let mut state = self.touch("setitem");
        match state.items.iter_mut().find(|(k, _)| k == key) {
            Some((_, entry)) => *entry = StubEntry::Data(value),
            None => state.items.push((key.clone(), StubEntry::Data(value))),
        }
        Ok(())
    }

    fn del_item(&mut self, key: &Value) -> Result<(), Fault> {
        let mut state = self.touch("delitem");
        let index = state
            .items
            .iter()
            .position(|(k, _)| k == key)
            .ok_or_else(|| key_error(key))?;
        state.items.remove(index);
        Ok(())
    }

    fn get_attr(&mut self, name: &str) -> SubjectResult {
        let state = self.touch("getattr");
        match state.attrs.get(name) {
            Some(entry) => entry.to_reply(),
            None => Err(Fault::new(
                "AttributeError",
                format!("stub {} has no attribute `{}`", state.name, name),
            )
            .with_detail("name", name)),
        }
    }

    fn call(&mut self, args: &[Value], _kwargs: &Map<String, Value>) -> SubjectResult {
        let call_num = self.invocations("call");
        let mut state = self.touch("call");
        state.call_history.push(args.to_vec());

        if call_num < state.responses.len() {
            state.responses[call_num].to_reply()
        } else if let Some(last) = state.responses.last() {
            // Repeat last response if we've run out
            last.to_reply()
        } else {
            Err(Fault::new(
                "TypeError",
                format!("stub {} is not callable", state.name),
            ))
        }
    }
}
