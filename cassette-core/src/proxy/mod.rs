//! Record/replay proxies
//!
//! A [`Proxy`] wraps one subject and funnels every operation performed on it
//! through its [`Engine`]. Depending on the engine's [`CacheMode`], the
//! outcome of each distinct operation is recorded in the proxy's own store
//! and can later be replayed without the subject present.
//!
//! # Example
//!
//! ```rust
//! use cassette_core::proxy::{CacheMode, Engine};
//! use cassette_core::stub::{StubEntry, StubSubject};
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! engine.set_cache_mode(CacheMode::RecordAndReuse);
//!
//! let api = StubSubject::new("api").with_attr("version", StubEntry::data(json!("1.2")));
//! let proxy = engine.proxy(api);
//! assert_eq!(proxy.get_attr("version")?.as_str(), Some("1.2"));
//!
//! // Later, possibly in another process
//! let document = engine.serialize(&proxy)?;
//! let replay = Engine::new();
//! replay.set_cache_mode(CacheMode::ReplayOnly);
//! let ghost = replay.deserialize(&document)?;
//! assert_eq!(ghost.get_attr("version")?.as_str(), Some("1.2"));
//! # Ok::<(), cassette_core::error::CassetteError>(())
//! ```

mod chain;
mod engine;
mod operation;
mod outcome;
mod store;
mod subject;

pub use chain::{Step, run_chain};
pub use engine::{CacheMode, Engine, ReprMode};
pub use operation::{Comparison, Operation, OperationKey};
pub use outcome::{CapturedFailure, Outcome, Resolved};
pub use store::Store;
pub use subject::{Fault, Reply, Subject, SubjectResult};

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{CassetteError, Result};

/// Store of recorded outcomes, keyed by operation
pub type OperationStore = Store<OperationKey, Outcome>;

/// What sits behind a proxy
enum Backing {
    /// A real subject
    Live(RefCell<Box<dyn Subject>>),
    /// Placeholder for proxies rebuilt from a document
    Ghost,
}

struct ProxyInner {
    engine: Engine,
    backing: Backing,
    store: RefCell<OperationStore>,
}

/// Handle to a recording/replaying proxy.
///
/// Clones share the subject and the store. Nested proxies handed out by an
/// operation are the same handles the store keeps, so operations on them
/// extend the recorded tree.
#[derive(Clone)]
pub struct Proxy {
    inner: Rc<ProxyInner>,
}

impl Proxy {
    pub(crate) fn live(engine: Engine, subject: Box<dyn Subject>) -> Self {
        Self::with_backing(engine, Backing::Live(RefCell::new(subject)), Store::new())
    }

    pub(crate) fn ghost(engine: Engine, store: OperationStore) -> Self {
        Self::with_backing(engine, Backing::Ghost, store)
    }

    fn with_backing(engine: Engine, backing: Backing, store: OperationStore) -> Self {
        Self {
            inner: Rc::new(ProxyInner {
                engine,
                backing,
                store: RefCell::new(store),
            }),
        }
    }

    /// The engine this proxy resolves through
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// Whether this proxy was rebuilt from a document and has no live subject
    pub fn is_ghost(&self) -> bool {
        matches!(self.inner.backing, Backing::Ghost)
    }

    /// Whether two handles point at the same proxy
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Description of the subject, for diagnostics
    pub fn subject_repr(&self) -> String {
        match &self.inner.backing {
            Backing::Live(subject) => match subject.try_borrow() {
                Ok(subject) => subject.repr(),
                Err(_) => "<subject in use>".to_string(),
            },
            Backing::Ghost => "<ghost>".to_string(),
        }
    }

    /// Number of recorded operations
    pub fn entry_count(&self) -> usize {
        self.inner.store.borrow().len()
    }

    /// Snapshot of the recorded `(key, outcome)` pairs, in recording order
    pub fn entries(&self) -> Vec<(OperationKey, Outcome)> {
        self.inner
            .store
            .borrow()
            .iter()
            .map(|(key, outcome)| (key.clone(), outcome.clone()))
            .collect()
    }

    /// The recorded outcome for `key`, if any
    pub fn lookup(&self, key: &OperationKey) -> Option<Outcome> {
        self.inner.store.borrow().get(key).cloned()
    }

    pub(crate) fn record(&self, key: OperationKey, outcome: Outcome) {
        let mut store = self.inner.store.borrow_mut();
        if store.contains_key(&key) {
            tracing::debug!(%key, "overwriting recorded outcome");
        } else {
            tracing::debug!(%key, "recording outcome");
        }
        store.put(key, outcome);
    }

    /// Run `invoker` against the live subject; `None` for ghosts
    pub(crate) fn invoke<I>(&self, invoker: I) -> Option<SubjectResult>
    where
        I: FnOnce(&mut dyn Subject) -> SubjectResult,
    {
        match &self.inner.backing {
            Backing::Live(subject) => Some(invoker(subject.borrow_mut().as_mut())),
            Backing::Ghost => None,
        }
    }

    /// Resolve an operation through the engine.
    ///
    /// This is the raw entry point behind every typed operation: `key_builder`
    /// names the operation, `invoker` performs it on the subject.
    pub fn resolve<K, I>(&self, key_builder: K, invoker: I) -> Result<Resolved>
    where
        K: FnOnce() -> OperationKey,
        I: FnOnce(&mut dyn Subject) -> SubjectResult,
    {
        self.inner.engine.resolve(self, key_builder, invoker)
    }

    /// Apply any operation from the table with explicit arguments
    pub fn apply(&self, op: Operation, args: Vec<Value>) -> Result<Resolved> {
        op.check_args(&args)
            .map_err(CassetteError::InvalidArguments)?;

        if !op.is_cached() {
            return self.forward(op, &args);
        }

        self.resolve(
            || OperationKey::new(op, args.clone()),
            |subject| op.dispatch(subject, &args),
        )
    }

    /// Send a mutation straight to the subject, in every mode
    fn forward(&self, op: Operation, args: &[Value]) -> Result<Resolved> {
        match self.invoke(|subject| op.dispatch(subject, args)) {
            Some(Ok(_)) => Ok(Resolved::Data(Value::Null)),
            Some(Err(fault)) => Err(CassetteError::Subject(fault)),
            None => Err(CassetteError::GhostInvoked {
                key: OperationKey::new(op, args.to_vec()),
            }),
        }
    }

    /// Stringification
    pub fn str_(&self) -> Result<Resolved> {
        self.apply(Operation::Str, Vec::new())
    }

    /// Length
    pub fn len(&self) -> Result<Resolved> {
        self.apply(Operation::Len, Vec::new())
    }

    /// `self < other`
    pub fn lt(&self, other: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::Lt, vec![other.into()])
    }

    /// `self <= other`
    pub fn le(&self, other: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::Le, vec![other.into()])
    }

    /// `self == other`
    pub fn eq(&self, other: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::Eq, vec![other.into()])
    }

    /// `self != other`
    pub fn ne(&self, other: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::Ne, vec![other.into()])
    }

    /// `self > other`
    pub fn gt(&self, other: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::Gt, vec![other.into()])
    }

    /// `self >= other`
    pub fn ge(&self, other: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::Ge, vec![other.into()])
    }

    /// Three-way comparison
    pub fn cmp(&self, other: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::Cmp, vec![other.into()])
    }

    /// Hash value
    pub fn hash(&self) -> Result<Resolved> {
        self.apply(Operation::Hash, Vec::new())
    }

    /// Truthiness
    pub fn truthy(&self) -> Result<Resolved> {
        self.apply(Operation::Bool, Vec::new())
    }

    /// Forward iteration
    pub fn iter(&self) -> Result<Resolved> {
        self.apply(Operation::Iter, Vec::new())
    }

    /// Reverse iteration
    pub fn reversed(&self) -> Result<Resolved> {
        self.apply(Operation::Reversed, Vec::new())
    }

    /// Membership test
    pub fn contains(&self, item: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::Contains, vec![item.into()])
    }

    /// Item read
    pub fn get_item(&self, key: impl Into<Value>) -> Result<Resolved> {
        self.apply(Operation::GetItem, vec![key.into()])
    }

    /// Item write; never cached
    pub fn set_item(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        self.apply(Operation::SetItem, vec![key.into(), value.into()])
            .map(|_| ())
    }

    /// Item delete; never cached
    pub fn del_item(&self, key: impl Into<Value>) -> Result<()> {
        self.apply(Operation::DelItem, vec![key.into()]).map(|_| ())
    }

    /// Attribute read
    pub fn get_attr(&self, name: &str) -> Result<Resolved> {
        self.apply(Operation::GetAttr, vec![Value::String(name.to_string())])
    }

    /// Call the proxy itself
    pub fn call(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<Resolved> {
        self.apply(Operation::Call, vec![Value::Array(args), Value::Object(kwargs)])
    }

    /// Read attribute `name` and call it with positional `args`
    pub fn call_method(&self, name: &str, args: Vec<Value>) -> Result<Resolved> {
        self.get_attr(name)?.into_proxy()?.call(args, Map::new())
    }

    /// Presentation according to the engine's [`ReprMode`].
    ///
    /// In [`ReprMode::Subject`] the subject's own representation is resolved
    /// through the cache; a replay-only miss falls back to the proxy's own
    /// identity, marked as such.
    pub fn repr(&self) -> Result<String> {
        match self.engine().repr_mode() {
            ReprMode::Real => Ok(self.own_repr(None)),
            ReprMode::Subject => match self.apply(Operation::Repr, Vec::new()) {
                Ok(Resolved::Data(Value::String(text))) => Ok(text),
                Ok(other) => Ok(other.to_string()),
                Err(CassetteError::NotCached { .. }) => Ok(self.own_repr(Some("(fallback mode)"))),
                Err(err) => Err(err),
            },
        }
    }

    fn own_repr(&self, prefix: Option<&str>) -> String {
        let store = self.inner.store.borrow();
        let keys: Vec<String> = store.keys().iter().map(ToString::to_string).collect();
        let values: Vec<String> = store.values().iter().map(ToString::to_string).collect();
        format!(
            "<{}Proxy over {} with keys:[{}] values:[{}] at {:p}>",
            prefix.unwrap_or_default(),
            self.subject_repr(),
            keys.join(", "),
            values.join(", "),
            Rc::as_ptr(&self.inner)
        )
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr() {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<Proxy over {} (repr failed: {})>", self.subject_repr(), err),
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("subject", &self.subject_repr())
            .field("entries", &self.entry_count())
            .finish()
    }
}
