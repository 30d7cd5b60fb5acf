//! Resolution engine
//!
//! The engine owns the cache and presentation modes shared by every proxy it
//! creates, and decides for each intercepted operation whether to call the
//! subject, record the outcome, reuse a recorded outcome, or fail.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::outcome::{CapturedFailure, Outcome, Resolved};
use super::subject::{FaultSubject, Reply, Subject, SubjectResult};
use super::{OperationKey, Proxy};
use crate::config::CassetteConfig;
use crate::error::{CassetteError, Result};

/// How the cache is consulted and populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Forward everything; compute no keys, store nothing (default)
    #[default]
    #[serde(alias = "none")]
    Disabled,

    /// Always call the subject and record the latest outcome
    #[serde(alias = "keep")]
    RecordOnly,

    /// Reuse recorded outcomes; call and record on a miss
    #[serde(alias = "use")]
    RecordAndReuse,

    /// Answer only from recorded outcomes; never call the subject
    #[serde(alias = "pure")]
    ReplayOnly,
}

impl CacheMode {
    /// Whether outcomes are written to the store in this mode
    pub fn records(self) -> bool {
        matches!(self, CacheMode::RecordOnly | CacheMode::RecordAndReuse)
    }
}

/// How a proxy presents itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReprMode {
    /// Show the proxy's own identity and recorded entries (default)
    #[default]
    Real,

    /// Show the subject's identity, resolved through the cache
    Subject,
}

struct EngineState {
    cache_mode: Cell<CacheMode>,
    repr_mode: Cell<ReprMode>,
    pretty: Cell<bool>,
}

/// Shared configuration and resolution logic for a family of proxies.
///
/// Cloning an engine yields another handle to the same modes. Proxies keep a
/// handle to the engine that created them, so a mode change applies to all of
/// them from that moment on; separate engines never see each other's modes.
#[derive(Clone)]
pub struct Engine {
    state: Rc<EngineState>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("cache_mode", &self.cache_mode())
            .field("repr_mode", &self.repr_mode())
            .finish()
    }
}

impl Engine {
    /// Create an engine with the least intrusive settings
    pub fn new() -> Self {
        Self::from_config(&CassetteConfig::default())
    }

    /// Create an engine from loaded configuration
    pub fn from_config(config: &CassetteConfig) -> Self {
        Self {
            state: Rc::new(EngineState {
                cache_mode: Cell::new(config.cache.mode),
                repr_mode: Cell::new(config.presentation.mode),
                pretty: Cell::new(config.document.pretty),
            }),
        }
    }

    /// Current cache mode
    pub fn cache_mode(&self) -> CacheMode {
        self.state.cache_mode.get()
    }

    /// Switch the cache mode for every proxy of this engine
    pub fn set_cache_mode(&self, mode: CacheMode) {
        let previous = self.state.cache_mode.replace(mode);
        if previous != mode {
            tracing::debug!(?previous, current = ?mode, "cache mode changed");
        }
    }

    /// Current presentation mode
    pub fn repr_mode(&self) -> ReprMode {
        self.state.repr_mode.get()
    }

    /// Switch the presentation mode for every proxy of this engine
    pub fn set_repr_mode(&self, mode: ReprMode) {
        let previous = self.state.repr_mode.replace(mode);
        if previous != mode {
            tracing::debug!(?previous, current = ?mode, "repr mode changed");
        }
    }

    /// Whether documents are pretty-printed
    pub fn pretty(&self) -> bool {
        self.state.pretty.get()
    }

    /// Toggle pretty-printed documents
    pub fn set_pretty(&self, pretty: bool) {
        self.state.pretty.set(pretty);
    }

    /// Whether two handles share the same state
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Wrap a live subject in a new proxy
    pub fn proxy(&self, subject: impl Subject + 'static) -> Proxy {
        self.proxy_boxed(Box::new(subject))
    }

    /// Wrap an already boxed subject in a new proxy
    pub fn proxy_boxed(&self, subject: Box<dyn Subject>) -> Proxy {
        Proxy::live(self.clone(), subject)
    }

    /// Turn a raw reply into what the caller sees.
    ///
    /// Plain data passes through; objects become nested proxies; lists are
    /// wrapped element by element.
    pub fn wrap(&self, reply: Reply) -> Resolved {
        match reply {
            Reply::Data(value) => Resolved::Data(value),
            Reply::Object(subject) => Resolved::Proxy(self.proxy_boxed(subject)),
            Reply::List(items) => {
                Resolved::normalize_list(items.into_iter().map(|item| self.wrap(item)).collect())
            }
        }
    }

    /// Turn a subject result into a storable outcome
    fn capture(&self, key: &OperationKey, result: SubjectResult) -> Outcome {
        match result {
            Ok(reply) => Outcome::Value(self.wrap(reply)),
            Err(fault) => {
                tracing::warn!(
                    %key,
                    kind = %fault.kind,
                    detail = %fault.message,
                    "captured subject failure"
                );
                Outcome::Failure(CapturedFailure {
                    kind: fault.kind.clone(),
                    message: fault.message.clone(),
                    proxy: self.proxy(FaultSubject(fault)),
                })
            }
        }
    }

    /// Resolve one operation against `proxy` under the current cache mode.
    ///
    /// `key_builder` is only called when the mode needs a key. `invoker`
    /// performs the real operation and is never called in replay-only mode
    /// or on a record-and-reuse hit.
    pub fn resolve<K, I>(&self, proxy: &Proxy, key_builder: K, invoker: I) -> Result<Resolved>
    where
        K: FnOnce() -> OperationKey,
        I: FnOnce(&mut dyn Subject) -> SubjectResult,
    {
        match self.cache_mode() {
            CacheMode::Disabled => match proxy.invoke(invoker) {
                Some(Ok(reply)) => Ok(self.wrap(reply)),
                Some(Err(fault)) => Err(CassetteError::Subject(fault)),
                None => Err(CassetteError::GhostInvoked { key: key_builder() }),
            },
            CacheMode::RecordOnly => {
                let result = proxy.invoke(invoker);
                let key = key_builder();
                let Some(result) = result else {
                    return Err(CassetteError::GhostInvoked { key });
                };
                let outcome = self.capture(&key, result);
                proxy.record(key, outcome.clone());
                outcome.unwrap_outcome()
            }
            CacheMode::RecordAndReuse => {
                let key = key_builder();
                if let Some(outcome) = proxy.lookup(&key) {
                    tracing::debug!(%key, "cache hit");
                    return outcome.unwrap_outcome();
                }
                tracing::debug!(%key, "cache miss, invoking subject");
                let Some(result) = proxy.invoke(invoker) else {
                    return Err(CassetteError::GhostInvoked { key });
                };
                let outcome = self.capture(&key, result);
                proxy.record(key, outcome.clone());
                outcome.unwrap_outcome()
            }
            CacheMode::ReplayOnly => {
                let key = key_builder();
                match proxy.lookup(&key) {
                    Some(outcome) => outcome.unwrap_outcome(),
                    None => {
                        tracing::debug!(%key, "replay miss");
                        Err(CassetteError::NotCached {
                            subject: proxy.subject_repr(),
                            key,
                        })
                    }
                }
            }
        }
    }

    /// Serialize `proxy` and everything recorded under it
    pub fn serialize(&self, proxy: &Proxy) -> Result<String> {
        crate::snapshot::to_document(proxy, self.pretty())
    }

    /// Rebuild a proxy tree from a document; the tree belongs to this engine.
    ///
    /// The cache mode is left alone: switch to [`CacheMode::ReplayOnly`]
    /// before using the result.
    pub fn deserialize(&self, document: &str) -> Result<Proxy> {
        crate::snapshot::from_document(self, document)
    }
}
