//! # Cassette - record an object's behavior, replay it offline
//!
//! Cassette wraps any value that implements [`Subject`](proxy::Subject) in a
//! transparent [`Proxy`](proxy::Proxy). Every operation performed on the proxy
//! (attribute and item reads, calls, comparisons, iteration, ...) is routed
//! through an [`Engine`](proxy::Engine), which can record what the subject
//! answered, reuse recorded answers, or replay them with no subject at all.
//!
//! ## Quick Start
//!
//! ```rust
//! use cassette_core::prelude::*;
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! engine.set_cache_mode(CacheMode::RecordOnly);
//!
//! let tracker = engine.proxy(JsonSubject::new(json!({"bugs": [{"id": 1}]})));
//! let first = tracker.get_attr("bugs")?.into_proxy()?.get_item(0)?;
//! assert_eq!(first.into_proxy()?.get_item("id")?.as_i64(), Some(1));
//!
//! let document = engine.serialize(&tracker)?;
//!
//! let replay = Engine::new();
//! replay.set_cache_mode(CacheMode::ReplayOnly);
//! let ghost = replay.deserialize(&document)?;
//! let bugs = ghost.get_attr("bugs")?.into_proxy()?;
//! assert!(bugs.len().unwrap_err().is_not_cached());
//! # Ok::<(), CassetteError>(())
//! ```
//!
//! ## Modes
//!
//! - [`CacheMode::Disabled`](proxy::CacheMode::Disabled): forward everything
//! - [`CacheMode::RecordOnly`](proxy::CacheMode::RecordOnly): forward and record the latest answer
//! - [`CacheMode::RecordAndReuse`](proxy::CacheMode::RecordAndReuse): answer from the record when possible
//! - [`CacheMode::ReplayOnly`](proxy::CacheMode::ReplayOnly): answer only from the record

pub mod config;
pub mod error;
pub mod proxy;
pub mod snapshot;
pub mod stub;
pub mod subjects;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CassetteConfig, CassetteConfigBuilder};
    pub use crate::error::{CassetteError, Result};
    pub use crate::proxy::{
        CacheMode, CapturedFailure, Engine, Fault, Operation, OperationKey, Outcome, Proxy,
        Reply, ReprMode, Resolved, Step, Subject, SubjectResult, run_chain,
    };
    pub use crate::subjects::JsonSubject;
}
