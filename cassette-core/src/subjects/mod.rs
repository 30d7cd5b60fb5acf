//! Ready-made live subjects

mod json;

pub use json::JsonSubject;
