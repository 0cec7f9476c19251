//! Search subsystem of the forum backend.
//!
//! Clients send a JSON filter tree plus paging and sort directives; the crate
//! validates the tree, resolves property paths against the entity schemas,
//! compiles a native predicate, and runs it against a [`query::Store`].

#![warn(missing_docs)]

pub mod config;
pub mod query;

pub use config::{ConfigError, SearchOptions};
