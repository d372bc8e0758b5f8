//! Storage adapter abstraction for mdstore.
//!
//! This module provides a trait-based interface over the backends that
//! persist documents, stylesheets and images (Dropbox, a local SQLite
//! database, memory) and a registry for picking one from configuration.
//!
//! # Design Principles
//! - Interchangeable backends: callers only see [`StorageAdapter`]
//! - Explicit sessions: the bearer credential is passed in, never global
//! - Unified error semantics: "not found" is classified in one place per backend
//! - Single attempt: nothing is retried behind the caller's back

pub mod adapter;
pub mod dropbox;
pub mod local;
pub mod memory;
pub mod registry;
pub mod session;

#[cfg(test)]
mod contract;

pub use adapter::StorageAdapter;
pub use dropbox::{DropboxAdapter, DropboxConfig};
pub use local::{LocalAdapter, LocalConfig};
pub use memory::MemoryAdapter;
pub use registry::{create_default_registry, AdapterFactory, AdapterRegistry};
pub use session::{Credential, Session};
