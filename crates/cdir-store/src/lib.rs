//! Storage for the content directory.
//!
//! The directory never owns its state. Every read and write goes through the
//! [`DirectoryStore`] trait, supplied by the host: classes and entities keyed
//! by id, curator groups, per-controller creation vouchers, monotonic id
//! counters, and the set of hashes guarding unique property values.
//!
//! # Backends
//!
//! - [`InMemoryDirectoryStore`] -- `BTreeMap`-based store for tests, embedding
//!   and the CLI's JSON state file
//! - [`StagedStore`] -- a write-buffering overlay on top of any other store;
//!   nothing reaches the underlying store until [`StagedStore::commit`]
//!
//! # Design Rules
//!
//! 1. The store never interprets records. Validation happens above it.
//! 2. Reads return owned clones; callers mutate a copy and `put` it back.
//! 3. Id counters only move forward. Ids are never reused.

pub mod error;
pub mod memory;
pub mod staged;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{DirectorySnapshot, InMemoryDirectoryStore};
pub use staged::StagedStore;
pub use traits::DirectoryStore;
