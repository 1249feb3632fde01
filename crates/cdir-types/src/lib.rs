//! Foundation types for the content directory.
//!
//! This crate provides the identifiers and identity primitives shared by every
//! other `cdir` crate.
//!
//! # Key Types
//!
//! - [`ClassId`], [`EntityId`] -- arena indices for classes and entities
//! - [`PropertyId`], [`SchemaId`] -- positions inside a class
//! - [`Actor`] -- who is performing an operation
//! - [`EntityController`] -- who controls an entity
//! - [`HashValue`] -- BLAKE3 digest stored in place of hashed text

pub mod actor;
pub mod error;
pub mod hash;
pub mod ids;

pub use actor::{Actor, EntityController};
pub use error::TypeError;
pub use hash::HashValue;
pub use ids::{
    ClassId, CuratorGroupId, CuratorId, EntityId, IdKind, MemberId, Nonce, PropertyId, SchemaId,
    TextMaxLength, VecMaxLength,
};
