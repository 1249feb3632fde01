//! Versioned entity-attribute-value content directory.
//!
//! Classes declare typed properties and group them into schemas. Entities
//! are instances of a class that adopt schemas one at a time and hold a
//! value per adopted property. Reference-typed values link entities, and
//! every entity tracks how many values point at it, so nothing still
//! referenced can be deleted.
//!
//! # Components
//!
//! - [`ClassRegistry`] -- classes, properties, schemas and curator groups
//! - [`EntityStore`] -- entity lifecycle, value updates and vector editing
//! - [`ReferenceIntegrityTracker`] -- inbound reference counters
//! - [`BatchExecutor`] -- atomic operation lists whose later operations may
//!   refer to entities created earlier in the same batch
//! - [`Directory`] -- facade running every mutation against a staged copy
//!   of the host store
//!
//! # Example
//!
//! ```
//! use cdir_directory::{ClassDefinition, Directory, Operation, ParametrizedEntity};
//! use cdir_schema::{InputPropertyValue, InputValue, Property, PropertyType, Type};
//! use cdir_types::Actor;
//!
//! let directory: Directory = Directory::default();
//! let class_id = directory
//!     .define_class(
//!         &Actor::Lead,
//!         &ClassDefinition::new("Album", 100, 10)
//!             .with_property(
//!                 Property::new("title", PropertyType::Single(Type::Text(64))).required(),
//!             )
//!             .with_schema([0]),
//!     )
//!     .unwrap();
//!
//! let title = InputPropertyValue::Single(InputValue::Text("Blue".into()));
//! let created = directory
//!     .execute_batch(
//!         &Actor::Lead,
//!         vec![
//!             Operation::CreateEntity { class_id },
//!             Operation::AddSchemaSupportToEntity {
//!                 entity: ParametrizedEntity::InternalEntityJustAdded(0),
//!                 schema_id: 0,
//!                 values: [(0, title.into())].into(),
//!             },
//!         ],
//!     )
//!     .unwrap();
//! assert_eq!(created.len(), 1);
//! ```

pub mod batch;
pub mod config;
pub mod directory;
pub mod entities;
pub mod error;
pub mod plain;
pub mod references;
pub mod registry;
mod unique;

pub use batch::{BatchExecutor, Operation, ParametrizedEntity, ParametrizedPropertyValue};
pub use config::DirectoryConfig;
pub use directory::Directory;
pub use entities::{EntityPermissionsUpdate, EntityStore};
pub use error::{
    BatchError, BatchResolutionError, DirectoryError, DirectoryResult, ReferenceIntegrityError,
};
pub use plain::{
    from_plain_update, to_plain, to_plain_object, PlainOptions, PlainRecord, PlainValue,
};
pub use references::{
    reference_count_diff, ReferenceDelta, ReferenceDeltas, ReferenceIntegrityTracker,
};
pub use registry::{ClassDefinition, ClassPermissionsUpdate, ClassRegistry};
