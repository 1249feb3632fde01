//! Class, schema, property and value model for the content directory.
//!
//! A [`Class`] owns a growing list of [`Property`] definitions and a growing
//! list of [`Schema`]s, each schema naming a subset of the class's properties.
//! An [`Entity`] is an instance of a class that supports one or more of its
//! schemas and holds a [`StoredPropertyValue`] per supported property.
//!
//! Values cross the directory boundary in two shapes:
//!
//! - [`InputPropertyValue`] -- what clients submit. `Hash`-typed properties
//!   accept raw text (`TextToHash`) here.
//! - [`StoredPropertyValue`] -- the canonical form kept in state. Hashed text
//!   is replaced by its digest; the original text is never retained.
//!
//! [`validate_input`] checks an input against its property definition and
//! produces the stored form.

pub mod class;
pub mod entity;
pub mod error;
pub mod limits;
pub mod permissions;
pub mod property;
pub mod validation;
pub mod value;

pub use class::{Class, Schema};
pub use entity::{Entity, InboundReferenceCounter};
pub use error::{ValidationError, ValidationResult};
pub use limits::{InputLengthConstraint, Limits};
pub use permissions::{ClassPermissions, CuratorGroup, EntityCreationVoucher, EntityPermissions};
pub use property::{
    EntityAccessLevel, Property, PropertyLockingPolicy, PropertyType, Type, VecPropertyType,
};
pub use validation::{validate_input, validate_vector_insert};
pub use value::{
    InputPropertyValue, InputValue, StoredPropertyValue, StoredValue, VecInputValue,
    VecStoredPropertyValue, VecStoredValue,
};
