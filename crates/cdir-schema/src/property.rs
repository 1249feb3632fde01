use cdir_types::{ClassId, TextMaxLength, VecMaxLength};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::limits::Limits;

/// Scalar kind of a property or of the items of a vector property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    #[default]
    Bool,
    Uint16,
    Uint32,
    Uint64,
    Int16,
    Int32,
    Int64,
    /// Text of at most the given number of bytes.
    Text(TextMaxLength),
    /// Text accepted on input and stored as its digest. The optional bound
    /// applies to the text before hashing.
    Hash(Option<u16>),
    /// Reference to an entity of the given class. When the flag is set the
    /// target must share the referencing entity's controller.
    Reference(ClassId, bool),
}

impl Type {
    /// Ensure declared text sizes are within the configured constraints.
    pub fn ensure_size_is_valid(&self, limits: &Limits) -> ValidationResult<()> {
        match self {
            Type::Text(max_len) if *max_len > limits.text_max_length_constraint => {
                Err(ValidationError::TextPropertyTooLong)
            }
            Type::Hash(Some(max_len)) => match limits.hashed_text_max_length_constraint {
                Some(constraint) if *max_len > constraint => {
                    Err(ValidationError::HashedTextPropertyTooLong)
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// The target class, if this is a reference type.
    pub fn referenced_class(&self) -> Option<ClassId> {
        match self {
            Type::Reference(class_id, _) => Some(*class_id),
            _ => None,
        }
    }
}

/// A vector of `vec_type` items holding at most `max_length` items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VecPropertyType {
    vec_type: Type,
    max_length: VecMaxLength,
}

impl VecPropertyType {
    pub fn new(vec_type: Type, max_length: VecMaxLength) -> Self {
        Self {
            vec_type,
            max_length,
        }
    }

    pub fn vec_type(&self) -> &Type {
        &self.vec_type
    }

    pub fn max_length(&self) -> VecMaxLength {
        self.max_length
    }

    fn ensure_size_is_valid(&self, limits: &Limits) -> ValidationResult<()> {
        self.vec_type.ensure_size_is_valid(limits)?;
        if self.max_length > limits.vec_max_length_constraint {
            return Err(ValidationError::VecPropertyTooLong);
        }
        Ok(())
    }
}

/// Either a single value or a bounded vector of values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Single(Type),
    Vector(VecPropertyType),
}

impl Default for PropertyType {
    fn default() -> Self {
        Self::Single(Type::default())
    }
}

impl PropertyType {
    /// Shorthand for a vector property.
    pub fn vector(vec_type: Type, max_length: VecMaxLength) -> Self {
        Self::Vector(VecPropertyType::new(vec_type, max_length))
    }

    /// The scalar type of the value, or of the vector's items.
    pub fn inner_type(&self) -> &Type {
        match self {
            PropertyType::Single(single) => single,
            PropertyType::Vector(vector) => vector.vec_type(),
        }
    }

    pub fn as_vec_type(&self) -> Option<&VecPropertyType> {
        match self {
            PropertyType::Vector(vector) => Some(vector),
            PropertyType::Single(_) => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, PropertyType::Vector(_))
    }

    /// The `same_controller` flag. Always `false` for non-reference types.
    pub fn same_controller_status(&self) -> bool {
        matches!(self.inner_type(), Type::Reference(_, true))
    }

    /// Ensure declared sizes are within the configured constraints.
    pub fn ensure_size_is_valid(&self, limits: &Limits) -> ValidationResult<()> {
        match self {
            PropertyType::Single(single) => single.ensure_size_is_valid(limits),
            PropertyType::Vector(vector) => vector.ensure_size_is_valid(limits),
        }
    }
}

/// Which kinds of actors are barred from mutating a property's values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyLockingPolicy {
    pub is_locked_from_maintainer: bool,
    pub is_locked_from_controller: bool,
}

/// The capacity in which an actor touches an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityAccessLevel {
    EntityController,
    EntityMaintainer,
    EntityControllerAndMaintainer,
}

/// A typed attribute declared on a class.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub property_type: PropertyType,
    /// Must be supplied when a schema containing it is added to an entity.
    pub required: bool,
    /// Values must be unique across all entities of the class.
    pub unique: bool,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub locking_policy: PropertyLockingPolicy,
}

impl Property {
    /// An optional, non-unique, unlocked property.
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            property_type,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_locking_policy(mut self, locking_policy: PropertyLockingPolicy) -> Self {
        self.locking_policy = locking_policy;
        self
    }

    /// Check if the property is locked from an actor with the given access level.
    ///
    /// An actor holding both roles is locked out only when both locks are set.
    pub fn is_locked_from(&self, access_level: EntityAccessLevel) -> bool {
        let policy = &self.locking_policy;
        match access_level {
            EntityAccessLevel::EntityControllerAndMaintainer => {
                policy.is_locked_from_controller && policy.is_locked_from_maintainer
            }
            EntityAccessLevel::EntityController => policy.is_locked_from_controller,
            EntityAccessLevel::EntityMaintainer => policy.is_locked_from_maintainer,
        }
    }

    pub fn ensure_name_is_valid(&self, limits: &Limits) -> ValidationResult<()> {
        limits.property_name_length.ensure_valid(
            self.name.len(),
            ValidationError::PropertyNameTooShort,
            ValidationError::PropertyNameTooLong,
        )
    }

    pub fn ensure_description_is_valid(&self, limits: &Limits) -> ValidationResult<()> {
        limits.property_description_length.ensure_valid(
            self.description.len(),
            ValidationError::PropertyDescriptionTooShort,
            ValidationError::PropertyDescriptionTooLong,
        )
    }

    /// Run every definition-time check on this property.
    pub fn ensure_definition_is_valid(&self, limits: &Limits) -> ValidationResult<()> {
        self.ensure_name_is_valid(limits)?;
        self.ensure_description_is_valid(limits)?;
        self.property_type.ensure_size_is_valid(limits)
    }
}
