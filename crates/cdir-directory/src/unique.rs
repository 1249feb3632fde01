use cdir_crypto::ContentHasher;
use cdir_schema::{Property, StoredPropertyValue, ValidationError};
use cdir_store::DirectoryStore;
use cdir_types::{ClassId, HashValue, PropertyId};

use crate::error::DirectoryResult;

/// Store-held index of values of `unique` properties.
///
/// Each claimed value is recorded as a digest of `(class, property, value)`.
/// Unset placeholders and empty vectors never claim a key.
pub(crate) struct UniqueValues<'a> {
    store: &'a dyn DirectoryStore,
}

impl<'a> UniqueValues<'a> {
    pub(crate) fn new(store: &'a dyn DirectoryStore) -> Self {
        Self { store }
    }

    fn key(
        class_id: ClassId,
        property_id: PropertyId,
        property: &Property,
        value: &StoredPropertyValue,
    ) -> DirectoryResult<Option<HashValue>> {
        let is_empty_vector = value.as_vector().is_some_and(|vector| vector.is_empty());
        let is_placeholder =
            !property.required && *value == StoredPropertyValue::unset_for(&property.property_type);
        if !property.unique || is_empty_vector || is_placeholder {
            return Ok(None);
        }
        let key = ContentHasher::UNIQUE.hash_encoded(&(class_id, property_id, value.unique_key()))?;
        Ok(Some(key))
    }

    /// Record `value`, failing if another entity already holds it.
    pub(crate) fn claim(
        &self,
        class_id: ClassId,
        property_id: PropertyId,
        property: &Property,
        value: &StoredPropertyValue,
    ) -> DirectoryResult<()> {
        let Some(key) = Self::key(class_id, property_id, property, value)? else {
            return Ok(());
        };
        if self.store.contains_unique(&key)? {
            return Err(ValidationError::PropertyValueShouldBeUnique(property_id).into());
        }
        self.store.insert_unique(key)?;
        Ok(())
    }

    pub(crate) fn release(
        &self,
        class_id: ClassId,
        property_id: PropertyId,
        property: &Property,
        value: &StoredPropertyValue,
    ) -> DirectoryResult<()> {
        if let Some(key) = Self::key(class_id, property_id, property, value)? {
            self.store.remove_unique(&key)?;
        }
        Ok(())
    }

    /// Release `old` and claim `new`.
    pub(crate) fn replace(
        &self,
        class_id: ClassId,
        property_id: PropertyId,
        property: &Property,
        old: &StoredPropertyValue,
        new: &StoredPropertyValue,
    ) -> DirectoryResult<()> {
        self.release(class_id, property_id, property, old)?;
        self.claim(class_id, property_id, property, new)
    }
}
