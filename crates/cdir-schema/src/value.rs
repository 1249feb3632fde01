use cdir_crypto::ContentHasher;
use cdir_types::{EntityId, HashValue, Nonce, VecMaxLength};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::property::{PropertyType, Type};

// ---------------------------------------------------------------------------
// Stored values
// ---------------------------------------------------------------------------

/// Canonical scalar value kept in state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StoredValue {
    Bool(bool),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Text(String),
    Hash(HashValue),
    Reference(EntityId),
}

impl Default for StoredValue {
    fn default() -> Self {
        Self::Bool(false)
    }
}

impl StoredValue {
    /// The referenced entity, if this is a reference.
    pub fn involved_entity(&self) -> Option<EntityId> {
        match self {
            StoredValue::Reference(entity_id) => Some(*entity_id),
            _ => None,
        }
    }
}

/// Canonical vector value kept in state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VecStoredValue {
    Bool(Vec<bool>),
    Uint16(Vec<u16>),
    Uint32(Vec<u32>),
    Uint64(Vec<u64>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Text(Vec<String>),
    Hash(Vec<HashValue>),
    Reference(Vec<EntityId>),
}

impl Default for VecStoredValue {
    fn default() -> Self {
        Self::Bool(vec![])
    }
}

impl VecStoredValue {
    /// An empty vector whose items have the given type.
    pub fn empty_for(item_type: &Type) -> Self {
        match item_type {
            Type::Bool => Self::Bool(vec![]),
            Type::Uint16 => Self::Uint16(vec![]),
            Type::Uint32 => Self::Uint32(vec![]),
            Type::Uint64 => Self::Uint64(vec![]),
            Type::Int16 => Self::Int16(vec![]),
            Type::Int32 => Self::Int32(vec![]),
            Type::Int64 => Self::Int64(vec![]),
            Type::Text(_) => Self::Text(vec![]),
            Type::Hash(_) => Self::Hash(vec![]),
            Type::Reference(..) => Self::Reference(vec![]),
        }
    }

    /// Every referenced entity, with repetitions, in vector order.
    pub fn involved_entities(&self) -> Vec<EntityId> {
        match self {
            VecStoredValue::Reference(entity_ids) => entity_ids.clone(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VecStoredValue::Bool(vec) => vec.len(),
            VecStoredValue::Uint16(vec) => vec.len(),
            VecStoredValue::Uint32(vec) => vec.len(),
            VecStoredValue::Uint64(vec) => vec.len(),
            VecStoredValue::Int16(vec) => vec.len(),
            VecStoredValue::Int32(vec) => vec.len(),
            VecStoredValue::Int64(vec) => vec.len(),
            VecStoredValue::Text(vec) => vec.len(),
            VecStoredValue::Hash(vec) => vec.len(),
            VecStoredValue::Reference(vec) => vec.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        match self {
            VecStoredValue::Bool(vec) => vec.clear(),
            VecStoredValue::Uint16(vec) => vec.clear(),
            VecStoredValue::Uint32(vec) => vec.clear(),
            VecStoredValue::Uint64(vec) => vec.clear(),
            VecStoredValue::Int16(vec) => vec.clear(),
            VecStoredValue::Int32(vec) => vec.clear(),
            VecStoredValue::Int64(vec) => vec.clear(),
            VecStoredValue::Text(vec) => vec.clear(),
            VecStoredValue::Hash(vec) => vec.clear(),
            VecStoredValue::Reference(vec) => vec.clear(),
        }
    }

    fn remove_at(&mut self, index: usize) {
        fn remove<T>(vec: &mut Vec<T>, index: usize) {
            if index < vec.len() {
                vec.remove(index);
            }
        }

        match self {
            VecStoredValue::Bool(vec) => remove(vec, index),
            VecStoredValue::Uint16(vec) => remove(vec, index),
            VecStoredValue::Uint32(vec) => remove(vec, index),
            VecStoredValue::Uint64(vec) => remove(vec, index),
            VecStoredValue::Int16(vec) => remove(vec, index),
            VecStoredValue::Int32(vec) => remove(vec, index),
            VecStoredValue::Int64(vec) => remove(vec, index),
            VecStoredValue::Text(vec) => remove(vec, index),
            VecStoredValue::Hash(vec) => remove(vec, index),
            VecStoredValue::Reference(vec) => remove(vec, index),
        }
    }

    /// Insert `value` before `index`; `index == len` appends. Returns `false`
    /// when the item type does not match or the index is out of range.
    fn insert_at(&mut self, index: usize, value: StoredValue) -> bool {
        fn insert<T>(vec: &mut Vec<T>, index: usize, value: T) -> bool {
            if index > vec.len() {
                return false;
            }
            vec.insert(index, value);
            true
        }

        match (self, value) {
            (VecStoredValue::Bool(vec), StoredValue::Bool(v)) => insert(vec, index, v),
            (VecStoredValue::Uint16(vec), StoredValue::Uint16(v)) => insert(vec, index, v),
            (VecStoredValue::Uint32(vec), StoredValue::Uint32(v)) => insert(vec, index, v),
            (VecStoredValue::Uint64(vec), StoredValue::Uint64(v)) => insert(vec, index, v),
            (VecStoredValue::Int16(vec), StoredValue::Int16(v)) => insert(vec, index, v),
            (VecStoredValue::Int32(vec), StoredValue::Int32(v)) => insert(vec, index, v),
            (VecStoredValue::Int64(vec), StoredValue::Int64(v)) => insert(vec, index, v),
            (VecStoredValue::Text(vec), StoredValue::Text(v)) => insert(vec, index, v),
            (VecStoredValue::Hash(vec), StoredValue::Hash(v)) => insert(vec, index, v),
            (VecStoredValue::Reference(vec), StoredValue::Reference(v)) => insert(vec, index, v),
            _ => false,
        }
    }
}

/// A stored vector together with its edit nonce.
///
/// The nonce increases on every mutation. Clients editing a single position
/// submit the nonce they last observed; a mismatch means someone else edited
/// the vector in between.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VecStoredPropertyValue {
    vec_value: VecStoredValue,
    nonce: Nonce,
}

impl VecStoredPropertyValue {
    pub fn new(vec_value: VecStoredValue, nonce: Nonce) -> Self {
        Self { vec_value, nonce }
    }

    pub fn vec_value(&self) -> &VecStoredValue {
        &self.vec_value
    }

    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    pub fn len(&self) -> usize {
        self.vec_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec_value.is_empty()
    }

    fn increment_nonce(&mut self) -> Nonce {
        self.nonce += 1;
        self.nonce
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.vec_value.clear();
        self.increment_nonce();
    }

    /// Remove the item at `index`. Call [`Self::ensure_index_is_valid_for_removal`] first.
    pub fn remove_at(&mut self, index: VecMaxLength) {
        self.vec_value.remove_at(index as usize);
        self.increment_nonce();
    }

    /// Insert `value` before `index`. Validate with
    /// [`crate::validate_vector_insert`] first; a mismatched value leaves the
    /// vector and its nonce untouched.
    pub fn insert_at(&mut self, index: VecMaxLength, value: StoredValue) {
        if self.vec_value.insert_at(index as usize, value) {
            self.increment_nonce();
        }
    }

    pub fn ensure_nonce_equality(&self, provided: Nonce) -> ValidationResult<()> {
        if self.nonce != provided {
            return Err(ValidationError::PropertyValueVecNoncesDoesNotMatch {
                current: self.nonce,
                provided,
            });
        }
        Ok(())
    }

    /// Insertion accepts any index up to and including the current length.
    pub fn ensure_index_is_valid_for_insertion(&self, index: VecMaxLength) -> ValidationResult<()> {
        if index as usize > self.len() {
            return Err(ValidationError::EntityPropValueVectorIndexIsOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    pub fn ensure_index_is_valid_for_removal(&self, index: VecMaxLength) -> ValidationResult<()> {
        if index as usize >= self.len() {
            return Err(ValidationError::EntityPropValueVectorIndexIsOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }
}

/// A property value as kept in state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredPropertyValue {
    Single(StoredValue),
    Vector(VecStoredPropertyValue),
}

impl Default for StoredPropertyValue {
    fn default() -> Self {
        Self::Single(StoredValue::default())
    }
}

impl StoredPropertyValue {
    /// The placeholder held by a non-required property that was never set.
    ///
    /// Single properties hold `Single(Bool(false))`; vector properties hold an
    /// empty vector of the right item type so positional edits work on them.
    pub fn unset_for(property_type: &PropertyType) -> Self {
        match property_type {
            PropertyType::Single(_) => Self::default(),
            PropertyType::Vector(vector) => Self::Vector(VecStoredPropertyValue::new(
                VecStoredValue::empty_for(vector.vec_type()),
                0,
            )),
        }
    }

    /// `true` if this is the unset placeholder for a non-bool single property.
    ///
    /// `Bool(false)` on a `Bool` property is a real value and never counts as unset.
    pub fn is_unset_for(&self, property_type: &PropertyType) -> bool {
        match (self, property_type) {
            (StoredPropertyValue::Single(value), PropertyType::Single(single)) => {
                *single != Type::Bool && *value == StoredValue::default()
            }
            _ => false,
        }
    }

    pub fn as_single(&self) -> Option<&StoredValue> {
        match self {
            StoredPropertyValue::Single(value) => Some(value),
            StoredPropertyValue::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&VecStoredPropertyValue> {
        match self {
            StoredPropertyValue::Vector(vector) => Some(vector),
            StoredPropertyValue::Single(_) => None,
        }
    }

    pub fn as_vector_mut(&mut self) -> Option<&mut VecStoredPropertyValue> {
        match self {
            StoredPropertyValue::Vector(vector) => Some(vector),
            StoredPropertyValue::Single(_) => None,
        }
    }

    /// Every referenced entity, with repetitions.
    pub fn involved_entities(&self) -> Vec<EntityId> {
        match self {
            StoredPropertyValue::Single(value) => value.involved_entity().into_iter().collect(),
            StoredPropertyValue::Vector(vector) => vector.vec_value().involved_entities(),
        }
    }

    /// Replace `self` with `new_value`. A vector replacing a vector continues
    /// from the old nonce plus one.
    pub fn update(&mut self, mut new_value: Self) {
        if let (StoredPropertyValue::Vector(old), StoredPropertyValue::Vector(new)) =
            (&*self, &mut new_value)
        {
            new.nonce = old.nonce + 1;
        }
        *self = new_value;
    }

    /// The part of the value that identifies it for uniqueness: vectors
    /// compare without their nonce.
    pub fn unique_key(&self) -> (Option<&StoredValue>, Option<&VecStoredValue>) {
        match self {
            StoredPropertyValue::Single(value) => (Some(value), None),
            StoredPropertyValue::Vector(vector) => (None, Some(vector.vec_value())),
        }
    }
}

// ---------------------------------------------------------------------------
// Input values
// ---------------------------------------------------------------------------

/// Client-submitted scalar value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputValue {
    Bool(bool),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Text(String),
    /// Raw text for a `Hash` property. Only its digest is stored.
    TextToHash(String),
    Reference(EntityId),
}

impl Default for InputValue {
    fn default() -> Self {
        Self::Bool(false)
    }
}

impl InputValue {
    pub fn involved_entity(&self) -> Option<EntityId> {
        match self {
            InputValue::Reference(entity_id) => Some(*entity_id),
            _ => None,
        }
    }

    /// Convert to the stored form. Hashes `TextToHash`; everything else is copied.
    pub fn to_stored(&self, hasher: &ContentHasher) -> StoredValue {
        match self {
            InputValue::Bool(v) => StoredValue::Bool(*v),
            InputValue::Uint16(v) => StoredValue::Uint16(*v),
            InputValue::Uint32(v) => StoredValue::Uint32(*v),
            InputValue::Uint64(v) => StoredValue::Uint64(*v),
            InputValue::Int16(v) => StoredValue::Int16(*v),
            InputValue::Int32(v) => StoredValue::Int32(*v),
            InputValue::Int64(v) => StoredValue::Int64(*v),
            InputValue::Text(v) => StoredValue::Text(v.clone()),
            InputValue::TextToHash(v) => StoredValue::Hash(hasher.hash_text(v)),
            InputValue::Reference(v) => StoredValue::Reference(*v),
        }
    }
}

/// Client-submitted vector value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VecInputValue {
    Bool(Vec<bool>),
    Uint16(Vec<u16>),
    Uint32(Vec<u32>),
    Uint64(Vec<u64>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Text(Vec<String>),
    TextToHash(Vec<String>),
    Reference(Vec<EntityId>),
}

impl VecInputValue {
    pub fn len(&self) -> usize {
        match self {
            VecInputValue::Bool(vec) => vec.len(),
            VecInputValue::Uint16(vec) => vec.len(),
            VecInputValue::Uint32(vec) => vec.len(),
            VecInputValue::Uint64(vec) => vec.len(),
            VecInputValue::Int16(vec) => vec.len(),
            VecInputValue::Int32(vec) => vec.len(),
            VecInputValue::Int64(vec) => vec.len(),
            VecInputValue::Text(vec) => vec.len(),
            VecInputValue::TextToHash(vec) => vec.len(),
            VecInputValue::Reference(vec) => vec.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn involved_entities(&self) -> Vec<EntityId> {
        match self {
            VecInputValue::Reference(entity_ids) => entity_ids.clone(),
            _ => Vec::new(),
        }
    }

    pub fn to_stored(&self, hasher: &ContentHasher) -> VecStoredValue {
        match self {
            VecInputValue::Bool(vec) => VecStoredValue::Bool(vec.clone()),
            VecInputValue::Uint16(vec) => VecStoredValue::Uint16(vec.clone()),
            VecInputValue::Uint32(vec) => VecStoredValue::Uint32(vec.clone()),
            VecInputValue::Uint64(vec) => VecStoredValue::Uint64(vec.clone()),
            VecInputValue::Int16(vec) => VecStoredValue::Int16(vec.clone()),
            VecInputValue::Int32(vec) => VecStoredValue::Int32(vec.clone()),
            VecInputValue::Int64(vec) => VecStoredValue::Int64(vec.clone()),
            VecInputValue::Text(vec) => VecStoredValue::Text(vec.clone()),
            VecInputValue::TextToHash(vec) => {
                VecStoredValue::Hash(vec.iter().map(|text| hasher.hash_text(text)).collect())
            }
            VecInputValue::Reference(vec) => VecStoredValue::Reference(vec.clone()),
        }
    }
}

/// A property value as submitted by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputPropertyValue {
    Single(InputValue),
    Vector(VecInputValue),
}

impl Default for InputPropertyValue {
    fn default() -> Self {
        Self::Single(InputValue::default())
    }
}

impl InputPropertyValue {
    pub fn as_single(&self) -> Option<&InputValue> {
        match self {
            InputPropertyValue::Single(value) => Some(value),
            InputPropertyValue::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&VecInputValue> {
        match self {
            InputPropertyValue::Vector(vector) => Some(vector),
            InputPropertyValue::Single(_) => None,
        }
    }

    pub fn involved_entities(&self) -> Vec<EntityId> {
        match self {
            InputPropertyValue::Single(value) => value.involved_entity().into_iter().collect(),
            InputPropertyValue::Vector(vector) => vector.involved_entities(),
        }
    }

    /// Convert to the stored form. New vectors start at nonce 0.
    ///
    /// This is a one-way transform for hashed text: the stored digest cannot
    /// be turned back into the submitted text.
    pub fn to_stored(&self, hasher: &ContentHasher) -> StoredPropertyValue {
        match self {
            InputPropertyValue::Single(value) => {
                StoredPropertyValue::Single(value.to_stored(hasher))
            }
            InputPropertyValue::Vector(vector) => StoredPropertyValue::Vector(
                VecStoredPropertyValue::new(vector.to_stored(hasher), 0),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdir_types::ClassId;

    #[test]
    fn text_to_hash_stores_digest_only() {
        let input = InputPropertyValue::Single(InputValue::TextToHash("secret".into()));
        let stored = input.to_stored(&ContentHasher::TEXT);
        let expected = ContentHasher::TEXT.hash_text("secret");
        assert_eq!(stored, StoredPropertyValue::Single(StoredValue::Hash(expected)));
        // Nothing of the original text survives in the stored form.
        let json = serde_json::to_string(&stored).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn involved_entities_keeps_repetitions() {
        let stored = StoredPropertyValue::Vector(VecStoredPropertyValue::new(
            VecStoredValue::Reference(vec![EntityId(1), EntityId(2), EntityId(1)]),
            0,
        ));
        assert_eq!(
            stored.involved_entities(),
            vec![EntityId(1), EntityId(2), EntityId(1)]
        );
        assert!(StoredPropertyValue::Single(StoredValue::Uint16(3))
            .involved_entities()
            .is_empty());
    }

    #[test]
    fn vector_edits_bump_nonce() {
        let mut vec = VecStoredPropertyValue::new(VecStoredValue::Uint32(vec![1, 2, 3]), 0);
        vec.remove_at(1);
        assert_eq!(vec.vec_value(), &VecStoredValue::Uint32(vec![1, 3]));
        assert_eq!(vec.nonce(), 1);

        vec.insert_at(2, StoredValue::Uint32(9));
        assert_eq!(vec.vec_value(), &VecStoredValue::Uint32(vec![1, 3, 9]));
        assert_eq!(vec.nonce(), 2);

        vec.clear();
        assert!(vec.is_empty());
        assert_eq!(vec.nonce(), 3);
    }

    #[test]
    fn mismatched_insert_is_a_noop() {
        let mut vec = VecStoredPropertyValue::new(VecStoredValue::Uint32(vec![1]), 4);
        vec.insert_at(0, StoredValue::Bool(true));
        assert_eq!(vec.vec_value(), &VecStoredValue::Uint32(vec![1]));
        assert_eq!(vec.nonce(), 4);
    }

    #[test]
    fn index_checks() {
        let vec = VecStoredPropertyValue::new(VecStoredValue::Bool(vec![true, false]), 0);
        assert!(vec.ensure_index_is_valid_for_insertion(2).is_ok());
        assert!(vec.ensure_index_is_valid_for_insertion(3).is_err());
        assert!(vec.ensure_index_is_valid_for_removal(1).is_ok());
        assert!(vec.ensure_index_is_valid_for_removal(2).is_err());
    }

    #[test]
    fn nonce_equality() {
        let vec = VecStoredPropertyValue::new(VecStoredValue::Bool(vec![]), 7);
        assert!(vec.ensure_nonce_equality(7).is_ok());
        assert_eq!(
            vec.ensure_nonce_equality(6),
            Err(ValidationError::PropertyValueVecNoncesDoesNotMatch {
                current: 7,
                provided: 6
            })
        );
    }

    #[test]
    fn update_continues_vector_nonce() {
        let mut value = StoredPropertyValue::Vector(VecStoredPropertyValue::new(
            VecStoredValue::Int64(vec![1]),
            5,
        ));
        value.update(StoredPropertyValue::Vector(VecStoredPropertyValue::new(
            VecStoredValue::Int64(vec![2, 3]),
            0,
        )));
        assert_eq!(value.as_vector().map(|v| v.nonce()), Some(6));
    }

    #[test]
    fn unset_placeholders() {
        let single = PropertyType::Single(Type::Reference(ClassId(1), false));
        assert_eq!(StoredPropertyValue::unset_for(&single), StoredPropertyValue::default());
        assert!(StoredPropertyValue::default().is_unset_for(&single));

        let boolean = PropertyType::Single(Type::Bool);
        assert!(!StoredPropertyValue::default().is_unset_for(&boolean));

        let vector = PropertyType::vector(Type::Reference(ClassId(1), false), 5);
        let unset = StoredPropertyValue::unset_for(&vector);
        assert_eq!(
            unset.as_vector().map(|v| v.vec_value().clone()),
            Some(VecStoredValue::Reference(vec![]))
        );
    }
}
