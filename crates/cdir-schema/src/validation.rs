use cdir_crypto::ContentHasher;
use cdir_types::VecMaxLength;

use crate::error::{ValidationError, ValidationResult};
use crate::property::{Property, PropertyType, Type};
use crate::value::{
    InputPropertyValue, InputValue, StoredPropertyValue, StoredValue, VecInputValue,
    VecStoredPropertyValue, VecStoredValue,
};

/// Validate `input` against `property` and convert it to the stored form.
///
/// Checks that the value's shape and scalar kind match the property type,
/// that texts and vectors respect their declared bounds, and hashes
/// `TextToHash` input. A non-required property also accepts the default input
/// (`Single(Bool(false))`), which clears it to the unset placeholder.
///
/// Reference targets are not resolved here; whether the referenced entity
/// exists, belongs to the declared class, and may be referenced is decided
/// by the directory's reference integrity checks.
pub fn validate_input(
    property: &Property,
    input: &InputPropertyValue,
    hasher: &ContentHasher,
) -> ValidationResult<StoredPropertyValue> {
    if !property.required && *input == InputPropertyValue::default() {
        return Ok(StoredPropertyValue::unset_for(&property.property_type));
    }

    match (input, &property.property_type) {
        (InputPropertyValue::Single(value), PropertyType::Single(single_type)) => {
            ensure_single_matches(value, single_type)?;
        }
        (InputPropertyValue::Vector(vector), PropertyType::Vector(vec_type)) => {
            ensure_vector_matches(vector, vec_type.vec_type())?;
            if vector.len() > vec_type.max_length() as usize {
                return Err(ValidationError::VecPropertyTooLong);
            }
        }
        _ => return Err(ValidationError::PropertyValueDoNotMatchType),
    }

    Ok(input.to_stored(hasher))
}

/// Validate a single item about to be inserted into a stored vector and
/// convert it to the stored form.
pub fn validate_vector_insert(
    property: &Property,
    current: &VecStoredPropertyValue,
    index: VecMaxLength,
    value: &InputValue,
    hasher: &ContentHasher,
) -> ValidationResult<StoredValue> {
    current.ensure_index_is_valid_for_insertion(index)?;

    let vec_type = property
        .property_type
        .as_vec_type()
        .ok_or(ValidationError::PropertyValueTypeDoesNotMatchInternalVectorType)?;

    let kinds_match = matches!(
        (value, current.vec_value(), vec_type.vec_type()),
        (InputValue::Bool(_), VecStoredValue::Bool(_), Type::Bool)
            | (InputValue::Uint16(_), VecStoredValue::Uint16(_), Type::Uint16)
            | (InputValue::Uint32(_), VecStoredValue::Uint32(_), Type::Uint32)
            | (InputValue::Uint64(_), VecStoredValue::Uint64(_), Type::Uint64)
            | (InputValue::Int16(_), VecStoredValue::Int16(_), Type::Int16)
            | (InputValue::Int32(_), VecStoredValue::Int32(_), Type::Int32)
            | (InputValue::Int64(_), VecStoredValue::Int64(_), Type::Int64)
            | (InputValue::Text(_), VecStoredValue::Text(_), Type::Text(_))
            | (InputValue::TextToHash(_), VecStoredValue::Hash(_), Type::Hash(_))
            | (InputValue::Reference(_), VecStoredValue::Reference(_), Type::Reference(..))
    );
    if !kinds_match {
        return Err(ValidationError::PropertyValueTypeDoesNotMatchInternalVectorType);
    }

    ensure_single_matches(value, vec_type.vec_type())?;

    if current.len() >= vec_type.max_length() as usize {
        return Err(ValidationError::EntityPropertyValueVectorIsTooLong);
    }

    Ok(value.to_stored(hasher))
}

fn ensure_single_matches(value: &InputValue, single_type: &Type) -> ValidationResult<()> {
    match (value, single_type) {
        (InputValue::Bool(_), Type::Bool)
        | (InputValue::Uint16(_), Type::Uint16)
        | (InputValue::Uint32(_), Type::Uint32)
        | (InputValue::Uint64(_), Type::Uint64)
        | (InputValue::Int16(_), Type::Int16)
        | (InputValue::Int32(_), Type::Int32)
        | (InputValue::Int64(_), Type::Int64)
        | (InputValue::Reference(_), Type::Reference(..)) => Ok(()),
        (InputValue::Text(text), Type::Text(max_len)) => ensure_text_len(text, *max_len),
        (InputValue::TextToHash(text), Type::Hash(max_len)) => {
            ensure_hashed_text_len(text, *max_len)
        }
        _ => Err(ValidationError::PropertyValueDoNotMatchType),
    }
}

fn ensure_vector_matches(vector: &VecInputValue, item_type: &Type) -> ValidationResult<()> {
    match (vector, item_type) {
        (VecInputValue::Bool(_), Type::Bool)
        | (VecInputValue::Uint16(_), Type::Uint16)
        | (VecInputValue::Uint32(_), Type::Uint32)
        | (VecInputValue::Uint64(_), Type::Uint64)
        | (VecInputValue::Int16(_), Type::Int16)
        | (VecInputValue::Int32(_), Type::Int32)
        | (VecInputValue::Int64(_), Type::Int64)
        | (VecInputValue::Reference(_), Type::Reference(..)) => Ok(()),
        (VecInputValue::Text(texts), Type::Text(max_len)) => texts
            .iter()
            .try_for_each(|text| ensure_text_len(text, *max_len)),
        (VecInputValue::TextToHash(texts), Type::Hash(max_len)) => texts
            .iter()
            .try_for_each(|text| ensure_hashed_text_len(text, *max_len)),
        _ => Err(ValidationError::PropertyValueDoNotMatchType),
    }
}

// Lengths are measured in bytes of the UTF-8 encoding.
fn ensure_text_len(text: &str, max_len: u16) -> ValidationResult<()> {
    if text.len() > max_len as usize {
        return Err(ValidationError::TextPropertyTooLong);
    }
    Ok(())
}

fn ensure_hashed_text_len(text: &str, max_len: Option<u16>) -> ValidationResult<()> {
    match max_len {
        Some(max_len) if text.len() > max_len as usize => {
            Err(ValidationError::HashedTextPropertyTooLong)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdir_types::{ClassId, EntityId};
    use proptest::prelude::*;

    fn single(name: &str, t: Type) -> Property {
        Property::new(name, PropertyType::Single(t)).required()
    }

    fn vector(name: &str, t: Type, max: u16) -> Property {
        Property::new(name, PropertyType::vector(t, max)).required()
    }

    // -----------------------------------------------------------------------
    // Type matching
    // -----------------------------------------------------------------------

    #[test]
    fn matching_scalar_is_accepted() {
        let prop = single("age", Type::Uint16);
        let stored = validate_input(
            &prop,
            &InputPropertyValue::Single(InputValue::Uint16(30)),
            &ContentHasher::TEXT,
        )
        .unwrap();
        assert_eq!(stored, StoredPropertyValue::Single(StoredValue::Uint16(30)));
    }

    #[test]
    fn mismatched_scalar_is_rejected() {
        let prop = single("age", Type::Uint16);
        let result = validate_input(
            &prop,
            &InputPropertyValue::Single(InputValue::Int16(30)),
            &ContentHasher::TEXT,
        );
        assert_eq!(result, Err(ValidationError::PropertyValueDoNotMatchType));
    }

    #[test]
    fn single_for_vector_property_is_rejected() {
        let prop = vector("tags", Type::Text(10), 3);
        let result = validate_input(
            &prop,
            &InputPropertyValue::Single(InputValue::Text("a".into())),
            &ContentHasher::TEXT,
        );
        assert_eq!(result, Err(ValidationError::PropertyValueDoNotMatchType));
    }

    #[test]
    fn plain_text_for_hash_property_is_rejected() {
        let prop = single("doc", Type::Hash(None));
        let result = validate_input(
            &prop,
            &InputPropertyValue::Single(InputValue::Text("abc".into())),
            &ContentHasher::TEXT,
        );
        assert_eq!(result, Err(ValidationError::PropertyValueDoNotMatchType));
    }

    // -----------------------------------------------------------------------
    // Length bounds
    // -----------------------------------------------------------------------

    #[test]
    fn text_over_declared_length_is_rejected() {
        let prop = single("title", Type::Text(3));
        let result = validate_input(
            &prop,
            &InputPropertyValue::Single(InputValue::Text("abcd".into())),
            &ContentHasher::TEXT,
        );
        assert_eq!(result, Err(ValidationError::TextPropertyTooLong));
    }

    #[test]
    fn hashed_text_over_bound_is_rejected() {
        let prop = single("doc", Type::Hash(Some(2)));
        let result = validate_input(
            &prop,
            &InputPropertyValue::Single(InputValue::TextToHash("abc".into())),
            &ContentHasher::TEXT,
        );
        assert_eq!(result, Err(ValidationError::HashedTextPropertyTooLong));
    }

    #[test]
    fn vector_over_max_length_is_rejected() {
        let prop = vector("scores", Type::Int32, 2);
        let result = validate_input(
            &prop,
            &InputPropertyValue::Vector(VecInputValue::Int32(vec![1, 2, 3])),
            &ContentHasher::TEXT,
        );
        assert_eq!(result, Err(ValidationError::VecPropertyTooLong));
    }

    #[test]
    fn vector_text_items_are_bounded() {
        let prop = vector("tags", Type::Text(2), 5);
        let result = validate_input(
            &prop,
            &InputPropertyValue::Vector(VecInputValue::Text(vec!["ok".into(), "long".into()])),
            &ContentHasher::TEXT,
        );
        assert_eq!(result, Err(ValidationError::TextPropertyTooLong));
    }

    // -----------------------------------------------------------------------
    // Optional properties
    // -----------------------------------------------------------------------

    #[test]
    fn default_input_clears_optional_property() {
        let prop = Property::new("link", PropertyType::Single(Type::Reference(ClassId(1), false)));
        let stored =
            validate_input(&prop, &InputPropertyValue::default(), &ContentHasher::TEXT).unwrap();
        assert!(stored.is_unset_for(&prop.property_type));
    }

    #[test]
    fn default_input_is_a_type_error_for_required_property() {
        let prop = single("link", Type::Reference(ClassId(1), false));
        let result = validate_input(&prop, &InputPropertyValue::default(), &ContentHasher::TEXT);
        assert_eq!(result, Err(ValidationError::PropertyValueDoNotMatchType));
    }

    // -----------------------------------------------------------------------
    // Hashing is one-way
    // -----------------------------------------------------------------------

    #[test]
    fn hashed_value_does_not_round_trip() {
        let prop = vector("docs", Type::Hash(None), 4);
        let input = InputPropertyValue::Vector(VecInputValue::TextToHash(vec!["alpha".into()]));
        let stored = validate_input(&prop, &input, &ContentHasher::TEXT).unwrap();
        let digest = ContentHasher::TEXT.hash_text("alpha");
        assert_eq!(
            stored.as_vector().map(|v| v.vec_value().clone()),
            Some(VecStoredValue::Hash(vec![digest]))
        );
        // The stored form is a digest, not the text: the two representations
        // are deliberately not symmetric.
        assert_ne!(
            stored.as_vector().map(|v| v.vec_value().clone()),
            Some(VecStoredValue::Text(vec!["alpha".into()]))
        );
    }

    // -----------------------------------------------------------------------
    // Vector insertion
    // -----------------------------------------------------------------------

    #[test]
    fn insert_into_full_vector_is_rejected() {
        let prop = vector("refs", Type::Reference(ClassId(1), false), 1);
        let current =
            VecStoredPropertyValue::new(VecStoredValue::Reference(vec![EntityId(1)]), 0);
        let result = validate_vector_insert(
            &prop,
            &current,
            1,
            &InputValue::Reference(EntityId(2)),
            &ContentHasher::TEXT,
        );
        assert_eq!(result, Err(ValidationError::EntityPropertyValueVectorIsTooLong));
    }

    #[test]
    fn insert_of_wrong_kind_is_rejected() {
        let prop = vector("flags", Type::Bool, 4);
        let current = VecStoredPropertyValue::new(VecStoredValue::Bool(vec![]), 0);
        let input = InputValue::Uint16(1);
        let result = validate_vector_insert(&prop, &current, 0, &input, &ContentHasher::TEXT);
        assert_eq!(
            result,
            Err(ValidationError::PropertyValueTypeDoesNotMatchInternalVectorType)
        );
    }

    #[test]
    fn insert_hashes_text() {
        let prop = vector("docs", Type::Hash(None), 4);
        let current = VecStoredPropertyValue::new(VecStoredValue::Hash(vec![]), 0);
        let stored = validate_vector_insert(
            &prop,
            &current,
            0,
            &InputValue::TextToHash("x".into()),
            &ContentHasher::TEXT,
        )
        .unwrap();
        assert_eq!(stored, StoredValue::Hash(ContentHasher::TEXT.hash_text("x")));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn scalars_survive_validation_unchanged(
            v in any::<i64>(),
            u in any::<u32>(),
            b in any::<bool>(),
        ) {
            let cases = [
                (single("i", Type::Int64), InputValue::Int64(v), StoredValue::Int64(v)),
                (single("u", Type::Uint32), InputValue::Uint32(u), StoredValue::Uint32(u)),
                (single("b", Type::Bool), InputValue::Bool(b), StoredValue::Bool(b)),
                (
                    single("r", Type::Reference(ClassId(1), false)),
                    InputValue::Reference(EntityId(u as u64)),
                    StoredValue::Reference(EntityId(u as u64)),
                ),
            ];
            for (prop, input, expected) in cases {
                let input = InputPropertyValue::Single(input);
                let stored = validate_input(&prop, &input, &ContentHasher::TEXT).unwrap();
                prop_assert_eq!(stored, StoredPropertyValue::Single(expected));
            }
        }

        #[test]
        fn texts_within_bound_are_kept_verbatim(text in "[a-z]{0,16}") {
            let prop = single("t", Type::Text(16));
            let stored = validate_input(
                &prop,
                &InputPropertyValue::Single(InputValue::Text(text.clone())),
                &ContentHasher::TEXT,
            ).unwrap();
            prop_assert_eq!(stored, StoredPropertyValue::Single(StoredValue::Text(text)));
        }
    }
}
