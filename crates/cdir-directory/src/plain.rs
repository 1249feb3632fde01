use std::collections::BTreeMap;

use cdir_schema::{
    Class, InputPropertyValue, InputValue, PropertyType, StoredPropertyValue, StoredValue, Type,
    ValidationError, ValidationResult, VecInputValue, VecStoredValue,
};
use cdir_store::DirectoryStore;
use cdir_types::{EntityId, PropertyId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::entities::load_entity;
use crate::error::{DirectoryError, DirectoryResult};
use crate::registry::load_class;

/// A value as exchanged with clients.
pub type PlainValue = Value;

/// An entity as exchanged with clients: property name to plain value.
pub type PlainRecord = serde_json::Map<String, PlainValue>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainOptions {
    /// Render referenced entities as nested records, one level deep,
    /// instead of as ids.
    pub resolve_references: bool,
}

/// Render a stored value.
///
/// Hashes render as hex digests and references as numeric ids. The text a
/// hash was computed from is not recoverable.
pub fn to_plain(value: &StoredPropertyValue) -> PlainValue {
    match value {
        StoredPropertyValue::Single(single) => single_to_plain(single),
        StoredPropertyValue::Vector(vector) => vector_to_plain(vector.vec_value()),
    }
}

fn single_to_plain(value: &StoredValue) -> PlainValue {
    match value {
        StoredValue::Bool(v) => json!(v),
        StoredValue::Uint16(v) => json!(v),
        StoredValue::Uint32(v) => json!(v),
        StoredValue::Uint64(v) => json!(v),
        StoredValue::Int16(v) => json!(v),
        StoredValue::Int32(v) => json!(v),
        StoredValue::Int64(v) => json!(v),
        StoredValue::Text(v) => json!(v),
        StoredValue::Hash(v) => json!(v.to_hex()),
        StoredValue::Reference(v) => json!(v.0),
    }
}

fn vector_to_plain(value: &VecStoredValue) -> PlainValue {
    match value {
        VecStoredValue::Bool(v) => json!(v),
        VecStoredValue::Uint16(v) => json!(v),
        VecStoredValue::Uint32(v) => json!(v),
        VecStoredValue::Uint64(v) => json!(v),
        VecStoredValue::Int16(v) => json!(v),
        VecStoredValue::Int32(v) => json!(v),
        VecStoredValue::Int64(v) => json!(v),
        VecStoredValue::Text(v) => json!(v),
        VecStoredValue::Hash(v) => {
            Value::Array(v.iter().map(|hash| json!(hash.to_hex())).collect())
        }
        VecStoredValue::Reference(v) => Value::Array(v.iter().map(|id| json!(id.0)).collect()),
    }
}

/// Render an entity as a record keyed by property name. Unset optional
/// properties render as `null`.
pub fn to_plain_object(
    store: &dyn DirectoryStore,
    entity_id: EntityId,
    options: PlainOptions,
) -> DirectoryResult<PlainRecord> {
    let entity = load_entity(store, entity_id)?;
    let class = load_class(store, entity.class_id())?;

    let mut record = PlainRecord::new();
    for (property_id, value) in entity.values() {
        let property = class.property(*property_id).map_err(|_| {
            DirectoryError::invariant(format!(
                "{entity_id} holds a value for unknown property {property_id}"
            ))
        })?;
        let is_reference = property.property_type.inner_type().referenced_class().is_some();
        let plain = if value.is_unset_for(&property.property_type) {
            Value::Null
        } else if options.resolve_references && is_reference {
            resolve(store, value)?
        } else {
            to_plain(value)
        };
        record.insert(property.name.clone(), plain);
    }
    Ok(record)
}

fn resolve(store: &dyn DirectoryStore, value: &StoredPropertyValue) -> DirectoryResult<PlainValue> {
    let nested = |id: EntityId| -> DirectoryResult<PlainValue> {
        Ok(Value::Object(to_plain_object(store, id, PlainOptions::default())?))
    };
    match value {
        StoredPropertyValue::Single(single) => match single.involved_entity() {
            Some(id) => nested(id),
            None => Ok(single_to_plain(single)),
        },
        StoredPropertyValue::Vector(vector) => vector
            .vec_value()
            .involved_entities()
            .into_iter()
            .map(nested)
            .collect::<DirectoryResult<Vec<_>>>()
            .map(Value::Array),
    }
}

/// Convert a client record into input values keyed by property id.
///
/// `null` stands for the unset placeholder. `Hash` properties take the text
/// to be hashed.
pub fn from_plain_update(
    class: &Class,
    record: &PlainRecord,
) -> ValidationResult<BTreeMap<PropertyId, InputPropertyValue>> {
    let mut values = BTreeMap::new();
    for (name, plain) in record {
        let property_id = class
            .property_id_by_name(name)
            .ok_or_else(|| ValidationError::UnknownPropertyName(name.clone()))?;
        let property = class.property(property_id)?;
        let input = if plain.is_null() {
            InputPropertyValue::default()
        } else {
            plain_to_input(&property.property_type, plain)?
        };
        values.insert(property_id, input);
    }
    Ok(values)
}

fn plain_to_input(
    property_type: &PropertyType,
    plain: &PlainValue,
) -> ValidationResult<InputPropertyValue> {
    match property_type {
        PropertyType::Single(single) => {
            Ok(InputPropertyValue::Single(plain_to_single(single, plain)?))
        }
        PropertyType::Vector(vector) => {
            let items = plain.as_array().ok_or(ValidationError::PropertyValueDoNotMatchType)?;
            Ok(InputPropertyValue::Vector(plain_to_vector(vector.vec_type(), items)?))
        }
    }
}

fn plain_to_single(item_type: &Type, plain: &PlainValue) -> ValidationResult<InputValue> {
    let value = match item_type {
        Type::Bool => plain.as_bool().map(InputValue::Bool),
        Type::Uint16 => unsigned(plain).map(InputValue::Uint16),
        Type::Uint32 => unsigned(plain).map(InputValue::Uint32),
        Type::Uint64 => unsigned(plain).map(InputValue::Uint64),
        Type::Int16 => signed(plain).map(InputValue::Int16),
        Type::Int32 => signed(plain).map(InputValue::Int32),
        Type::Int64 => signed(plain).map(InputValue::Int64),
        Type::Text(_) => text(plain).map(InputValue::Text),
        Type::Hash(_) => text(plain).map(InputValue::TextToHash),
        Type::Reference(..) => reference(plain).map(InputValue::Reference),
    };
    value.ok_or(ValidationError::PropertyValueDoNotMatchType)
}

fn plain_to_vector(item_type: &Type, items: &[PlainValue]) -> ValidationResult<VecInputValue> {
    Ok(match item_type {
        Type::Bool => VecInputValue::Bool(each(items, PlainValue::as_bool)?),
        Type::Uint16 => VecInputValue::Uint16(each(items, unsigned)?),
        Type::Uint32 => VecInputValue::Uint32(each(items, unsigned)?),
        Type::Uint64 => VecInputValue::Uint64(each(items, unsigned)?),
        Type::Int16 => VecInputValue::Int16(each(items, signed)?),
        Type::Int32 => VecInputValue::Int32(each(items, signed)?),
        Type::Int64 => VecInputValue::Int64(each(items, signed)?),
        Type::Text(_) => VecInputValue::Text(each(items, text)?),
        Type::Hash(_) => VecInputValue::TextToHash(each(items, text)?),
        Type::Reference(..) => VecInputValue::Reference(each(items, reference)?),
    })
}

fn each<T>(
    items: &[PlainValue],
    convert: impl Fn(&PlainValue) -> Option<T>,
) -> ValidationResult<Vec<T>> {
    items
        .iter()
        .map(|item| {
            convert(item).ok_or(ValidationError::PropertyValueTypeDoesNotMatchInternalVectorType)
        })
        .collect()
}

fn unsigned<T: TryFrom<u64>>(plain: &PlainValue) -> Option<T> {
    plain.as_u64().and_then(|v| T::try_from(v).ok())
}

fn signed<T: TryFrom<i64>>(plain: &PlainValue) -> Option<T> {
    plain.as_i64().and_then(|v| T::try_from(v).ok())
}

fn text(plain: &PlainValue) -> Option<String> {
    plain.as_str().map(str::to_owned)
}

fn reference(plain: &PlainValue) -> Option<EntityId> {
    plain.as_u64().map(EntityId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdir_crypto::ContentHasher;
    use cdir_gate::PermissionGate;
    use cdir_schema::{Limits, Property};
    use cdir_store::InMemoryDirectoryStore;
    use cdir_types::{Actor, ClassId};

    use crate::entities::EntityStore;
    use crate::registry::{ClassDefinition, ClassRegistry};

    const CLASS: ClassId = ClassId(1);

    fn definition() -> ClassDefinition {
        ClassDefinition::new("Track", 10, 10)
            .with_property(Property::new("title", PropertyType::Single(Type::Text(64))).required())
            .with_property(Property::new("plays", PropertyType::Single(Type::Uint32)))
            .with_property(Property::new("tags", PropertyType::vector(Type::Text(16), 4)))
            .with_property(Property::new("digest", PropertyType::Single(Type::Hash(None))))
            .with_property(Property::new(
                "next",
                PropertyType::Single(Type::Reference(CLASS, false)),
            ))
            .with_property(Property::new("explicit", PropertyType::Single(Type::Bool)))
            .with_schema([0, 1, 2, 3, 4, 5])
    }

    fn setup() -> (InMemoryDirectoryStore, PermissionGate) {
        let store = InMemoryDirectoryStore::new();
        let gate = PermissionGate::default();
        ClassRegistry::new(&store, &Limits::default(), &gate)
            .define_class(&Actor::Lead, &definition())
            .unwrap();
        (store, gate)
    }

    fn record(value: Value) -> PlainRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn add(store: &InMemoryDirectoryStore, gate: &PermissionGate, plain: Value) -> EntityId {
        let class = store.get_class(CLASS).unwrap().unwrap();
        let values = from_plain_update(&class, &record(plain)).unwrap();
        let entities = EntityStore::new(store, gate);
        let id = entities.create_entity(&Actor::Lead, CLASS).unwrap();
        entities.add_schema_support(&Actor::Lead, id, 0, values).unwrap();
        id
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    #[test]
    fn record_round_trip() {
        let (store, gate) = setup();
        let plain = json!({
            "title": "Intro",
            "plays": 42,
            "tags": ["ambient", "live"],
            "next": null,
            "explicit": false,
        });
        let id = add(&store, &gate, plain.clone());

        let rendered = to_plain_object(&store, id, PlainOptions::default()).unwrap();
        let mut expected = record(plain);
        // Omitted optional properties come back as null.
        expected.insert("digest".into(), Value::Null);
        assert_eq!(rendered, expected);
    }

    #[test]
    fn hashed_text_is_one_way() {
        let (store, gate) = setup();
        let id = add(&store, &gate, json!({"title": "a", "digest": "secret lyrics"}));
        let rendered = to_plain_object(&store, id, PlainOptions::default()).unwrap();

        let digest = ContentHasher::TEXT.hash_text("secret lyrics").to_hex();
        assert_eq!(rendered["digest"], json!(digest));
        assert_ne!(rendered["digest"], json!("secret lyrics"));
    }

    #[test]
    fn references_render_as_ids_or_nested_records() {
        let (store, gate) = setup();
        let first = add(&store, &gate, json!({"title": "first"}));
        let second = add(&store, &gate, json!({"title": "second", "next": first.0}));

        let flat = to_plain_object(&store, second, PlainOptions::default()).unwrap();
        assert_eq!(flat["next"], json!(first.0));

        let resolved = to_plain_object(
            &store,
            second,
            PlainOptions {
                resolve_references: true,
            },
        )
        .unwrap();
        assert_eq!(resolved["next"]["title"], json!("first"));
        assert_eq!(resolved["next"]["next"], Value::Null);
    }

    #[test]
    fn missing_entity() {
        let (store, _) = setup();
        assert!(matches!(
            to_plain_object(&store, EntityId(5), PlainOptions::default()),
            Err(DirectoryError::Validation(ValidationError::EntityNotFound(EntityId(5))))
        ));
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn update_is_keyed_by_property_id() {
        let (store, _) = setup();
        let class = store.get_class(CLASS).unwrap().unwrap();
        let values = from_plain_update(&class, &record(json!({"plays": 3, "title": "x"}))).unwrap();
        assert_eq!(values.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(values[&1], InputPropertyValue::Single(InputValue::Uint32(3)));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let (store, _) = setup();
        let class = store.get_class(CLASS).unwrap().unwrap();
        assert_eq!(
            from_plain_update(&class, &record(json!({"artist": "x"}))),
            Err(ValidationError::UnknownPropertyName("artist".into()))
        );
    }

    #[test]
    fn out_of_range_and_mistyped_values() {
        let (store, _) = setup();
        let class = store.get_class(CLASS).unwrap().unwrap();
        assert_eq!(
            from_plain_update(&class, &record(json!({"plays": -1}))),
            Err(ValidationError::PropertyValueDoNotMatchType)
        );
        assert_eq!(
            from_plain_update(&class, &record(json!({"plays": 5_000_000_000u64}))),
            Err(ValidationError::PropertyValueDoNotMatchType)
        );
        assert_eq!(
            from_plain_update(&class, &record(json!({"tags": ["ok", 3]}))),
            Err(ValidationError::PropertyValueTypeDoesNotMatchInternalVectorType)
        );
        assert_eq!(
            from_plain_update(&class, &record(json!({"tags": "ok"}))),
            Err(ValidationError::PropertyValueDoNotMatchType)
        );
    }

    #[test]
    fn hash_property_takes_text() {
        let (store, _) = setup();
        let class = store.get_class(CLASS).unwrap().unwrap();
        let values = from_plain_update(&class, &record(json!({"digest": "abc"}))).unwrap();
        assert_eq!(
            values[&3],
            InputPropertyValue::Single(InputValue::TextToHash("abc".into()))
        );
    }
}
