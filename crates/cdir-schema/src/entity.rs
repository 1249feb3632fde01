use std::collections::{BTreeMap, BTreeSet};

use cdir_types::{ClassId, EntityController, PropertyId, SchemaId};
use serde::{Deserialize, Serialize};

use crate::permissions::EntityPermissions;
use crate::value::StoredPropertyValue;

/// Number of live references pointing at an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundReferenceCounter {
    pub total: u32,
    /// References made through `same_controller` properties while the two
    /// entities shared a controller.
    pub same_owner: u32,
}

impl InboundReferenceCounter {
    pub fn is_total_equal_to_zero(&self) -> bool {
        self.total == 0
    }

    pub fn is_same_owner_equal_to_zero(&self) -> bool {
        self.same_owner == 0
    }
}

/// An instance of a class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    class_id: ClassId,
    permissions: EntityPermissions,
    supported_schemas: BTreeSet<SchemaId>,
    values: BTreeMap<PropertyId, StoredPropertyValue>,
    reference_counter: InboundReferenceCounter,
}

impl Entity {
    /// A fresh entity with no schemas and no values.
    pub fn new(class_id: ClassId, controller: EntityController) -> Self {
        Self {
            class_id,
            permissions: EntityPermissions::new(controller),
            supported_schemas: BTreeSet::new(),
            values: BTreeMap::new(),
            reference_counter: InboundReferenceCounter::default(),
        }
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn permissions(&self) -> &EntityPermissions {
        &self.permissions
    }

    pub fn permissions_mut(&mut self) -> &mut EntityPermissions {
        &mut self.permissions
    }

    pub fn controller(&self) -> &EntityController {
        &self.permissions.controller
    }

    pub fn supported_schemas(&self) -> &BTreeSet<SchemaId> {
        &self.supported_schemas
    }

    pub fn supports_schema(&self, schema_id: SchemaId) -> bool {
        self.supported_schemas.contains(&schema_id)
    }

    pub fn add_supported_schema(&mut self, schema_id: SchemaId) {
        self.supported_schemas.insert(schema_id);
    }

    pub fn values(&self) -> &BTreeMap<PropertyId, StoredPropertyValue> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut BTreeMap<PropertyId, StoredPropertyValue> {
        &mut self.values
    }

    pub fn value(&self, property_id: PropertyId) -> Option<&StoredPropertyValue> {
        self.values.get(&property_id)
    }

    pub fn reference_counter(&self) -> &InboundReferenceCounter {
        &self.reference_counter
    }

    pub fn reference_counter_mut(&mut self) -> &mut InboundReferenceCounter {
        &mut self.reference_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdir_types::MemberId;

    #[test]
    fn new_entity_is_empty() {
        let entity = Entity::new(ClassId(1), EntityController::Member(MemberId(4)));
        assert!(entity.supported_schemas().is_empty());
        assert!(entity.values().is_empty());
        assert!(entity.reference_counter().is_total_equal_to_zero());
        assert_eq!(entity.controller(), &EntityController::Member(MemberId(4)));
    }

    #[test]
    fn schema_support_is_a_set() {
        let mut entity = Entity::new(ClassId(1), EntityController::Lead);
        entity.add_supported_schema(0);
        entity.add_supported_schema(0);
        assert_eq!(entity.supported_schemas().len(), 1);
        assert!(entity.supports_schema(0));
    }
}
