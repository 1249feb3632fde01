use std::collections::BTreeSet;

use cdir_types::{ClassId, PropertyId, SchemaId};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::permissions::ClassPermissions;
use crate::property::Property;

/// A subset of a class's properties that entities can opt into.
///
/// The property set is fixed at creation; only the active flag changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    properties: BTreeSet<PropertyId>,
    is_active: bool,
}

impl Schema {
    /// A new, active schema.
    pub fn new(properties: BTreeSet<PropertyId>) -> Self {
        Self {
            properties,
            is_active: true,
        }
    }

    pub fn properties(&self) -> &BTreeSet<PropertyId> {
        &self.properties
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn contains(&self, property_id: PropertyId) -> bool {
        self.properties.contains(&property_id)
    }

    pub(crate) fn set_status(&mut self, is_active: bool) {
        self.is_active = is_active;
    }
}

/// A template for entities: an append-only list of properties and of
/// schemas over them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    permissions: ClassPermissions,
    properties: Vec<Property>,
    schemas: Vec<Schema>,
    name: String,
    description: String,
    maximum_entities_count: u64,
    current_number_of_entities: u64,
    default_entity_creation_voucher_upper_bound: u64,
}

impl Class {
    pub fn new(
        permissions: ClassPermissions,
        name: impl Into<String>,
        description: impl Into<String>,
        maximum_entities_count: u64,
        default_entity_creation_voucher_upper_bound: u64,
    ) -> Self {
        Self {
            permissions,
            properties: Vec::new(),
            schemas: Vec::new(),
            name: name.into(),
            description: description.into(),
            maximum_entities_count,
            current_number_of_entities: 0,
            default_entity_creation_voucher_upper_bound,
        }
    }

    pub fn permissions(&self) -> &ClassPermissions {
        &self.permissions
    }

    pub fn permissions_mut(&mut self) -> &mut ClassPermissions {
        &mut self.permissions
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn maximum_entities_count(&self) -> u64 {
        self.maximum_entities_count
    }

    pub fn current_number_of_entities(&self) -> u64 {
        self.current_number_of_entities
    }

    pub fn default_entity_creation_voucher_upper_bound(&self) -> u64 {
        self.default_entity_creation_voucher_upper_bound
    }

    pub fn property(&self, property_id: PropertyId) -> ValidationResult<&Property> {
        self.properties
            .get(property_id as usize)
            .ok_or(ValidationError::ClassPropertyNotFound(property_id))
    }

    pub fn schema(&self, schema_id: SchemaId) -> ValidationResult<&Schema> {
        self.schemas
            .get(schema_id as usize)
            .ok_or(ValidationError::UnknownClassSchemaId(schema_id))
    }

    pub fn ensure_schema_is_active(&self, schema_id: SchemaId) -> ValidationResult<()> {
        if !self.schema(schema_id)?.is_active() {
            return Err(ValidationError::ClassSchemaNotActive(schema_id));
        }
        Ok(())
    }

    pub fn property_id_by_name(&self, name: &str) -> Option<PropertyId> {
        self.properties
            .iter()
            .position(|property| property.name == name)
            .map(|index| index as PropertyId)
    }

    /// Append a property and return its id.
    pub fn push_property(&mut self, property: Property) -> PropertyId {
        self.properties.push(property);
        (self.properties.len() - 1) as PropertyId
    }

    /// Append a schema and return its id.
    pub fn push_schema(&mut self, schema: Schema) -> SchemaId {
        self.schemas.push(schema);
        (self.schemas.len() - 1) as SchemaId
    }

    pub fn set_schema_status(
        &mut self,
        schema_id: SchemaId,
        is_active: bool,
    ) -> ValidationResult<()> {
        let schema = self
            .schemas
            .get_mut(schema_id as usize)
            .ok_or(ValidationError::UnknownClassSchemaId(schema_id))?;
        schema.set_status(is_active);
        Ok(())
    }

    pub fn ensure_maximum_entities_count_limit_not_reached(
        &self,
        class_id: ClassId,
    ) -> ValidationResult<()> {
        if self.current_number_of_entities >= self.maximum_entities_count {
            return Err(ValidationError::VoucherLimitReached(class_id));
        }
        Ok(())
    }

    pub fn increment_entities_count(&mut self) {
        self.current_number_of_entities += 1;
    }

    pub fn decrement_entities_count(&mut self) {
        self.current_number_of_entities = self.current_number_of_entities.saturating_sub(1);
    }

    pub fn set_maximum_entities_count(&mut self, maximum_entities_count: u64) {
        self.maximum_entities_count = maximum_entities_count;
    }

    pub fn set_default_entity_creation_voucher_upper_bound(&mut self, upper_bound: u64) {
        self.default_entity_creation_voucher_upper_bound = upper_bound;
    }
}
