use std::collections::BTreeSet;

use cdir_gate::PermissionGate;
use cdir_schema::{
    Class, ClassPermissions, CuratorGroup, Limits, Property, Schema, ValidationError,
};
use cdir_store::DirectoryStore;
use cdir_types::{Actor, ClassId, CuratorGroupId, CuratorId, IdKind, PropertyId, SchemaId};
use serde::{Deserialize, Serialize};

use crate::error::DirectoryResult;

/// Everything needed to create a class, optionally with its initial
/// properties and schemas.
///
/// Schemas refer to properties by their position in `properties`, which is
/// also the id they receive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: ClassPermissions,
    pub maximum_entities_count: u64,
    pub default_entity_creation_voucher_upper_bound: u64,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub schemas: Vec<BTreeSet<PropertyId>>,
}

impl ClassDefinition {
    pub fn new(
        name: impl Into<String>,
        maximum_entities_count: u64,
        default_entity_creation_voucher_upper_bound: u64,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            permissions: ClassPermissions::default(),
            maximum_entities_count,
            default_entity_creation_voucher_upper_bound,
            properties: Vec::new(),
            schemas: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: ClassPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_schema(mut self, properties: impl IntoIterator<Item = PropertyId>) -> Self {
        self.schemas.push(properties.into_iter().collect());
        self
    }
}

/// Partial update of a class's permissions. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPermissionsUpdate {
    pub any_member: Option<bool>,
    pub entity_creation_blocked: Option<bool>,
    pub all_entity_property_values_locked: Option<bool>,
    pub maintainers: Option<BTreeSet<CuratorGroupId>>,
}

pub(crate) fn load_class(store: &dyn DirectoryStore, class_id: ClassId) -> DirectoryResult<Class> {
    Ok(store
        .get_class(class_id)?
        .ok_or(ValidationError::ClassNotFound(class_id))?)
}

fn load_curator_group(
    store: &dyn DirectoryStore,
    group_id: CuratorGroupId,
) -> DirectoryResult<CuratorGroup> {
    Ok(store
        .get_curator_group(group_id)?
        .ok_or(ValidationError::CuratorGroupNotFound(group_id))?)
}

/// Class, schema and curator group administration. Every operation is
/// restricted to the lead.
pub struct ClassRegistry<'a> {
    store: &'a dyn DirectoryStore,
    limits: &'a Limits,
    gate: &'a PermissionGate,
}

impl<'a> ClassRegistry<'a> {
    pub fn new(
        store: &'a dyn DirectoryStore,
        limits: &'a Limits,
        gate: &'a PermissionGate,
    ) -> Self {
        Self {
            store,
            limits,
            gate,
        }
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    /// Create an empty class.
    pub fn add_class(
        &self,
        actor: &Actor,
        definition: &ClassDefinition,
    ) -> DirectoryResult<ClassId> {
        self.gate.ensure_lead(actor)?;

        let existing = self.store.id_counter(IdKind::Class)?.saturating_sub(1);
        if existing >= self.limits.max_number_of_classes {
            return Err(ValidationError::ClassLimitReached.into());
        }
        self.limits.class_name_length.ensure_valid(
            definition.name.len(),
            ValidationError::ClassNameTooShort,
            ValidationError::ClassNameTooLong,
        )?;
        self.limits.class_description_length.ensure_valid(
            definition.description.len(),
            ValidationError::ClassDescriptionTooShort,
            ValidationError::ClassDescriptionTooLong,
        )?;
        self.ensure_entity_creation_limits_are_valid(
            definition.maximum_entities_count,
            definition.default_entity_creation_voucher_upper_bound,
        )?;

        let class_id = ClassId(self.store.next_id(IdKind::Class)?);
        self.ensure_maintainers_are_valid(class_id, &definition.permissions.maintainers)?;
        for group_id in &definition.permissions.maintainers {
            self.update_classes_maintained(*group_id, CuratorGroup::increment_classes_maintained)?;
        }

        let class = Class::new(
            definition.permissions.clone(),
            definition.name.clone(),
            definition.description.clone(),
            definition.maximum_entities_count,
            definition.default_entity_creation_voucher_upper_bound,
        );
        self.store.put_class(class_id, class)?;
        tracing::debug!(class = %class_id, name = %definition.name, "class created");
        Ok(class_id)
    }

    /// Create a class together with its initial properties and schemas.
    pub fn define_class(
        &self,
        actor: &Actor,
        definition: &ClassDefinition,
    ) -> DirectoryResult<ClassId> {
        let class_id = self.add_class(actor, definition)?;
        for property in &definition.properties {
            self.add_property(actor, class_id, property.clone())?;
        }
        for properties in &definition.schemas {
            self.add_schema(actor, class_id, properties.clone())?;
        }
        Ok(class_id)
    }

    /// Append a property to a class.
    ///
    /// Fails once the class has reached its entity limit: the class is then
    /// considered settled.
    pub fn add_property(
        &self,
        actor: &Actor,
        class_id: ClassId,
        property: Property,
    ) -> DirectoryResult<PropertyId> {
        self.gate.ensure_lead(actor)?;
        let mut class = load_class(self.store, class_id)?;

        class.ensure_maximum_entities_count_limit_not_reached(class_id)?;
        if class.properties().len() >= self.limits.max_number_of_properties_per_class {
            return Err(ValidationError::ClassPropertiesLimitReached(class_id).into());
        }
        property.ensure_definition_is_valid(self.limits)?;
        if class.property_id_by_name(&property.name).is_some() {
            return Err(ValidationError::PropertyNameNotUniqueInAClass(property.name).into());
        }
        if let Some(target) = property.property_type.inner_type().referenced_class() {
            if target != class_id && self.store.get_class(target)?.is_none() {
                return Err(ValidationError::ClassSchemaRefersUnknownClass(target).into());
            }
        }

        let name = property.name.clone();
        let property_id = class.push_property(property);
        self.store.put_class(class_id, class)?;
        tracing::debug!(class = %class_id, property = property_id, %name, "property added");
        Ok(property_id)
    }

    /// Add a schema over existing properties. The schema starts active.
    pub fn add_schema(
        &self,
        actor: &Actor,
        class_id: ClassId,
        properties: BTreeSet<PropertyId>,
    ) -> DirectoryResult<SchemaId> {
        self.gate.ensure_lead(actor)?;
        let mut class = load_class(self.store, class_id)?;

        if class.properties().is_empty() {
            return Err(ValidationError::ClassHasNoProperties.into());
        }
        if properties.is_empty() {
            return Err(ValidationError::NoPropertiesInClassSchema.into());
        }
        if class.schemas().len() >= self.limits.max_number_of_schemas_per_class {
            return Err(ValidationError::ClassSchemasLimitReached(class_id).into());
        }
        if let Some(unknown) = properties
            .iter()
            .find(|id| **id as usize >= class.properties().len())
        {
            return Err(ValidationError::ClassSchemaRefersUnknownPropertyIndex(*unknown).into());
        }

        let schema_id = class.push_schema(Schema::new(properties));
        self.store.put_class(class_id, class)?;
        tracing::debug!(class = %class_id, schema = schema_id, "schema added");
        Ok(schema_id)
    }

    pub fn activate_schema(
        &self,
        actor: &Actor,
        class_id: ClassId,
        schema_id: SchemaId,
    ) -> DirectoryResult<()> {
        self.set_schema_status(actor, class_id, schema_id, true)
    }

    pub fn deactivate_schema(
        &self,
        actor: &Actor,
        class_id: ClassId,
        schema_id: SchemaId,
    ) -> DirectoryResult<()> {
        self.set_schema_status(actor, class_id, schema_id, false)
    }

    /// Toggle whether entities may adopt the schema. Entities already
    /// supporting it are unaffected.
    pub fn set_schema_status(
        &self,
        actor: &Actor,
        class_id: ClassId,
        schema_id: SchemaId,
        is_active: bool,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut class = load_class(self.store, class_id)?;
        class.set_schema_status(schema_id, is_active)?;
        self.store.put_class(class_id, class)?;
        Ok(())
    }

    pub fn update_class_permissions(
        &self,
        actor: &Actor,
        class_id: ClassId,
        update: ClassPermissionsUpdate,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut class = load_class(self.store, class_id)?;

        if let Some(maintainers) = update.maintainers {
            self.ensure_maintainers_are_valid(class_id, &maintainers)?;
            let current = class.permissions().maintainers.clone();
            for removed in current.difference(&maintainers) {
                self.update_classes_maintained(
                    *removed,
                    CuratorGroup::decrement_classes_maintained,
                )?;
            }
            for added in maintainers.difference(&current) {
                self.update_classes_maintained(*added, CuratorGroup::increment_classes_maintained)?;
            }
            class.permissions_mut().maintainers = maintainers;
        }

        let permissions = class.permissions_mut();
        if let Some(any_member) = update.any_member {
            permissions.any_member = any_member;
        }
        if let Some(blocked) = update.entity_creation_blocked {
            permissions.entity_creation_blocked = blocked;
        }
        if let Some(locked) = update.all_entity_property_values_locked {
            permissions.all_entity_property_values_locked = locked;
        }
        self.store.put_class(class_id, class)?;
        Ok(())
    }

    pub fn update_entity_creation_limits(
        &self,
        actor: &Actor,
        class_id: ClassId,
        maximum_entities_count: u64,
        default_entity_creation_voucher_upper_bound: u64,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut class = load_class(self.store, class_id)?;

        self.ensure_entity_creation_limits_are_valid(
            maximum_entities_count,
            default_entity_creation_voucher_upper_bound,
        )?;
        if maximum_entities_count < class.current_number_of_entities() {
            return Err(ValidationError::NewEntitiesMaxCountIsLessThanNumberOfAlreadyCreated {
                limit: maximum_entities_count,
                existing: class.current_number_of_entities(),
            }
            .into());
        }

        class.set_maximum_entities_count(maximum_entities_count);
        class.set_default_entity_creation_voucher_upper_bound(
            default_entity_creation_voucher_upper_bound,
        );
        self.store.put_class(class_id, class)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Maintainers
    // -----------------------------------------------------------------------

    pub fn add_maintainer_to_class(
        &self,
        actor: &Actor,
        class_id: ClassId,
        group_id: CuratorGroupId,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut class = load_class(self.store, class_id)?;
        load_curator_group(self.store, group_id)?;

        class.permissions().ensure_maintainer_does_not_exist(group_id)?;
        let maintainers = class.permissions().maintainers.len();
        if maintainers >= self.limits.max_number_of_maintainers_per_class {
            return Err(ValidationError::ClassMaintainersLimitReached(class_id).into());
        }

        class.permissions_mut().maintainers.insert(group_id);
        self.update_classes_maintained(group_id, CuratorGroup::increment_classes_maintained)?;
        self.store.put_class(class_id, class)?;
        Ok(())
    }

    pub fn remove_maintainer_from_class(
        &self,
        actor: &Actor,
        class_id: ClassId,
        group_id: CuratorGroupId,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut class = load_class(self.store, class_id)?;
        class.permissions().ensure_maintainer_exists(group_id)?;

        class.permissions_mut().maintainers.remove(&group_id);
        self.update_classes_maintained(group_id, CuratorGroup::decrement_classes_maintained)?;
        self.store.put_class(class_id, class)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Curator groups
    // -----------------------------------------------------------------------

    /// Create an empty, inactive curator group.
    pub fn add_curator_group(&self, actor: &Actor) -> DirectoryResult<CuratorGroupId> {
        self.gate.ensure_lead(actor)?;
        let group_id = CuratorGroupId(self.store.next_id(IdKind::CuratorGroup)?);
        self.store.put_curator_group(group_id, CuratorGroup::default())?;
        tracing::debug!(group = %group_id, "curator group created");
        Ok(group_id)
    }

    pub fn remove_curator_group(
        &self,
        actor: &Actor,
        group_id: CuratorGroupId,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let group = load_curator_group(self.store, group_id)?;
        if group.number_of_classes_maintained() > 0 {
            return Err(ValidationError::CuratorGroupRemovalForbidden(group_id).into());
        }
        self.store.remove_curator_group(group_id)?;
        Ok(())
    }

    pub fn set_curator_group_status(
        &self,
        actor: &Actor,
        group_id: CuratorGroupId,
        active: bool,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut group = load_curator_group(self.store, group_id)?;
        group.set_status(active);
        self.store.put_curator_group(group_id, group)?;
        Ok(())
    }

    pub fn add_curator_to_group(
        &self,
        actor: &Actor,
        group_id: CuratorGroupId,
        curator_id: CuratorId,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut group = load_curator_group(self.store, group_id)?;
        if group.curators().len() >= self.limits.max_number_of_curators_per_group {
            return Err(ValidationError::CuratorsPerGroupLimitReached(group_id).into());
        }
        group.add_curator(curator_id)?;
        self.store.put_curator_group(group_id, group)?;
        Ok(())
    }

    pub fn remove_curator_from_group(
        &self,
        actor: &Actor,
        group_id: CuratorGroupId,
        curator_id: CuratorId,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut group = load_curator_group(self.store, group_id)?;
        group.remove_curator(curator_id)?;
        self.store.put_curator_group(group_id, group)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    fn ensure_entity_creation_limits_are_valid(
        &self,
        maximum_entities_count: u64,
        default_voucher_upper_bound: u64,
    ) -> DirectoryResult<()> {
        if maximum_entities_count > self.limits.max_number_of_entities_per_class {
            return Err(ValidationError::EntitiesNumberPerClassConstraintViolated.into());
        }
        if default_voucher_upper_bound > self.limits.individual_entities_creation_limit {
            return Err(ValidationError::IndividualNumberOfClassEntitiesPerActorIsTooBig.into());
        }
        if default_voucher_upper_bound > maximum_entities_count {
            return Err(
                ValidationError::PerControllerEntitiesCreationLimitExceedsOverallLimit.into()
            );
        }
        Ok(())
    }

    fn ensure_maintainers_are_valid(
        &self,
        class_id: ClassId,
        maintainers: &BTreeSet<CuratorGroupId>,
    ) -> DirectoryResult<()> {
        if maintainers.len() > self.limits.max_number_of_maintainers_per_class {
            return Err(ValidationError::ClassMaintainersLimitReached(class_id).into());
        }
        for group_id in maintainers {
            load_curator_group(self.store, *group_id)?;
        }
        Ok(())
    }

    fn update_classes_maintained(
        &self,
        group_id: CuratorGroupId,
        update: fn(&mut CuratorGroup),
    ) -> DirectoryResult<()> {
        let mut group = load_curator_group(self.store, group_id)?;
        update(&mut group);
        self.store.put_curator_group(group_id, group)?;
        Ok(())
    }
}
