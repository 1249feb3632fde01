use std::collections::{BTreeMap, BTreeSet};

use cdir_gate::PermissionGate;
use cdir_schema::{Class, Entity, InputPropertyValue, InputValue, Property};
use cdir_store::{DirectoryStore, InMemoryDirectoryStore, StagedStore};
use cdir_types::{
    Actor, ClassId, CuratorGroupId, CuratorId, EntityController, EntityId, Nonce, PropertyId,
    SchemaId, VecMaxLength,
};

use crate::batch::{BatchExecutor, Operation};
use crate::config::DirectoryConfig;
use crate::entities::{EntityPermissionsUpdate, EntityStore};
use crate::error::{BatchError, DirectoryResult};
use crate::plain::{self, PlainOptions, PlainRecord};
use crate::registry::{load_class, ClassDefinition, ClassPermissionsUpdate, ClassRegistry};

/// A content directory over a host-supplied store.
///
/// Each mutating call runs in a [`StagedStore`] and reaches the host store
/// only if it succeeds as a whole.
pub struct Directory<S: DirectoryStore = InMemoryDirectoryStore> {
    store: S,
    config: DirectoryConfig,
    gate: PermissionGate,
}

impl<S: DirectoryStore> Directory<S> {
    pub fn new(store: S, config: DirectoryConfig) -> Self {
        let gate = PermissionGate::with_default_stages(config.gate.clone());
        Self { store, config, gate }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    fn staged<T>(
        &self,
        operation: impl FnOnce(&dyn DirectoryStore) -> DirectoryResult<T>,
    ) -> DirectoryResult<T> {
        let staged = StagedStore::new(&self.store);
        let value = operation(&staged)?;
        staged.commit()?;
        Ok(value)
    }

    fn registry<T>(
        &self,
        operation: impl FnOnce(&ClassRegistry<'_>) -> DirectoryResult<T>,
    ) -> DirectoryResult<T> {
        self.staged(|store| operation(&ClassRegistry::new(store, &self.config.limits, &self.gate)))
    }

    fn entities<T>(
        &self,
        operation: impl FnOnce(&EntityStore<'_>) -> DirectoryResult<T>,
    ) -> DirectoryResult<T> {
        self.staged(|store| operation(&EntityStore::new(store, &self.gate)))
    }

    // ---- Reads ----

    pub fn class(&self, class_id: ClassId) -> DirectoryResult<Class> {
        load_class(&self.store, class_id)
    }

    pub fn entity(&self, entity_id: EntityId) -> DirectoryResult<Entity> {
        EntityStore::new(&self.store, &self.gate).entity(entity_id)
    }

    pub fn to_plain_object(
        &self,
        entity_id: EntityId,
        options: PlainOptions,
    ) -> DirectoryResult<PlainRecord> {
        plain::to_plain_object(&self.store, entity_id, options)
    }

    /// Convert a client record for an entity of `class_id` into input values.
    pub fn from_plain_update(
        &self,
        class_id: ClassId,
        record: &PlainRecord,
    ) -> DirectoryResult<BTreeMap<PropertyId, InputPropertyValue>> {
        let class = self.class(class_id)?;
        Ok(plain::from_plain_update(&class, record)?)
    }

    // ---- Classes ----

    pub fn add_class(
        &self,
        actor: &Actor,
        definition: &ClassDefinition,
    ) -> DirectoryResult<ClassId> {
        self.registry(|registry| registry.add_class(actor, definition))
    }

    /// Create a class with its properties and schemas in one step.
    pub fn define_class(
        &self,
        actor: &Actor,
        definition: &ClassDefinition,
    ) -> DirectoryResult<ClassId> {
        self.registry(|registry| registry.define_class(actor, definition))
    }

    pub fn add_property(
        &self,
        actor: &Actor,
        class_id: ClassId,
        property: Property,
    ) -> DirectoryResult<PropertyId> {
        self.registry(|registry| registry.add_property(actor, class_id, property))
    }

    pub fn add_schema(
        &self,
        actor: &Actor,
        class_id: ClassId,
        properties: BTreeSet<PropertyId>,
    ) -> DirectoryResult<SchemaId> {
        self.registry(|registry| registry.add_schema(actor, class_id, properties))
    }

    pub fn activate_schema(
        &self,
        actor: &Actor,
        class_id: ClassId,
        schema_id: SchemaId,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.activate_schema(actor, class_id, schema_id))
    }

    pub fn deactivate_schema(
        &self,
        actor: &Actor,
        class_id: ClassId,
        schema_id: SchemaId,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.deactivate_schema(actor, class_id, schema_id))
    }

    pub fn update_class_permissions(
        &self,
        actor: &Actor,
        class_id: ClassId,
        update: ClassPermissionsUpdate,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.update_class_permissions(actor, class_id, update))
    }

    pub fn update_entity_creation_limits(
        &self,
        actor: &Actor,
        class_id: ClassId,
        maximum_entities_count: u64,
        default_entity_creation_voucher_upper_bound: u64,
    ) -> DirectoryResult<()> {
        self.registry(|registry| {
            registry.update_entity_creation_limits(
                actor,
                class_id,
                maximum_entities_count,
                default_entity_creation_voucher_upper_bound,
            )
        })
    }

    pub fn add_maintainer_to_class(
        &self,
        actor: &Actor,
        class_id: ClassId,
        group_id: CuratorGroupId,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.add_maintainer_to_class(actor, class_id, group_id))
    }

    pub fn remove_maintainer_from_class(
        &self,
        actor: &Actor,
        class_id: ClassId,
        group_id: CuratorGroupId,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.remove_maintainer_from_class(actor, class_id, group_id))
    }

    // ---- Curator groups ----

    pub fn add_curator_group(&self, actor: &Actor) -> DirectoryResult<CuratorGroupId> {
        self.registry(|registry| registry.add_curator_group(actor))
    }

    pub fn remove_curator_group(
        &self,
        actor: &Actor,
        group_id: CuratorGroupId,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.remove_curator_group(actor, group_id))
    }

    pub fn set_curator_group_status(
        &self,
        actor: &Actor,
        group_id: CuratorGroupId,
        active: bool,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.set_curator_group_status(actor, group_id, active))
    }

    pub fn add_curator_to_group(
        &self,
        actor: &Actor,
        group_id: CuratorGroupId,
        curator_id: CuratorId,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.add_curator_to_group(actor, group_id, curator_id))
    }

    pub fn remove_curator_from_group(
        &self,
        actor: &Actor,
        group_id: CuratorGroupId,
        curator_id: CuratorId,
    ) -> DirectoryResult<()> {
        self.registry(|registry| registry.remove_curator_from_group(actor, group_id, curator_id))
    }

    // ---- Entities ----

    pub fn create_entity(&self, actor: &Actor, class_id: ClassId) -> DirectoryResult<EntityId> {
        self.entities(|entities| entities.create_entity(actor, class_id))
    }

    pub fn delete_entity(&self, actor: &Actor, entity_id: EntityId) -> DirectoryResult<()> {
        self.entities(|entities| entities.delete_entity(actor, entity_id))
    }

    pub fn add_schema_support(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        schema_id: SchemaId,
        values: BTreeMap<PropertyId, InputPropertyValue>,
    ) -> DirectoryResult<()> {
        self.entities(|entities| entities.add_schema_support(actor, entity_id, schema_id, values))
    }

    pub fn update_property_values(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        updates: BTreeMap<PropertyId, InputPropertyValue>,
    ) -> DirectoryResult<()> {
        self.entities(|entities| entities.update_property_values(actor, entity_id, updates))
    }

    pub fn clear_entity_property_vector(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        property_id: PropertyId,
    ) -> DirectoryResult<()> {
        self.entities(|entities| {
            entities.clear_entity_property_vector(actor, entity_id, property_id)
        })
    }

    pub fn remove_at_entity_property_vector(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        property_id: PropertyId,
        index: VecMaxLength,
        nonce: Nonce,
    ) -> DirectoryResult<()> {
        self.entities(|entities| {
            entities.remove_at_entity_property_vector(actor, entity_id, property_id, index, nonce)
        })
    }

    pub fn insert_at_entity_property_vector(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        property_id: PropertyId,
        index: VecMaxLength,
        value: InputValue,
        nonce: Nonce,
    ) -> DirectoryResult<()> {
        self.entities(|entities| {
            entities.insert_at_entity_property_vector(
                actor,
                entity_id,
                property_id,
                index,
                value,
                nonce,
            )
        })
    }

    pub fn update_entity_permissions(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        update: EntityPermissionsUpdate,
    ) -> DirectoryResult<()> {
        self.entities(|entities| entities.update_entity_permissions(actor, entity_id, update))
    }

    pub fn transfer_entity_ownership(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        new_controller: EntityController,
    ) -> DirectoryResult<()> {
        self.entities(|entities| {
            entities.transfer_entity_ownership(actor, entity_id, new_controller)
        })
    }

    // ---- Batches ----

    /// Run `operations` atomically. Returns the ids of the created entities
    /// in the order of their `CreateEntity` operations.
    pub fn execute_batch(
        &self,
        actor: &Actor,
        operations: Vec<Operation>,
    ) -> Result<Vec<EntityId>, BatchError> {
        BatchExecutor::new(&self.store, &self.gate, self.config.max_operations_per_batch)
            .execute(actor, operations)
    }
}

impl Default for Directory<InMemoryDirectoryStore> {
    fn default() -> Self {
        Self::new(InMemoryDirectoryStore::new(), DirectoryConfig::default())
    }
}

impl<S: DirectoryStore + std::fmt::Debug> std::fmt::Debug for Directory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("gate", &self.gate)
            .finish()
    }
}
