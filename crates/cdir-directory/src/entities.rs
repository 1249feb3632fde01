use std::collections::BTreeMap;

use cdir_crypto::ContentHasher;
use cdir_gate::{AccessRequest, EntityAction, PermissionGate};
use cdir_schema::{
    validate_input, validate_vector_insert, Class, Entity, EntityCreationVoucher,
    InputPropertyValue, InputValue, Property, StoredPropertyValue, ValidationError,
    VecStoredPropertyValue,
};
use cdir_store::DirectoryStore;
use cdir_types::{
    Actor, ClassId, EntityController, EntityId, IdKind, Nonce, PropertyId, SchemaId, VecMaxLength,
};
use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult, ReferenceIntegrityError};
use crate::references::{ReferenceDeltas, ReferenceIntegrityTracker};
use crate::registry::load_class;
use crate::unique::UniqueValues;

/// Partial update of an entity's permissions. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPermissionsUpdate {
    pub frozen: Option<bool>,
    pub referenceable: Option<bool>,
}

pub(crate) fn load_entity(
    store: &dyn DirectoryStore,
    entity_id: EntityId,
) -> DirectoryResult<Entity> {
    Ok(store
        .get_entity(entity_id)?
        .ok_or(ValidationError::EntityNotFound(entity_id))?)
}

// The entity holds a value for the property, so the class must define it.
fn property_of(
    class: &Class,
    class_id: ClassId,
    property_id: PropertyId,
) -> DirectoryResult<&Property> {
    class.property(property_id).map_err(|_| {
        DirectoryError::invariant(format!("{class_id} has no property {property_id}"))
    })
}

/// Entity lifecycle and value mutation.
///
/// Operations write to the store as they go. Run them over a
/// [`StagedStore`](cdir_store::StagedStore) to discard partial writes when
/// one fails; the [`Directory`](crate::Directory) facade always does.
pub struct EntityStore<'a> {
    store: &'a dyn DirectoryStore,
    gate: &'a PermissionGate,
    hasher: ContentHasher,
}

impl<'a> EntityStore<'a> {
    pub fn new(store: &'a dyn DirectoryStore, gate: &'a PermissionGate) -> Self {
        Self {
            store,
            gate,
            hasher: ContentHasher::TEXT,
        }
    }

    pub fn entity(&self, entity_id: EntityId) -> DirectoryResult<Entity> {
        load_entity(self.store, entity_id)
    }

    fn tracker(&self) -> ReferenceIntegrityTracker<'a> {
        ReferenceIntegrityTracker::new(self.store)
    }

    fn unique(&self) -> UniqueValues<'a> {
        UniqueValues::new(self.store)
    }

    fn authorize(
        &self,
        actor: &Actor,
        class_id: ClassId,
        class: &Class,
        action: EntityAction,
        entity: Option<&Entity>,
    ) -> DirectoryResult<()> {
        let mut request = AccessRequest::new(actor, class_id, class, action);
        if let Some(entity) = entity {
            request = request.on_entity(entity);
        }
        self.gate.authorize(&request, self.store)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create an entity with no schemas, controlled according to `actor`.
    pub fn create_entity(&self, actor: &Actor, class_id: ClassId) -> DirectoryResult<EntityId> {
        let mut class = load_class(self.store, class_id)?;
        self.authorize(actor, class_id, &class, EntityAction::CreateEntity, None)?;
        class.ensure_maximum_entities_count_limit_not_reached(class_id)?;

        let controller = EntityController::from_actor(actor);
        let mut voucher = self
            .store
            .get_voucher(class_id, &controller)?
            .unwrap_or_else(|| {
                EntityCreationVoucher::new(class.default_entity_creation_voucher_upper_bound())
            });
        if !voucher.limit_not_reached() {
            return Err(ValidationError::ControllerVoucherLimitReached(class_id).into());
        }

        let entity_id = EntityId(self.store.next_id(IdKind::Entity)?);
        self.store
            .put_entity(entity_id, Entity::new(class_id, controller.clone()))?;
        class.increment_entities_count();
        self.store.put_class(class_id, class)?;
        voucher.increment_created_entities_count();
        self.store.put_voucher(class_id, &controller, voucher)?;

        tracing::debug!(entity = %entity_id, class = %class_id, %controller, "entity created");
        Ok(entity_id)
    }

    /// Remove an entity nothing references, releasing everything it
    /// references.
    pub fn delete_entity(&self, actor: &Actor, entity_id: EntityId) -> DirectoryResult<()> {
        let entity = load_entity(self.store, entity_id)?;
        let class_id = entity.class_id();
        let mut class = load_class(self.store, class_id)?;
        self.authorize(actor, class_id, &class, EntityAction::DeleteEntity, Some(&entity))?;
        ReferenceIntegrityTracker::ensure_can_delete(entity_id, &entity)?;

        let tracker = self.tracker();
        let unique = self.unique();
        let mut deltas = ReferenceDeltas::new();
        for (property_id, value) in entity.values() {
            let property = property_of(&class, class_id, *property_id)?;
            deltas.merge(tracker.diff(
                entity.controller(),
                &property.property_type,
                &value.involved_entities(),
                &[],
            )?);
            unique.release(class_id, *property_id, property, value)?;
        }

        self.store.remove_entity(entity_id)?;
        tracker.apply(deltas)?;

        class.decrement_entities_count();
        self.store.put_class(class_id, class)?;
        if let Some(mut voucher) = self.store.get_voucher(class_id, entity.controller())? {
            voucher.decrement_created_entities_count();
            self.store.put_voucher(class_id, entity.controller(), voucher)?;
        }

        tracing::debug!(entity = %entity_id, class = %class_id, "entity deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Adopt `schema_id`, supplying values for the schema's properties the
    /// entity does not hold yet.
    ///
    /// Omitted required properties are an error; omitted optional ones are
    /// stored as the unset placeholder.
    pub fn add_schema_support(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        schema_id: SchemaId,
        values: BTreeMap<PropertyId, InputPropertyValue>,
    ) -> DirectoryResult<()> {
        let mut entity = load_entity(self.store, entity_id)?;
        let class_id = entity.class_id();
        let class = load_class(self.store, class_id)?;
        self.authorize(actor, class_id, &class, EntityAction::AddSchemaSupport, Some(&entity))?;

        class.ensure_schema_is_active(schema_id)?;
        if entity.supports_schema(schema_id) {
            return Err(ValidationError::SchemaAlreadyAddedToTheEntity(schema_id).into());
        }
        let schema = class.schema(schema_id)?;
        for property_id in values.keys() {
            if !schema.contains(*property_id) {
                return Err(
                    ValidationError::SchemaDoesNotContainProvidedPropertyId(*property_id).into()
                );
            }
            if entity.value(*property_id).is_some() {
                return Err(
                    ValidationError::EntityAlreadyContainsGivenPropertyId(*property_id).into()
                );
            }
        }

        let mut new_values = BTreeMap::new();
        for property_id in schema.properties() {
            if entity.value(*property_id).is_some() {
                continue;
            }
            let property = property_of(&class, class_id, *property_id)?;
            let stored = match values.get(property_id) {
                Some(input) => validate_input(property, input, &self.hasher)?,
                None if property.required => {
                    return Err(ValidationError::MissingRequiredProperty(*property_id).into());
                }
                None => StoredPropertyValue::unset_for(&property.property_type),
            };
            new_values.insert(*property_id, stored);
        }

        let tracker = self.tracker();
        let unique = self.unique();
        let mut deltas = ReferenceDeltas::new();
        for (property_id, value) in &new_values {
            let property = property_of(&class, class_id, *property_id)?;
            let (controller, property_type) = (entity.controller(), &property.property_type);
            let targets = value.involved_entities();
            tracker.ensure_targets_valid(controller, property_type, &[], &targets)?;
            deltas.merge(tracker.diff(controller, property_type, &[], &targets)?);
            unique.claim(class_id, *property_id, property, value)?;
        }

        entity.values_mut().extend(new_values);
        entity.add_supported_schema(schema_id);
        self.store.put_entity(entity_id, entity)?;
        tracker.apply(deltas)?;

        tracing::debug!(entity = %entity_id, schema = schema_id, "schema support added");
        Ok(())
    }

    /// Replace values of properties the entity already holds.
    pub fn update_property_values(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        updates: BTreeMap<PropertyId, InputPropertyValue>,
    ) -> DirectoryResult<()> {
        let mut entity = load_entity(self.store, entity_id)?;
        let class_id = entity.class_id();
        let class = load_class(self.store, class_id)?;
        self.authorize(actor, class_id, &class, EntityAction::UpdateValues, Some(&entity))?;
        self.gate
            .ensure_values_unlocked(actor, &class, &entity, updates.keys().copied())?;

        let controller = entity.controller().clone();
        let tracker = self.tracker();
        let unique = self.unique();
        let mut deltas = ReferenceDeltas::new();
        for (property_id, input) in updates {
            let old = entity
                .value(property_id)
                .cloned()
                .ok_or(ValidationError::UnknownEntityPropertyId(property_id))?;
            let property = property_of(&class, class_id, property_id)?;
            let new = validate_input(property, &input, &self.hasher)?;
            if new.unique_key() == old.unique_key() {
                continue;
            }

            let property_type = &property.property_type;
            let (old_refs, new_refs) = (old.involved_entities(), new.involved_entities());
            tracker.ensure_targets_valid(&controller, property_type, &old_refs, &new_refs)?;
            deltas.merge(tracker.diff(&controller, property_type, &old_refs, &new_refs)?);
            unique.replace(class_id, property_id, property, &old, &new)?;

            if let Some(slot) = entity.values_mut().get_mut(&property_id) {
                slot.update(new);
            }
        }

        self.store.put_entity(entity_id, entity)?;
        tracker.apply(deltas)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Vector editing
    // -----------------------------------------------------------------------

    pub fn clear_entity_property_vector(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        property_id: PropertyId,
    ) -> DirectoryResult<()> {
        self.edit_vector(actor, entity_id, property_id, |_, vector| {
            vector.clear();
            Ok(())
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
        self.edit_vector(actor, entity_id, property_id, |_, vector| {
            vector.ensure_nonce_equality(nonce)?;
            vector.ensure_index_is_valid_for_removal(index)?;
            vector.remove_at(index);
            Ok(())
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
        let hasher = self.hasher;
        self.edit_vector(actor, entity_id, property_id, |property, vector| {
            vector.ensure_nonce_equality(nonce)?;
            let stored = validate_vector_insert(property, vector, index, &value, &hasher)?;
            vector.insert_at(index, stored);
            Ok(())
        })
    }

    fn edit_vector(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        property_id: PropertyId,
        edit: impl FnOnce(&Property, &mut VecStoredPropertyValue) -> DirectoryResult<()>,
    ) -> DirectoryResult<()> {
        let mut entity = load_entity(self.store, entity_id)?;
        let class_id = entity.class_id();
        let class = load_class(self.store, class_id)?;
        self.authorize(actor, class_id, &class, EntityAction::UpdateValues, Some(&entity))?;
        self.gate
            .ensure_values_unlocked(actor, &class, &entity, [property_id])?;

        let old = entity
            .value(property_id)
            .cloned()
            .ok_or(ValidationError::UnknownEntityPropertyId(property_id))?;
        let property = property_of(&class, class_id, property_id)?;
        let mut new = old.clone();
        let vector = new
            .as_vector_mut()
            .ok_or(ValidationError::PropertyValueUnderGivenIndexIsNotAVector(property_id))?;
        edit(property, vector)?;

        let tracker = self.tracker();
        let (controller, property_type) = (entity.controller(), &property.property_type);
        let (old_refs, new_refs) = (old.involved_entities(), new.involved_entities());
        tracker.ensure_targets_valid(controller, property_type, &old_refs, &new_refs)?;
        let deltas = tracker.diff(controller, property_type, &old_refs, &new_refs)?;
        self.unique()
            .replace(class_id, property_id, property, &old, &new)?;

        entity.values_mut().insert(property_id, new);
        self.store.put_entity(entity_id, entity)?;
        tracker.apply(deltas)
    }

    // -----------------------------------------------------------------------
    // Permissions and ownership
    // -----------------------------------------------------------------------

    pub fn update_entity_permissions(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        update: EntityPermissionsUpdate,
    ) -> DirectoryResult<()> {
        let mut entity = load_entity(self.store, entity_id)?;
        let class_id = entity.class_id();
        let class = load_class(self.store, class_id)?;
        self.authorize(actor, class_id, &class, EntityAction::UpdatePermissions, Some(&entity))?;

        let permissions = entity.permissions_mut();
        if let Some(frozen) = update.frozen {
            permissions.frozen = frozen;
        }
        if let Some(referenceable) = update.referenceable {
            permissions.referenceable = referenceable;
        }
        self.store.put_entity(entity_id, entity)?;
        Ok(())
    }

    /// Hand an entity to another controller. Lead only.
    ///
    /// Refused while same-controller references point at or out of the
    /// entity, since they would no longer hold. The creation voucher slot
    /// moves with the entity.
    pub fn transfer_entity_ownership(
        &self,
        actor: &Actor,
        entity_id: EntityId,
        new_controller: EntityController,
    ) -> DirectoryResult<()> {
        self.gate.ensure_lead(actor)?;
        let mut entity = load_entity(self.store, entity_id)?;
        let class_id = entity.class_id();
        let class = load_class(self.store, class_id)?;

        if entity.permissions().controller_is_equal_to(&new_controller) {
            return Err(ValidationError::ProvidedEntityControllerIsEqualToTheCurrentOne.into());
        }
        if !entity.reference_counter().is_same_owner_equal_to_zero() {
            return Err(ReferenceIntegrityError::EntityInboundSameOwnerRcDoesNotEqualToZero(
                entity_id,
            )
            .into());
        }
        for (property_id, value) in entity.values() {
            let property = property_of(&class, class_id, *property_id)?;
            if !property.property_type.same_controller_status() {
                continue;
            }
            if let Some(target) = value.involved_entities().first() {
                return Err(
                    ReferenceIntegrityError::SameControllerConstraintViolation(*target).into()
                );
            }
        }

        let mut new_voucher = self
            .store
            .get_voucher(class_id, &new_controller)?
            .unwrap_or_else(|| {
                EntityCreationVoucher::new(class.default_entity_creation_voucher_upper_bound())
            });
        if !new_voucher.limit_not_reached() {
            return Err(ValidationError::ControllerVoucherLimitReached(class_id).into());
        }
        if let Some(mut old_voucher) = self.store.get_voucher(class_id, entity.controller())? {
            old_voucher.decrement_created_entities_count();
            self.store.put_voucher(class_id, entity.controller(), old_voucher)?;
        }
        new_voucher.increment_created_entities_count();
        self.store.put_voucher(class_id, &new_controller, new_voucher)?;

        tracing::debug!(
            entity = %entity_id,
            from = %entity.controller(),
            to = %new_controller,
            "ownership transferred"
        );
        entity.permissions_mut().controller = new_controller;
        self.store.put_entity(entity_id, entity)?;
        Ok(())
    }
}
