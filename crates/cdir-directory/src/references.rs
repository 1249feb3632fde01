use std::collections::BTreeMap;

use cdir_schema::{Entity, PropertyType, Type, ValidationError};
use cdir_store::DirectoryStore;
use cdir_types::{EntityController, EntityId};

use crate::error::{DirectoryError, DirectoryResult, ReferenceIntegrityError};

/// Signed change to one entity's inbound reference counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReferenceDelta {
    pub total: i64,
    pub same_owner: i64,
}

impl ReferenceDelta {
    pub fn is_zero(&self) -> bool {
        self.total == 0 && self.same_owner == 0
    }
}

/// Pending counter changes keyed by referenced entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceDeltas(BTreeMap<EntityId, ReferenceDelta>);

impl ReferenceDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(ReferenceDelta::is_zero)
    }

    /// The accumulated delta for `entity_id`.
    pub fn get(&self, entity_id: EntityId) -> ReferenceDelta {
        self.0.get(&entity_id).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &ReferenceDelta)> {
        self.0.iter().filter(|(_, delta)| !delta.is_zero())
    }

    fn add(&mut self, entity_id: EntityId, delta: ReferenceDelta) {
        let entry = self.0.entry(entity_id).or_default();
        entry.total += delta.total;
        entry.same_owner += delta.same_owner;
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: ReferenceDeltas) {
        for (entity_id, delta) in other.0 {
            self.add(entity_id, delta);
        }
    }
}

/// Multiset difference between the references in `new` and in `old`.
///
/// Positive counts are references gained, negative counts references lost.
/// Entities referenced equally often on both sides are omitted.
pub fn reference_count_diff(old: &[EntityId], new: &[EntityId]) -> BTreeMap<EntityId, i64> {
    let mut counts: BTreeMap<EntityId, i64> = BTreeMap::new();
    for id in new {
        *counts.entry(*id).or_default() += 1;
    }
    for id in old {
        *counts.entry(*id).or_default() -= 1;
    }
    counts.retain(|_, count| *count != 0);
    counts
}

/// Maintains inbound reference counters as property values change.
pub struct ReferenceIntegrityTracker<'a> {
    store: &'a dyn DirectoryStore,
}

impl<'a> ReferenceIntegrityTracker<'a> {
    pub fn new(store: &'a dyn DirectoryStore) -> Self {
        Self { store }
    }

    /// Check the references `new` gains over `old`.
    ///
    /// Every newly referenced entity must exist, be an instance of the
    /// property's target class, be referenceable, and, for same-controller
    /// properties, share `source_controller`.
    pub fn ensure_targets_valid(
        &self,
        source_controller: &EntityController,
        property_type: &PropertyType,
        old: &[EntityId],
        new: &[EntityId],
    ) -> DirectoryResult<()> {
        let Type::Reference(target_class, same_controller) = *property_type.inner_type() else {
            return Ok(());
        };

        for (target_id, count) in reference_count_diff(old, new) {
            if count <= 0 {
                continue;
            }
            let target = self
                .store
                .get_entity(target_id)?
                .ok_or(ValidationError::EntityNotFound(target_id))?;
            if target.class_id() != target_class {
                return Err(ReferenceIntegrityError::ReferencedEntityDoesNotMatchItsClass {
                    entity: target_id,
                    expected: target_class,
                }
                .into());
            }
            if !target.permissions().referenceable {
                return Err(ReferenceIntegrityError::EntityCanNotBeReferenced(target_id).into());
            }
            if same_controller && !target.permissions().controller_is_equal_to(source_controller) {
                return Err(
                    ReferenceIntegrityError::SameControllerConstraintViolation(target_id).into(),
                );
            }
        }
        Ok(())
    }

    /// Counter changes caused by replacing `old` with `new` in a property of
    /// an entity controlled by `source_controller`.
    ///
    /// `same_owner` moves only for same-controller properties whose target
    /// shares the source's controller right now.
    pub fn diff(
        &self,
        source_controller: &EntityController,
        property_type: &PropertyType,
        old: &[EntityId],
        new: &[EntityId],
    ) -> DirectoryResult<ReferenceDeltas> {
        let same_controller = property_type.same_controller_status();
        let mut deltas = ReferenceDeltas::new();

        for (target_id, count) in reference_count_diff(old, new) {
            let same_owner = if same_controller {
                let target = self.load_target(target_id)?;
                if target.permissions().controller_is_equal_to(source_controller) {
                    count
                } else {
                    0
                }
            } else {
                0
            };
            deltas.add(
                target_id,
                ReferenceDelta {
                    total: count,
                    same_owner,
                },
            );
        }
        Ok(deltas)
    }

    /// Apply every delta or none of them.
    ///
    /// All new counter values are computed before any is written; a counter
    /// that would drop below zero is an invariant violation.
    pub fn apply(&self, deltas: ReferenceDeltas) -> DirectoryResult<()> {
        let mut updated = Vec::new();
        for (target_id, delta) in deltas.iter() {
            let mut target = self.load_target(*target_id)?;
            let counter = target.reference_counter_mut();
            counter.total = adjust(counter.total, delta.total, *target_id, "total")?;
            counter.same_owner =
                adjust(counter.same_owner, delta.same_owner, *target_id, "same_owner")?;
            updated.push((*target_id, target));
        }
        for (target_id, target) in updated {
            self.store.put_entity(target_id, target)?;
        }
        Ok(())
    }

    /// Validate, diff and apply in one step.
    pub fn update_references(
        &self,
        source_controller: &EntityController,
        property_type: &PropertyType,
        old: &[EntityId],
        new: &[EntityId],
    ) -> DirectoryResult<()> {
        self.ensure_targets_valid(source_controller, property_type, old, new)?;
        let deltas = self.diff(source_controller, property_type, old, new)?;
        self.apply(deltas)
    }

    /// An entity may be deleted only when nothing references it.
    pub fn can_delete(entity: &Entity) -> bool {
        entity.reference_counter().is_total_equal_to_zero()
    }

    pub fn ensure_can_delete(
        entity_id: EntityId,
        entity: &Entity,
    ) -> Result<(), ReferenceIntegrityError> {
        if !Self::can_delete(entity) {
            return Err(ReferenceIntegrityError::CannotDeleteNonEmptyEntity(entity_id));
        }
        Ok(())
    }

    // Targets of existing references must exist; a missing one means a
    // counter was not maintained.
    fn load_target(&self, target_id: EntityId) -> DirectoryResult<Entity> {
        self.store.get_entity(target_id)?.ok_or_else(|| {
            DirectoryError::invariant(format!("reference to missing {target_id}"))
        })
    }
}

fn adjust(current: u32, delta: i64, entity_id: EntityId, counter: &str) -> DirectoryResult<u32> {
    u32::try_from(i64::from(current) + delta).map_err(|_| {
        DirectoryError::invariant(format!(
            "{counter} reference counter of {entity_id} out of range: {current} + {delta}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdir_store::InMemoryDirectoryStore;
    use cdir_types::{ClassId, MemberId};

    const ALICE: EntityController = EntityController::Member(MemberId(1));
    const BOB: EntityController = EntityController::Member(MemberId(2));

    fn store_with(entities: &[(u64, ClassId, EntityController)]) -> InMemoryDirectoryStore {
        let store = InMemoryDirectoryStore::new();
        for (id, class_id, controller) in entities {
            store
                .put_entity(EntityId(*id), Entity::new(*class_id, controller.clone()))
                .unwrap();
        }
        store
    }

    fn counter(store: &InMemoryDirectoryStore, id: u64) -> (u32, u32) {
        let entity = store.get_entity(EntityId(id)).unwrap().unwrap();
        let counter = entity.reference_counter();
        (counter.total, counter.same_owner)
    }

    fn refs(ids: &[u64]) -> Vec<EntityId> {
        ids.iter().copied().map(EntityId).collect()
    }

    fn reference(same_controller: bool) -> PropertyType {
        PropertyType::vector(Type::Reference(ClassId(1), same_controller), 10)
    }

    // -----------------------------------------------------------------------
    // Multiset diff
    // -----------------------------------------------------------------------

    #[test]
    fn diff_counts_repetitions() {
        let diff = reference_count_diff(&refs(&[1, 1, 2]), &refs(&[1, 3, 3]));
        assert_eq!(diff.get(&EntityId(1)), Some(&-1));
        assert_eq!(diff.get(&EntityId(2)), Some(&-1));
        assert_eq!(diff.get(&EntityId(3)), Some(&2));
    }

    #[test]
    fn reordering_is_not_a_change() {
        assert!(reference_count_diff(&refs(&[1, 2, 3]), &refs(&[3, 1, 2])).is_empty());
    }

    // -----------------------------------------------------------------------
    // Diff and apply
    // -----------------------------------------------------------------------

    #[test]
    fn same_owner_moves_only_for_flagged_properties_with_equal_controllers() {
        let store = store_with(&[(1, ClassId(1), ALICE), (2, ClassId(1), BOB)]);
        let tracker = ReferenceIntegrityTracker::new(&store);

        let flagged = tracker.diff(&ALICE, &reference(true), &[], &refs(&[1, 2])).unwrap();
        assert_eq!(flagged.get(EntityId(1)), ReferenceDelta { total: 1, same_owner: 1 });
        assert_eq!(flagged.get(EntityId(2)), ReferenceDelta { total: 1, same_owner: 0 });

        let plain = tracker.diff(&ALICE, &reference(false), &[], &refs(&[1])).unwrap();
        assert_eq!(plain.get(EntityId(1)), ReferenceDelta { total: 1, same_owner: 0 });
    }

    #[test]
    fn apply_updates_counters() {
        let store = store_with(&[(1, ClassId(1), ALICE)]);
        let tracker = ReferenceIntegrityTracker::new(&store);
        tracker
            .update_references(&ALICE, &reference(true), &[], &refs(&[1, 1]))
            .unwrap();
        assert_eq!(counter(&store, 1), (2, 2));
        tracker
            .update_references(&ALICE, &reference(true), &refs(&[1, 1]), &refs(&[1]))
            .unwrap();
        assert_eq!(counter(&store, 1), (1, 1));
    }

    #[test]
    fn underflow_is_an_invariant_violation_and_writes_nothing() {
        let store = store_with(&[(1, ClassId(1), ALICE), (2, ClassId(1), ALICE)]);
        let tracker = ReferenceIntegrityTracker::new(&store);
        let mut deltas = ReferenceDeltas::new();
        deltas.add(EntityId(1), ReferenceDelta { total: 1, same_owner: 0 });
        deltas.add(EntityId(2), ReferenceDelta { total: -1, same_owner: 0 });

        let result = tracker.apply(deltas);
        assert!(matches!(result, Err(DirectoryError::Invariant(_))));
        assert_eq!(counter(&store, 1), (0, 0));
    }

    #[test]
    fn merged_deltas_cancel_out() {
        let mut first = ReferenceDeltas::new();
        first.add(EntityId(1), ReferenceDelta { total: 1, same_owner: 1 });
        let mut second = ReferenceDeltas::new();
        second.add(EntityId(1), ReferenceDelta { total: -1, same_owner: -1 });
        first.merge(second);
        assert!(first.is_empty());
        assert_eq!(first.iter().count(), 0);
    }

    // -----------------------------------------------------------------------
    // Target validation
    // -----------------------------------------------------------------------

    #[test]
    fn target_must_exist() {
        let store = store_with(&[]);
        let tracker = ReferenceIntegrityTracker::new(&store);
        let result = tracker.ensure_targets_valid(&ALICE, &reference(false), &[], &refs(&[5]));
        assert!(matches!(
            result,
            Err(DirectoryError::Validation(ValidationError::EntityNotFound(EntityId(5))))
        ));
    }

    #[test]
    fn target_class_must_match() {
        let store = store_with(&[(1, ClassId(2), ALICE)]);
        let tracker = ReferenceIntegrityTracker::new(&store);
        let result = tracker.ensure_targets_valid(&ALICE, &reference(false), &[], &refs(&[1]));
        assert!(matches!(
            result,
            Err(DirectoryError::ReferenceIntegrity(
                ReferenceIntegrityError::ReferencedEntityDoesNotMatchItsClass { .. }
            ))
        ));
    }

    #[test]
    fn non_referenceable_target_is_refused_only_for_new_references() {
        let store = store_with(&[(1, ClassId(1), ALICE)]);
        let mut entity = store.get_entity(EntityId(1)).unwrap().unwrap();
        entity.permissions_mut().referenceable = false;
        store.put_entity(EntityId(1), entity).unwrap();
        let tracker = ReferenceIntegrityTracker::new(&store);

        let result = tracker.ensure_targets_valid(&ALICE, &reference(false), &[], &refs(&[1]));
        assert!(matches!(
            result,
            Err(DirectoryError::ReferenceIntegrity(
                ReferenceIntegrityError::EntityCanNotBeReferenced(EntityId(1))
            ))
        ));
        // Keeping an existing reference is fine.
        assert!(tracker
            .ensure_targets_valid(&ALICE, &reference(false), &refs(&[1]), &refs(&[1]))
            .is_ok());
    }

    #[test]
    fn same_controller_constraint() {
        let store = store_with(&[(1, ClassId(1), BOB)]);
        let tracker = ReferenceIntegrityTracker::new(&store);
        let result = tracker.ensure_targets_valid(&ALICE, &reference(true), &[], &refs(&[1]));
        assert!(matches!(
            result,
            Err(DirectoryError::ReferenceIntegrity(
                ReferenceIntegrityError::SameControllerConstraintViolation(EntityId(1))
            ))
        ));
        assert!(tracker
            .ensure_targets_valid(&BOB, &reference(true), &[], &refs(&[1]))
            .is_ok());
    }

    #[test]
    fn deletion_needs_zero_inbound_references() {
        let mut entity = Entity::new(ClassId(1), ALICE);
        assert!(ReferenceIntegrityTracker::ensure_can_delete(EntityId(1), &entity).is_ok());
        entity.reference_counter_mut().total = 1;
        assert_eq!(
            ReferenceIntegrityTracker::ensure_can_delete(EntityId(1), &entity),
            Err(ReferenceIntegrityError::CannotDeleteNonEmptyEntity(EntityId(1)))
        );
    }
}
