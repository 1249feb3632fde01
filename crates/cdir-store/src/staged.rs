use std::collections::BTreeMap;
use std::sync::RwLock;

use cdir_schema::{Class, CuratorGroup, Entity, EntityCreationVoucher};
use cdir_types::{ClassId, CuratorGroupId, EntityController, EntityId, HashValue, IdKind};

use crate::error::StoreResult;
use crate::traits::DirectoryStore;

// `None` marks a removal that shadows a record still present in the base.
#[derive(Default)]
struct Overlay {
    classes: BTreeMap<ClassId, Class>,
    entities: BTreeMap<EntityId, Option<Entity>>,
    curator_groups: BTreeMap<CuratorGroupId, Option<CuratorGroup>>,
    vouchers: BTreeMap<(ClassId, EntityController), EntityCreationVoucher>,
    unique_values: BTreeMap<HashValue, bool>,
    id_counters: BTreeMap<IdKind, u64>,
}

impl Overlay {
    fn len(&self) -> usize {
        self.classes.len()
            + self.entities.len()
            + self.curator_groups.len()
            + self.vouchers.len()
            + self.unique_values.len()
            + self.id_counters.len()
    }
}

/// A copy-on-write overlay over another store.
///
/// Reads fall through to the base store unless the key was written in this
/// stage. Writes land in the overlay only. [`commit`](Self::commit) copies
/// the overlay into the base; dropping the stage discards it, leaving the
/// base exactly as it was.
pub struct StagedStore<'a, S: DirectoryStore + ?Sized> {
    base: &'a S,
    overlay: RwLock<Overlay>,
}

impl<'a, S: DirectoryStore + ?Sized> StagedStore<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            overlay: RwLock::new(Overlay::default()),
        }
    }

    /// Number of keys written in this stage.
    pub fn staged_writes(&self) -> usize {
        self.overlay.read().expect("lock poisoned").len()
    }

    /// Write every staged change through to the base store.
    pub fn commit(self) -> StoreResult<()> {
        let overlay = self.overlay.into_inner().expect("lock poisoned");
        let writes = overlay.len();
        let base = self.base;

        for (id, class) in overlay.classes {
            base.put_class(id, class)?;
        }
        for (id, entity) in overlay.entities {
            match entity {
                Some(entity) => base.put_entity(id, entity)?,
                None => {
                    base.remove_entity(id)?;
                }
            }
        }
        for (id, group) in overlay.curator_groups {
            match group {
                Some(group) => base.put_curator_group(id, group)?,
                None => {
                    base.remove_curator_group(id)?;
                }
            }
        }
        for ((class_id, controller), voucher) in overlay.vouchers {
            base.put_voucher(class_id, &controller, voucher)?;
        }
        for (key, present) in overlay.unique_values {
            if present {
                base.insert_unique(key)?;
            } else {
                base.remove_unique(&key)?;
            }
        }
        for (kind, value) in overlay.id_counters {
            base.set_id_counter(kind, value)?;
        }

        tracing::trace!(writes, "staged changes committed");
        Ok(())
    }
}

impl<S: DirectoryStore + ?Sized> DirectoryStore for StagedStore<'_, S> {
    fn get_class(&self, id: ClassId) -> StoreResult<Option<Class>> {
        if let Some(class) = self.overlay.read().expect("lock poisoned").classes.get(&id) {
            return Ok(Some(class.clone()));
        }
        self.base.get_class(id)
    }

    fn put_class(&self, id: ClassId, class: Class) -> StoreResult<()> {
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.classes.insert(id, class);
        Ok(())
    }

    fn get_entity(&self, id: EntityId) -> StoreResult<Option<Entity>> {
        if let Some(entity) = self.overlay.read().expect("lock poisoned").entities.get(&id) {
            return Ok(entity.clone());
        }
        self.base.get_entity(id)
    }

    fn put_entity(&self, id: EntityId, entity: Entity) -> StoreResult<()> {
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.entities.insert(id, Some(entity));
        Ok(())
    }

    fn remove_entity(&self, id: EntityId) -> StoreResult<bool> {
        let existed = self.get_entity(id)?.is_some();
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.entities.insert(id, None);
        Ok(existed)
    }

    fn get_curator_group(&self, id: CuratorGroupId) -> StoreResult<Option<CuratorGroup>> {
        if let Some(group) = self
            .overlay
            .read()
            .expect("lock poisoned")
            .curator_groups
            .get(&id)
        {
            return Ok(group.clone());
        }
        self.base.get_curator_group(id)
    }

    fn put_curator_group(&self, id: CuratorGroupId, group: CuratorGroup) -> StoreResult<()> {
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.curator_groups.insert(id, Some(group));
        Ok(())
    }

    fn remove_curator_group(&self, id: CuratorGroupId) -> StoreResult<bool> {
        let existed = self.get_curator_group(id)?.is_some();
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.curator_groups.insert(id, None);
        Ok(existed)
    }

    fn get_voucher(
        &self,
        class_id: ClassId,
        controller: &EntityController,
    ) -> StoreResult<Option<EntityCreationVoucher>> {
        let key = (class_id, controller.clone());
        if let Some(voucher) = self.overlay.read().expect("lock poisoned").vouchers.get(&key) {
            return Ok(Some(*voucher));
        }
        self.base.get_voucher(class_id, controller)
    }

    fn put_voucher(
        &self,
        class_id: ClassId,
        controller: &EntityController,
        voucher: EntityCreationVoucher,
    ) -> StoreResult<()> {
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.vouchers.insert((class_id, controller.clone()), voucher);
        Ok(())
    }

    fn contains_unique(&self, key: &HashValue) -> StoreResult<bool> {
        if let Some(present) = self.overlay.read().expect("lock poisoned").unique_values.get(key) {
            return Ok(*present);
        }
        self.base.contains_unique(key)
    }

    fn insert_unique(&self, key: HashValue) -> StoreResult<()> {
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.unique_values.insert(key, true);
        Ok(())
    }

    fn remove_unique(&self, key: &HashValue) -> StoreResult<()> {
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.unique_values.insert(*key, false);
        Ok(())
    }

    fn id_counter(&self, kind: IdKind) -> StoreResult<u64> {
        if let Some(value) = self.overlay.read().expect("lock poisoned").id_counters.get(&kind) {
            return Ok(*value);
        }
        self.base.id_counter(kind)
    }

    fn set_id_counter(&self, kind: IdKind, value: u64) -> StoreResult<()> {
        let mut overlay = self.overlay.write().expect("lock poisoned");
        overlay.id_counters.insert(kind, value);
        Ok(())
    }
}

impl<S: DirectoryStore + ?Sized> std::fmt::Debug for StagedStore<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedStore")
            .field("staged_writes", &self.staged_writes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDirectoryStore;
    use cdir_schema::ClassPermissions;

    fn entity() -> Entity {
        Entity::new(ClassId(1), EntityController::Lead)
    }

    // -----------------------------------------------------------------------
    // Isolation
    // -----------------------------------------------------------------------

    #[test]
    fn writes_are_invisible_to_base_until_commit() {
        let base = InMemoryDirectoryStore::new();
        let staged = StagedStore::new(&base);
        staged.put_entity(EntityId(1), entity()).unwrap();
        staged.next_id(IdKind::Entity).unwrap();

        assert!(staged.get_entity(EntityId(1)).unwrap().is_some());
        assert!(base.get_entity(EntityId(1)).unwrap().is_none());
        assert_eq!(base.id_counter(IdKind::Entity).unwrap(), 1);

        staged.commit().unwrap();
        assert!(base.get_entity(EntityId(1)).unwrap().is_some());
        assert_eq!(base.id_counter(IdKind::Entity).unwrap(), 2);
    }

    #[test]
    fn dropping_discards_everything() {
        let base = InMemoryDirectoryStore::new();
        base.put_entity(EntityId(1), entity()).unwrap();
        let before = base.snapshot();
        {
            let staged = StagedStore::new(&base);
            staged.remove_entity(EntityId(1)).unwrap();
            staged
                .put_class(ClassId(1), Class::new(ClassPermissions::default(), "C", "", 1, 1))
                .unwrap();
            staged.insert_unique(HashValue::from_hash([3; 32])).unwrap();
            assert_eq!(staged.staged_writes(), 3);
        }
        assert_eq!(base.snapshot(), before);
    }

    // -----------------------------------------------------------------------
    // Removals
    // -----------------------------------------------------------------------

    #[test]
    fn removal_shadows_base_record() {
        let base = InMemoryDirectoryStore::new();
        base.put_entity(EntityId(1), entity()).unwrap();
        let staged = StagedStore::new(&base);

        assert!(staged.remove_entity(EntityId(1)).unwrap());
        assert!(staged.get_entity(EntityId(1)).unwrap().is_none());
        assert!(!staged.remove_entity(EntityId(1)).unwrap());

        staged.commit().unwrap();
        assert!(base.get_entity(EntityId(1)).unwrap().is_none());
    }

    #[test]
    fn unique_removal_shadows_base_key() {
        let base = InMemoryDirectoryStore::new();
        let key = HashValue::from_hash([5; 32]);
        base.insert_unique(key).unwrap();

        let staged = StagedStore::new(&base);
        staged.remove_unique(&key).unwrap();
        assert!(!staged.contains_unique(&key).unwrap());
        assert!(base.contains_unique(&key).unwrap());

        staged.commit().unwrap();
        assert!(!base.contains_unique(&key).unwrap());
    }

    #[test]
    fn stages_nest() {
        let base = InMemoryDirectoryStore::new();
        let outer = StagedStore::new(&base);
        {
            let inner = StagedStore::new(&outer);
            inner.put_entity(EntityId(4), entity()).unwrap();
            inner.commit().unwrap();
        }
        assert!(outer.get_entity(EntityId(4)).unwrap().is_some());
        assert!(base.get_entity(EntityId(4)).unwrap().is_none());
    }
}
