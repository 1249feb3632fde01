use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::RwLock;

use cdir_schema::{Class, CuratorGroup, Entity, EntityCreationVoucher};
use cdir_types::{ClassId, CuratorGroupId, EntityController, EntityId, HashValue, IdKind};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::DirectoryStore;

/// Serializable image of a whole directory.
///
/// Vouchers are keyed by a `(class, controller)` pair, which JSON can not use
/// as an object key, so they are kept as a list of entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    pub classes: BTreeMap<ClassId, Class>,
    pub entities: BTreeMap<EntityId, Entity>,
    pub curator_groups: BTreeMap<CuratorGroupId, CuratorGroup>,
    pub vouchers: Vec<(ClassId, EntityController, EntityCreationVoucher)>,
    pub unique_values: BTreeSet<HashValue>,
    pub id_counters: BTreeMap<IdKind, u64>,
}

#[derive(Default)]
struct DirectoryState {
    classes: BTreeMap<ClassId, Class>,
    entities: BTreeMap<EntityId, Entity>,
    curator_groups: BTreeMap<CuratorGroupId, CuratorGroup>,
    vouchers: BTreeMap<(ClassId, EntityController), EntityCreationVoucher>,
    unique_values: BTreeSet<HashValue>,
    id_counters: BTreeMap<IdKind, u64>,
}

/// In-memory, BTreeMap-based directory store.
///
/// Intended for tests, embedding and the CLI. All state is held behind a
/// single `RwLock`; records are cloned on read and write.
pub struct InMemoryDirectoryStore {
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let state = DirectoryState {
            classes: snapshot.classes,
            entities: snapshot.entities,
            curator_groups: snapshot.curator_groups,
            vouchers: snapshot
                .vouchers
                .into_iter()
                .map(|(class_id, controller, voucher)| ((class_id, controller), voucher))
                .collect(),
            unique_values: snapshot.unique_values,
            id_counters: snapshot.id_counters,
        };
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy the current state out of the store.
    pub fn snapshot(&self) -> DirectorySnapshot {
        let state = self.state.read().expect("lock poisoned");
        DirectorySnapshot {
            classes: state.classes.clone(),
            entities: state.entities.clone(),
            curator_groups: state.curator_groups.clone(),
            vouchers: state
                .vouchers
                .iter()
                .map(|((class_id, controller), voucher)| (*class_id, controller.clone(), *voucher))
                .collect(),
            unique_values: state.unique_values.clone(),
            id_counters: state.id_counters.clone(),
        }
    }

    /// Load a store from a JSON snapshot file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let data = std::fs::read(path)?;
        let snapshot: DirectorySnapshot = serde_json::from_slice(&data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tracing::debug!(path = %path.display(), "loaded directory snapshot");
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the store to a JSON snapshot file.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(&self.snapshot())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(path, data)?;
        tracing::debug!(path = %path.display(), "saved directory snapshot");
        Ok(())
    }

    /// Number of entities currently stored.
    pub fn entity_count(&self) -> usize {
        self.state.read().expect("lock poisoned").entities.len()
    }

    /// Sorted ids of all stored entities.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let state = self.state.read().expect("lock poisoned");
        state.entities.keys().copied().collect()
    }
}

impl Default for InMemoryDirectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryStore for InMemoryDirectoryStore {
    fn get_class(&self, id: ClassId) -> StoreResult<Option<Class>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.classes.get(&id).cloned())
    }

    fn put_class(&self, id: ClassId, class: Class) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.classes.insert(id, class);
        Ok(())
    }

    fn get_entity(&self, id: EntityId) -> StoreResult<Option<Entity>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.entities.get(&id).cloned())
    }

    fn put_entity(&self, id: EntityId, entity: Entity) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.entities.insert(id, entity);
        Ok(())
    }

    fn remove_entity(&self, id: EntityId) -> StoreResult<bool> {
        let mut state = self.state.write().expect("lock poisoned");
        Ok(state.entities.remove(&id).is_some())
    }

    fn get_curator_group(&self, id: CuratorGroupId) -> StoreResult<Option<CuratorGroup>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.curator_groups.get(&id).cloned())
    }

    fn put_curator_group(&self, id: CuratorGroupId, group: CuratorGroup) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.curator_groups.insert(id, group);
        Ok(())
    }

    fn remove_curator_group(&self, id: CuratorGroupId) -> StoreResult<bool> {
        let mut state = self.state.write().expect("lock poisoned");
        Ok(state.curator_groups.remove(&id).is_some())
    }

    fn get_voucher(
        &self,
        class_id: ClassId,
        controller: &EntityController,
    ) -> StoreResult<Option<EntityCreationVoucher>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.vouchers.get(&(class_id, controller.clone())).copied())
    }

    fn put_voucher(
        &self,
        class_id: ClassId,
        controller: &EntityController,
        voucher: EntityCreationVoucher,
    ) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.vouchers.insert((class_id, controller.clone()), voucher);
        Ok(())
    }

    fn contains_unique(&self, key: &HashValue) -> StoreResult<bool> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.unique_values.contains(key))
    }

    fn insert_unique(&self, key: HashValue) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.unique_values.insert(key);
        Ok(())
    }

    fn remove_unique(&self, key: &HashValue) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.unique_values.remove(key);
        Ok(())
    }

    fn id_counter(&self, kind: IdKind) -> StoreResult<u64> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.id_counters.get(&kind).copied().unwrap_or(1))
    }

    fn set_id_counter(&self, kind: IdKind, value: u64) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.id_counters.insert(kind, value);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryDirectoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("InMemoryDirectoryStore")
            .field("class_count", &state.classes.len())
            .field("entity_count", &state.entities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdir_schema::ClassPermissions;
    use cdir_types::MemberId;

    fn class() -> Class {
        Class::new(ClassPermissions::default(), "Video", "", 10, 5)
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get_class() {
        let store = InMemoryDirectoryStore::new();
        assert_eq!(store.get_class(ClassId(1)).unwrap(), None);
        store.put_class(ClassId(1), class()).unwrap();
        assert_eq!(store.get_class(ClassId(1)).unwrap(), Some(class()));
    }

    #[test]
    fn remove_entity_reports_existence() {
        let store = InMemoryDirectoryStore::new();
        store
            .put_entity(EntityId(1), Entity::new(ClassId(1), EntityController::Lead))
            .unwrap();
        assert_eq!(store.entity_count(), 1);
        assert!(store.remove_entity(EntityId(1)).unwrap());
        assert!(!store.remove_entity(EntityId(1)).unwrap());
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn vouchers_are_keyed_by_controller() {
        let store = InMemoryDirectoryStore::new();
        let alice = EntityController::Member(MemberId(1));
        let bob = EntityController::Member(MemberId(2));
        store
            .put_voucher(ClassId(1), &alice, EntityCreationVoucher::new(3))
            .unwrap();
        assert!(store.get_voucher(ClassId(1), &alice).unwrap().is_some());
        assert!(store.get_voucher(ClassId(1), &bob).unwrap().is_none());
        assert!(store.get_voucher(ClassId(2), &alice).unwrap().is_none());
    }

    #[test]
    fn unique_keys() {
        let store = InMemoryDirectoryStore::new();
        let key = HashValue::from_hash([7; 32]);
        assert!(!store.contains_unique(&key).unwrap());
        store.insert_unique(key).unwrap();
        assert!(store.contains_unique(&key).unwrap());
        store.remove_unique(&key).unwrap();
        assert!(!store.contains_unique(&key).unwrap());
    }

    // -----------------------------------------------------------------------
    // Id allocation
    // -----------------------------------------------------------------------

    #[test]
    fn ids_start_at_one_and_are_per_kind() {
        let store = InMemoryDirectoryStore::new();
        assert_eq!(store.next_id(IdKind::Entity).unwrap(), 1);
        assert_eq!(store.next_id(IdKind::Entity).unwrap(), 2);
        assert_eq!(store.next_id(IdKind::Class).unwrap(), 1);
        assert_eq!(store.id_counter(IdKind::Entity).unwrap(), 3);
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = InMemoryDirectoryStore::new();
        store.put_class(ClassId(1), class()).unwrap();
        store
            .put_voucher(
                ClassId(1),
                &EntityController::Member(MemberId(9)),
                EntityCreationVoucher::new(2),
            )
            .unwrap();
        store.insert_unique(HashValue::from_hash([1; 32])).unwrap();
        store.next_id(IdKind::Class).unwrap();
        store.save(&path).unwrap();

        let loaded = InMemoryDirectoryStore::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
        assert_eq!(loaded.id_counter(IdKind::Class).unwrap(), 2);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            InMemoryDirectoryStore::load(&path),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn debug_shows_counts() {
        let store = InMemoryDirectoryStore::new();
        store.put_class(ClassId(1), class()).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("class_count: 1"));
    }
}
