use cdir_schema::{Class, CuratorGroup, Entity, EntityCreationVoucher};
use cdir_types::{ClassId, CuratorGroupId, EntityController, EntityId, HashValue, IdKind};

use crate::error::StoreResult;

/// Host-supplied state of the content directory.
///
/// All implementations must satisfy these invariants:
/// - `get_*` returns `Ok(None)` for a missing record; absence is not an error.
/// - `put_*` overwrites unconditionally. The store does not validate records.
/// - Id counters start at 1 and are never decreased by the directory.
/// - All I/O errors are propagated, never silently ignored.
///
/// Methods take `&self`; implementations use interior mutability so that a
/// store can be shared between readers such as the permission gate and the
/// writer applying an operation.
pub trait DirectoryStore: Send + Sync {
    fn get_class(&self, id: ClassId) -> StoreResult<Option<Class>>;

    fn put_class(&self, id: ClassId, class: Class) -> StoreResult<()>;

    fn get_entity(&self, id: EntityId) -> StoreResult<Option<Entity>>;

    fn put_entity(&self, id: EntityId, entity: Entity) -> StoreResult<()>;

    /// Remove an entity. Returns `true` if it existed.
    fn remove_entity(&self, id: EntityId) -> StoreResult<bool>;

    fn get_curator_group(&self, id: CuratorGroupId) -> StoreResult<Option<CuratorGroup>>;

    fn put_curator_group(&self, id: CuratorGroupId, group: CuratorGroup) -> StoreResult<()>;

    /// Remove a curator group. Returns `true` if it existed.
    fn remove_curator_group(&self, id: CuratorGroupId) -> StoreResult<bool>;

    fn get_voucher(
        &self,
        class_id: ClassId,
        controller: &EntityController,
    ) -> StoreResult<Option<EntityCreationVoucher>>;

    fn put_voucher(
        &self,
        class_id: ClassId,
        controller: &EntityController,
        voucher: EntityCreationVoucher,
    ) -> StoreResult<()>;

    /// Whether the unique-value key is taken.
    fn contains_unique(&self, key: &HashValue) -> StoreResult<bool>;

    fn insert_unique(&self, key: HashValue) -> StoreResult<()>;

    fn remove_unique(&self, key: &HashValue) -> StoreResult<()>;

    /// The next id that will be handed out for `kind`.
    fn id_counter(&self, kind: IdKind) -> StoreResult<u64>;

    fn set_id_counter(&self, kind: IdKind, value: u64) -> StoreResult<()>;

    /// Allocate an id for `kind` and advance the counter.
    ///
    /// The default implementation is a read followed by a write; callers
    /// serialize writes, so no atomic increment is needed.
    fn next_id(&self, kind: IdKind) -> StoreResult<u64> {
        let id = self.id_counter(kind)?;
        self.set_id_counter(kind, id + 1)?;
        Ok(id)
    }
}
