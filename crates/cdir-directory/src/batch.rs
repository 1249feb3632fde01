use std::collections::BTreeMap;

use cdir_gate::PermissionGate;
use cdir_schema::{InputPropertyValue, InputValue, ValidationError, VecInputValue};
use cdir_store::{DirectoryStore, StagedStore};
use cdir_types::{Actor, ClassId, EntityId, PropertyId, SchemaId};
use serde::{Deserialize, Serialize};

use crate::entities::EntityStore;
use crate::error::{BatchError, BatchResolutionError, DirectoryResult};

/// An entity named by an operation: either one created earlier in the same
/// batch, by the position of its `CreateEntity` operation, or one that
/// already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParametrizedEntity {
    InternalEntityJustAdded(u32),
    ExistingEntity(EntityId),
}

/// A property value that may reference entities created earlier in the
/// same batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParametrizedPropertyValue {
    InputPropertyValue(InputPropertyValue),
    InternalEntityJustAdded(u32),
    InternalEntityVec(Vec<ParametrizedEntity>),
}

impl From<InputPropertyValue> for ParametrizedPropertyValue {
    fn from(value: InputPropertyValue) -> Self {
        Self::InputPropertyValue(value)
    }
}

impl ParametrizedPropertyValue {
    fn internal_indices(&self) -> Vec<u32> {
        match self {
            Self::InputPropertyValue(_) => Vec::new(),
            Self::InternalEntityJustAdded(index) => vec![*index],
            Self::InternalEntityVec(entities) => {
                entities.iter().filter_map(ParametrizedEntity::internal_index).collect()
            }
        }
    }
}

impl ParametrizedEntity {
    fn internal_index(&self) -> Option<u32> {
        match self {
            Self::InternalEntityJustAdded(index) => Some(*index),
            Self::ExistingEntity(_) => None,
        }
    }
}

/// One step of a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    CreateEntity {
        class_id: ClassId,
    },
    AddSchemaSupportToEntity {
        entity: ParametrizedEntity,
        schema_id: SchemaId,
        #[serde(default)]
        values: BTreeMap<PropertyId, ParametrizedPropertyValue>,
    },
    UpdatePropertyValues {
        entity: ParametrizedEntity,
        values: BTreeMap<PropertyId, ParametrizedPropertyValue>,
    },
}

impl Operation {
    fn is_create(&self) -> bool {
        matches!(self, Operation::CreateEntity { .. })
    }

    // Every intra-batch index the operation refers to.
    fn internal_indices(&self) -> Vec<u32> {
        match self {
            Operation::CreateEntity { .. } => Vec::new(),
            Operation::AddSchemaSupportToEntity { entity, values, .. }
            | Operation::UpdatePropertyValues { entity, values } => entity
                .internal_index()
                .into_iter()
                .chain(values.values().flat_map(ParametrizedPropertyValue::internal_indices))
                .collect(),
        }
    }
}

/// Maps `CreateEntity` positions to the ids they produced.
#[derive(Debug, Default)]
struct CreatedEntities(BTreeMap<u32, EntityId>);

impl CreatedEntities {
    fn get(&self, index: u32) -> DirectoryResult<EntityId> {
        self.0
            .get(&index)
            .copied()
            .ok_or_else(|| BatchResolutionError::InvalidInternalEntityIndex(index).into())
    }

    fn entity(&self, entity: ParametrizedEntity) -> DirectoryResult<EntityId> {
        match entity {
            ParametrizedEntity::InternalEntityJustAdded(index) => self.get(index),
            ParametrizedEntity::ExistingEntity(id) => Ok(id),
        }
    }

    fn value(&self, value: ParametrizedPropertyValue) -> DirectoryResult<InputPropertyValue> {
        Ok(match value {
            ParametrizedPropertyValue::InputPropertyValue(value) => value,
            ParametrizedPropertyValue::InternalEntityJustAdded(index) => {
                InputPropertyValue::Single(InputValue::Reference(self.get(index)?))
            }
            ParametrizedPropertyValue::InternalEntityVec(entities) => {
                let ids = entities
                    .into_iter()
                    .map(|entity| self.entity(entity))
                    .collect::<DirectoryResult<Vec<_>>>()?;
                InputPropertyValue::Vector(VecInputValue::Reference(ids))
            }
        })
    }

    fn values(
        &self,
        values: BTreeMap<PropertyId, ParametrizedPropertyValue>,
    ) -> DirectoryResult<BTreeMap<PropertyId, InputPropertyValue>> {
        values
            .into_iter()
            .map(|(property_id, value)| Ok((property_id, self.value(value)?)))
            .collect()
    }
}

/// Runs a list of operations as one atomic unit.
///
/// All `CreateEntity` operations run first so later operations can refer to
/// the entities they create. The rest then run in declared order. Every write
/// goes to a [`StagedStore`] that reaches the host store only after the last
/// operation succeeds.
pub struct BatchExecutor<'a> {
    store: &'a dyn DirectoryStore,
    gate: &'a PermissionGate,
    max_operations: usize,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(
        store: &'a dyn DirectoryStore,
        gate: &'a PermissionGate,
        max_operations: usize,
    ) -> Self {
        Self {
            store,
            gate,
            max_operations,
        }
    }

    /// Execute `operations` and return the ids of the created entities, in
    /// the order of their `CreateEntity` operations.
    pub fn execute(
        &self,
        actor: &Actor,
        operations: Vec<Operation>,
    ) -> Result<Vec<EntityId>, BatchError> {
        let count = operations.len();
        if count > self.max_operations {
            return Err(BatchError::new(
                self.max_operations,
                ValidationError::NumberOfOperationsDuringAtomicBatchingLimitReached {
                    count,
                    limit: self.max_operations,
                },
            ));
        }
        Self::check_internal_indices(&operations)?;

        tracing::debug!(%actor, operations = count, "batch started");
        let staged = StagedStore::new(self.store);
        let created = match Self::run(&EntityStore::new(&staged, self.gate), actor, operations) {
            Ok(created) => created,
            Err(error) => {
                tracing::debug!(
                    operation = error.operation_index,
                    error = %error.error,
                    "batch rolled back"
                );
                return Err(error);
            }
        };
        staged.commit().map_err(|error| BatchError::new(count, error))?;

        tracing::debug!(created = created.len(), "batch committed");
        Ok(created)
    }

    // Every internal index must name a `CreateEntity` that precedes the
    // operation using it.
    fn check_internal_indices(operations: &[Operation]) -> Result<(), BatchError> {
        for (position, operation) in operations.iter().enumerate() {
            for index in operation.internal_indices() {
                let valid = (index as usize) < position
                    && operations
                        .get(index as usize)
                        .is_some_and(Operation::is_create);
                if !valid {
                    return Err(BatchError::new(
                        position,
                        BatchResolutionError::InvalidInternalEntityIndex(index),
                    ));
                }
            }
        }
        Ok(())
    }

    fn run(
        entities: &EntityStore<'_>,
        actor: &Actor,
        operations: Vec<Operation>,
    ) -> Result<Vec<EntityId>, BatchError> {
        let mut created = CreatedEntities::default();
        for (position, operation) in operations.iter().enumerate() {
            if let Operation::CreateEntity { class_id } = operation {
                let entity_id = entities
                    .create_entity(actor, *class_id)
                    .map_err(|error| BatchError::new(position, error))?;
                // Positions are bounded by the batch size limit.
                created.0.insert(position as u32, entity_id);
            }
        }

        for (position, operation) in operations.into_iter().enumerate() {
            Self::apply(entities, actor, &created, operation)
                .map_err(|error| BatchError::new(position, error))?;
        }
        Ok(created.0.into_values().collect())
    }

    fn apply(
        entities: &EntityStore<'_>,
        actor: &Actor,
        created: &CreatedEntities,
        operation: Operation,
    ) -> DirectoryResult<()> {
        match operation {
            Operation::CreateEntity { .. } => Ok(()),
            Operation::AddSchemaSupportToEntity {
                entity,
                schema_id,
                values,
            } => entities.add_schema_support(
                actor,
                created.entity(entity)?,
                schema_id,
                created.values(values)?,
            ),
            Operation::UpdatePropertyValues { entity, values } => entities
                .update_property_values(actor, created.entity(entity)?, created.values(values)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdir_schema::{Limits, Property, PropertyType, Type};
    use cdir_store::InMemoryDirectoryStore;

    use crate::error::DirectoryError;
    use crate::registry::{ClassDefinition, ClassRegistry};

    const CLASS: ClassId = ClassId(1);
    const NAME: PropertyId = 0;
    const PARENT: PropertyId = 1;
    const CHILDREN: PropertyId = 2;

    fn setup() -> (InMemoryDirectoryStore, PermissionGate) {
        let store = InMemoryDirectoryStore::new();
        let gate = PermissionGate::default();
        let definition = ClassDefinition::new("Folder", 100, 100)
            .with_property(Property::new("name", PropertyType::Single(Type::Text(32))).required())
            .with_property(Property::new(
                "parent",
                PropertyType::Single(Type::Reference(CLASS, false)),
            ))
            .with_property(Property::new(
                "children",
                PropertyType::vector(Type::Reference(CLASS, false), 10),
            ))
            .with_schema([NAME, PARENT, CHILDREN]);
        ClassRegistry::new(&store, &Limits::default(), &gate)
            .define_class(&Actor::Lead, &definition)
            .unwrap();
        (store, gate)
    }

    fn named(name: &str) -> ParametrizedPropertyValue {
        InputPropertyValue::Single(InputValue::Text(name.into())).into()
    }

    fn adopt(
        entity: ParametrizedEntity,
        values: impl IntoIterator<Item = (PropertyId, ParametrizedPropertyValue)>,
    ) -> Operation {
        Operation::AddSchemaSupportToEntity {
            entity,
            schema_id: 0,
            values: values.into_iter().collect(),
        }
    }

    fn create() -> Operation {
        Operation::CreateEntity { class_id: CLASS }
    }

    fn execute(
        store: &InMemoryDirectoryStore,
        gate: &PermissionGate,
        operations: Vec<Operation>,
    ) -> Result<Vec<EntityId>, BatchError> {
        BatchExecutor::new(store, gate, 10).execute(&Actor::Lead, operations)
    }

    fn inbound(store: &InMemoryDirectoryStore, id: EntityId) -> u32 {
        store.get_entity(id).unwrap().unwrap().reference_counter().total
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn later_operation_references_earlier_creation() {
        let (store, gate) = setup();
        let created = execute(
            &store,
            &gate,
            vec![
                create(),
                adopt(ParametrizedEntity::InternalEntityJustAdded(0), [(NAME, named("root"))]),
                create(),
                adopt(
                    ParametrizedEntity::InternalEntityJustAdded(2),
                    [
                        (NAME, named("child")),
                        (PARENT, ParametrizedPropertyValue::InternalEntityJustAdded(0)),
                    ],
                ),
            ],
        )
        .unwrap();

        assert_eq!(created, vec![EntityId(1), EntityId(2)]);
        assert_eq!(inbound(&store, EntityId(1)), 1);
        let child = store.get_entity(EntityId(2)).unwrap().unwrap();
        assert_eq!(
            child.value(PARENT).and_then(|v| v.as_single()).and_then(|v| v.involved_entity()),
            Some(EntityId(1))
        );
    }

    #[test]
    fn vector_of_mixed_references() {
        let (store, gate) = setup();
        let existing = execute(
            &store,
            &gate,
            vec![
                create(),
                adopt(ParametrizedEntity::InternalEntityJustAdded(0), [(NAME, named("a"))]),
            ],
        )
        .unwrap()[0];

        execute(
            &store,
            &gate,
            vec![
                create(),
                create(),
                adopt(ParametrizedEntity::InternalEntityJustAdded(0), [(NAME, named("b"))]),
                adopt(
                    ParametrizedEntity::InternalEntityJustAdded(1),
                    [
                        (NAME, named("c")),
                        (
                            CHILDREN,
                            ParametrizedPropertyValue::InternalEntityVec(vec![
                                ParametrizedEntity::ExistingEntity(existing),
                                ParametrizedEntity::InternalEntityJustAdded(0),
                            ]),
                        ),
                    ],
                ),
            ],
        )
        .unwrap();

        assert_eq!(inbound(&store, existing), 1);
        assert_eq!(inbound(&store, EntityId(2)), 1);
        assert_eq!(inbound(&store, EntityId(3)), 0);
    }

    #[test]
    fn update_through_internal_entity() {
        let (store, gate) = setup();
        execute(
            &store,
            &gate,
            vec![
                create(),
                adopt(ParametrizedEntity::InternalEntityJustAdded(0), [(NAME, named("old"))]),
                Operation::UpdatePropertyValues {
                    entity: ParametrizedEntity::InternalEntityJustAdded(0),
                    values: [(PARENT, ParametrizedPropertyValue::InternalEntityJustAdded(0))]
                        .into(),
                },
            ],
        )
        .unwrap();
        assert_eq!(inbound(&store, EntityId(1)), 1);
    }

    #[test]
    fn index_referring_to_itself_or_later_is_rejected() {
        let (store, gate) = setup();
        for (operations, position, index) in [
            (
                vec![adopt(ParametrizedEntity::InternalEntityJustAdded(0), [(NAME, named("x"))])],
                0,
                0,
            ),
            (
                vec![
                    create(),
                    adopt(
                        ParametrizedEntity::InternalEntityJustAdded(0),
                        [
                            (NAME, named("x")),
                            (PARENT, ParametrizedPropertyValue::InternalEntityJustAdded(2)),
                        ],
                    ),
                    create(),
                ],
                1,
                2,
            ),
        ] {
            let error = execute(&store, &gate, operations).unwrap_err();
            assert_eq!(error.operation_index, position);
            assert!(matches!(
                error.error,
                DirectoryError::BatchResolution(
                    BatchResolutionError::InvalidInternalEntityIndex(i)
                ) if i == index
            ));
        }
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn index_must_name_a_creation() {
        let (store, gate) = setup();
        let error = execute(
            &store,
            &gate,
            vec![
                create(),
                adopt(ParametrizedEntity::InternalEntityJustAdded(0), [(NAME, named("x"))]),
                adopt(ParametrizedEntity::InternalEntityJustAdded(1), [(NAME, named("y"))]),
            ],
        )
        .unwrap_err();
        assert_eq!(error.operation_index, 2);
        assert_eq!(store.entity_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Atomicity
    // -----------------------------------------------------------------------

    #[test]
    fn failure_leaves_store_untouched() {
        let (store, gate) = setup();
        let before = store.snapshot();
        let error = execute(
            &store,
            &gate,
            vec![
                create(),
                create(),
                adopt(ParametrizedEntity::InternalEntityJustAdded(0), [(NAME, named("ok"))]),
                // Missing required name.
                adopt(ParametrizedEntity::InternalEntityJustAdded(1), []),
            ],
        )
        .unwrap_err();

        assert_eq!(error.operation_index, 3);
        assert!(matches!(
            error.error,
            DirectoryError::Validation(ValidationError::MissingRequiredProperty(NAME))
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn failing_creation_reports_its_position() {
        let (store, gate) = setup();
        let error = execute(
            &store,
            &gate,
            vec![create(), Operation::CreateEntity { class_id: ClassId(9) }],
        )
        .unwrap_err();
        assert_eq!(error.operation_index, 1);
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn operation_limit() {
        let (store, gate) = setup();
        let error = BatchExecutor::new(&store, &gate, 2)
            .execute(&Actor::Lead, vec![create(), create(), create()])
            .unwrap_err();
        assert_eq!(error.operation_index, 2);
        assert!(matches!(
            error.error,
            DirectoryError::Validation(
                ValidationError::NumberOfOperationsDuringAtomicBatchingLimitReached {
                    count: 3,
                    limit: 2
                }
            )
        ));
    }

    #[test]
    fn empty_batch_creates_nothing() {
        let (store, gate) = setup();
        assert_eq!(execute(&store, &gate, Vec::new()).unwrap(), Vec::new());
    }

    #[test]
    fn operations_deserialize_from_json() {
        let json = r#"[
            {"CreateEntity": {"class_id": 1}},
            {"AddSchemaSupportToEntity": {
                "entity": {"InternalEntityJustAdded": 0},
                "schema_id": 0,
                "values": {"0": {"InputPropertyValue": {"Single": {"Text": "root"}}}}
            }}
        ]"#;
        let operations: Vec<Operation> = serde_json::from_str(json).unwrap();
        assert_eq!(
            operations,
            vec![
                create(),
                adopt(ParametrizedEntity::InternalEntityJustAdded(0), [(NAME, named("root"))]),
            ]
        );
    }
}
