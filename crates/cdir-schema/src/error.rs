use cdir_types::{ClassId, CuratorGroupId, CuratorId, EntityId, Nonce, PropertyId, SchemaId};

/// Recoverable validation failures.
///
/// Returned before any state is mutated: an operation that fails with a
/// `ValidationError` leaves the directory exactly as it found it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    // ---- input length constraints ----
    #[error("property name is too short")]
    PropertyNameTooShort,

    #[error("property name is too long")]
    PropertyNameTooLong,

    #[error("property description is too short")]
    PropertyDescriptionTooShort,

    #[error("property description is too long")]
    PropertyDescriptionTooLong,

    #[error("class name is too short")]
    ClassNameTooShort,

    #[error("class name is too long")]
    ClassNameTooLong,

    #[error("class description is too short")]
    ClassDescriptionTooShort,

    #[error("class description is too long")]
    ClassDescriptionTooLong,

    // ---- configured limits ----
    #[error("maximum number of classes reached")]
    ClassLimitReached,

    #[error("maximum number of schemas for {0} reached")]
    ClassSchemasLimitReached(ClassId),

    #[error("maximum number of properties for {0} reached")]
    ClassPropertiesLimitReached(ClassId),

    #[error("maximum number of maintainers for {0} reached")]
    ClassMaintainersLimitReached(ClassId),

    #[error("maximum number of curators in {0} reached")]
    CuratorsPerGroupLimitReached(CuratorGroupId),

    #[error("per-controller creation limit exceeds the class-wide entity limit")]
    PerControllerEntitiesCreationLimitExceedsOverallLimit,

    #[error("entities-per-class limit exceeds the configured maximum")]
    EntitiesNumberPerClassConstraintViolated,

    #[error("per-controller creation limit exceeds the configured maximum")]
    IndividualNumberOfClassEntitiesPerActorIsTooBig,

    #[error("new entity limit {limit} is less than the {existing} entities already created")]
    NewEntitiesMaxCountIsLessThanNumberOfAlreadyCreated { limit: u64, existing: u64 },

    #[error("batch holds {count} operations, limit is {limit}")]
    NumberOfOperationsDuringAtomicBatchingLimitReached { count: usize, limit: usize },

    // ---- property values ----
    #[error("text property is too long")]
    TextPropertyTooLong,

    #[error("text to be hashed is too long")]
    HashedTextPropertyTooLong,

    #[error("vector property is too long")]
    VecPropertyTooLong,

    #[error("property value vector can not contain more values")]
    EntityPropertyValueVectorIsTooLong,

    #[error("index {index} is out of range for a vector of length {len}")]
    EntityPropValueVectorIndexIsOutOfRange { index: u16, len: usize },

    #[error("property value does not match the property type")]
    PropertyValueDoNotMatchType,

    #[error("value type does not match the vector's item type")]
    PropertyValueTypeDoesNotMatchInternalVectorType,

    #[error("value of property {0} is not a vector")]
    PropertyValueUnderGivenIndexIsNotAVector(PropertyId),

    #[error("vector nonce mismatch: current {current}, provided {provided}")]
    PropertyValueVecNoncesDoesNotMatch { current: Nonce, provided: Nonce },

    #[error("value of unique property {0} is already used by another entity")]
    PropertyValueShouldBeUnique(PropertyId),

    // ---- classes and schemas ----
    #[error("class not found: {0}")]
    ClassNotFound(ClassId),

    #[error("class property not found: {0}")]
    ClassPropertyNotFound(PropertyId),

    #[error("unknown class schema id: {0}")]
    UnknownClassSchemaId(SchemaId),

    #[error("class schema {0} is not active")]
    ClassSchemaNotActive(SchemaId),

    #[error("class schema refers to unknown property {0}")]
    ClassSchemaRefersUnknownPropertyIndex(PropertyId),

    #[error("reference property refers to unknown {0}")]
    ClassSchemaRefersUnknownClass(ClassId),

    #[error("cannot add a schema with no properties")]
    NoPropertiesInClassSchema,

    #[error("cannot add a schema to a class that has no properties")]
    ClassHasNoProperties,

    #[error("property name {0:?} is not unique within its class")]
    PropertyNameNotUniqueInAClass(String),

    #[error("class has no property named {0:?}")]
    UnknownPropertyName(String),

    // ---- entities ----
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("schema {0} is already supported by the entity")]
    SchemaAlreadyAddedToTheEntity(SchemaId),

    #[error("required property {0} is missing")]
    MissingRequiredProperty(PropertyId),

    #[error("schema does not contain property {0}")]
    SchemaDoesNotContainProvidedPropertyId(PropertyId),

    #[error("entity has no value for property {0}")]
    UnknownEntityPropertyId(PropertyId),

    #[error("entity already holds a value for property {0}")]
    EntityAlreadyContainsGivenPropertyId(PropertyId),

    #[error("entity limit of {0} reached")]
    VoucherLimitReached(ClassId),

    #[error("controller's entity creation voucher for {0} is exhausted")]
    ControllerVoucherLimitReached(ClassId),

    #[error("provided controller is equal to the current one")]
    ProvidedEntityControllerIsEqualToTheCurrentOne,

    // ---- curator groups ----
    #[error("curator group not found: {0}")]
    CuratorGroupNotFound(CuratorGroupId),

    #[error("{0} maintains at least one class and can not be removed")]
    CuratorGroupRemovalForbidden(CuratorGroupId),

    #[error("{0} already maintains the class")]
    MaintainerAlreadyExists(CuratorGroupId),

    #[error("{0} does not maintain the class")]
    MaintainerDoesNotExist(CuratorGroupId),

    #[error("{0} is already a member of the group")]
    CuratorIsAlreadyAMemberOfGivenCuratorGroup(CuratorId),

    #[error("{0} is not a member of the group")]
    CuratorIsNotAMemberOfGivenCuratorGroup(CuratorId),
}

/// Result alias for validation checks.
pub type ValidationResult<T> = Result<T, ValidationError>;
