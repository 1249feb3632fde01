use cdir_crypto::HasherError;
use cdir_gate::{GateError, PermissionError};
use cdir_schema::ValidationError;
use cdir_store::StoreError;
use cdir_types::{ClassId, EntityId};

/// Structural problems with references between entities.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceIntegrityError {
    #[error("{0} is still referenced and can not be deleted")]
    CannotDeleteNonEmptyEntity(EntityId),

    #[error("{0} is referenced through same-controller properties")]
    EntityInboundSameOwnerRcDoesNotEqualToZero(EntityId),

    #[error("{entity} is not an instance of {expected}")]
    ReferencedEntityDoesNotMatchItsClass { entity: EntityId, expected: ClassId },

    #[error("{0} can not be referenced")]
    EntityCanNotBeReferenced(EntityId),

    #[error("{0} does not share the referencing entity's controller")]
    SameControllerConstraintViolation(EntityId),
}

/// Failures resolving intra-batch placeholders.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BatchResolutionError {
    /// The index does not name an earlier `CreateEntity` operation.
    #[error("operation index {0} does not refer to an earlier CreateEntity operation")]
    InvalidInternalEntityIndex(u32),
}

/// Errors from directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("permission denied: {0}")]
    Permission(#[from] PermissionError),

    #[error("reference integrity error: {0}")]
    ReferenceIntegrity(#[from] ReferenceIntegrityError),

    #[error("batch resolution error: {0}")]
    BatchResolution(#[from] BatchResolutionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("hasher error: {0}")]
    Hasher(#[from] HasherError),

    #[error("configuration error: {0}")]
    Config(String),

    /// Internal consistency violation. State was already inconsistent
    /// before the failing operation.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl DirectoryError {
    /// Build an invariant violation and log it.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "directory invariant violated");
        Self::Invariant(message)
    }

    /// Whether the error is recoverable (anything but an invariant violation).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Invariant(_))
    }
}

impl From<GateError> for DirectoryError {
    fn from(error: GateError) -> Self {
        match error {
            GateError::Denied(denied) => Self::Permission(denied),
            GateError::Store(store) => Self::Store(store),
        }
    }
}

/// Result alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// A failed batch: the first failing operation and why it failed.
///
/// `operation_index` equal to the number of submitted operations means the
/// batch failed as a whole after every operation succeeded, while
/// committing.
#[derive(Debug, thiserror::Error)]
#[error("operation {operation_index} failed: {error}")]
pub struct BatchError {
    pub operation_index: usize,
    #[source]
    pub error: DirectoryError,
}

impl BatchError {
    pub fn new(operation_index: usize, error: impl Into<DirectoryError>) -> Self {
        Self {
            operation_index,
            error: error.into(),
        }
    }
}
