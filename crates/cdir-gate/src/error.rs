use std::fmt;

use cdir_store::StoreError;
use cdir_types::{CuratorGroupId, CuratorId, PropertyId};

/// Why an actor was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error("only the lead may perform this operation")]
    LeadAuthFailed,

    #[error("curator group does not exist: {0}")]
    CuratorGroupDoesNotExist(CuratorGroupId),

    #[error("curator group is not active: {0}")]
    CuratorGroupIsNotActive(CuratorGroupId),

    #[error("{curator} is not a member of {group}")]
    CuratorIsNotAMemberOfCuratorGroup {
        group: CuratorGroupId,
        curator: CuratorId,
    },

    #[error("curator group does not maintain the class")]
    ClassAccessDenied,

    #[error("actor can not create entities of the class")]
    ActorCanNotCreateEntities,

    #[error("actor does not control the entity")]
    EntityAccessDenied,

    #[error("entity is frozen")]
    EntityFrozen,

    #[error("entity creation is blocked for the class")]
    EntityCreationBlocked,

    #[error("property {0} is locked for the actor")]
    ClassPropertyTypeLockedForGivenActor(PropertyId),

    #[error("all property values of the class are locked")]
    AllPropertiesWereLockedOnClassLevel,

    #[error("no stage authorized the actor")]
    ActorNotAuthorized,
}

/// Errors from gate evaluation.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The actor is not allowed to perform the action.
    #[error("permission denied: {0}")]
    Denied(#[from] PermissionError),

    /// Reading curator groups from the store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl GateError {
    /// The permission error, if this is a denial.
    pub fn as_denied(&self) -> Option<&PermissionError> {
        match self {
            Self::Denied(error) => Some(error),
            Self::Store(_) => None,
        }
    }
}

impl PartialEq for GateError {
    fn eq(&self, other: &Self) -> bool {
        // Compare by display representation for test convenience.
        fmt::format(format_args!("{self}")) == fmt::format(format_args!("{other}"))
    }
}

impl Eq for GateError {}
