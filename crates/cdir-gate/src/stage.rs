use cdir_schema::{Class, Entity};
use cdir_store::DirectoryStore;
use cdir_types::{Actor, ClassId};

use crate::error::{GateError, PermissionError};

// ---------------------------------------------------------------------------
// EntityAction
// ---------------------------------------------------------------------------

/// What the actor wants to do to an entity of a class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityAction {
    CreateEntity,
    UpdateValues,
    AddSchemaSupport,
    DeleteEntity,
    /// Toggle `frozen` / `referenceable`. Maintainers only.
    UpdatePermissions,
}

// ---------------------------------------------------------------------------
// AccessRequest
// ---------------------------------------------------------------------------

/// A single authorization question put to the gate.
#[derive(Clone, Copy, Debug)]
pub struct AccessRequest<'a> {
    pub actor: &'a Actor,
    pub class_id: ClassId,
    pub class: &'a Class,
    pub action: EntityAction,
    /// The target entity. `None` for `CreateEntity`.
    pub entity: Option<&'a Entity>,
}

impl<'a> AccessRequest<'a> {
    pub fn new(
        actor: &'a Actor,
        class_id: ClassId,
        class: &'a Class,
        action: EntityAction,
    ) -> Self {
        Self {
            actor,
            class_id,
            class,
            action,
            entity: None,
        }
    }

    pub fn on_entity(mut self, entity: &'a Entity) -> Self {
        self.entity = Some(entity);
        self
    }
}

// ---------------------------------------------------------------------------
// StageDecision
// ---------------------------------------------------------------------------

/// The outcome of a single gate stage evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    /// No objection; proceed to the next stage.
    Pass,
    /// The actor is authorized; later stages are skipped.
    Grant,
    /// The actor is refused; later stages are skipped.
    Deny(PermissionError),
}

impl StageDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny(_))
    }
}

// ---------------------------------------------------------------------------
// GateContext
// ---------------------------------------------------------------------------

/// State available to every gate stage.
pub struct GateContext<'a> {
    /// Read access to curator groups.
    pub store: &'a dyn DirectoryStore,
}

impl<'a> GateContext<'a> {
    pub fn new(store: &'a dyn DirectoryStore) -> Self {
        Self { store }
    }
}

// ---------------------------------------------------------------------------
// GateStage trait
// ---------------------------------------------------------------------------

/// A single step in the permission pipeline.
///
/// Stages are evaluated in order. The first `Grant` or `Deny` ends the
/// evaluation.
pub trait GateStage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        request: &AccessRequest<'_>,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError>;
}
