use crate::error::{GateError, PermissionError};
use crate::stage::{AccessRequest, EntityAction, GateContext, GateStage, StageDecision};

/// Refuses `CreateEntity` on classes with creation blocked, whoever asks.
pub struct CreationStage;

impl GateStage for CreationStage {
    fn name(&self) -> &str {
        "creation"
    }

    fn evaluate(
        &self,
        request: &AccessRequest<'_>,
        _context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        if request.action == EntityAction::CreateEntity
            && request.class.permissions().entity_creation_blocked
        {
            return Ok(StageDecision::Deny(PermissionError::EntityCreationBlocked));
        }
        Ok(StageDecision::Pass)
    }
}
