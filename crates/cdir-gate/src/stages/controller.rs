use cdir_types::{Actor, EntityController};

use crate::error::{GateError, PermissionError};
use crate::stage::{AccessRequest, EntityAction, GateContext, GateStage, StageDecision};

/// Decides for members.
///
/// Creation needs the class's `any_member` flag. Everything else needs the
/// member to control the entity, and the entity not to be frozen.
/// Changing entity permissions is never open to members.
pub struct ControllerStage;

impl GateStage for ControllerStage {
    fn name(&self) -> &str {
        "controller"
    }

    fn evaluate(
        &self,
        request: &AccessRequest<'_>,
        _context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        let Actor::Member(member_id) = request.actor else {
            return Ok(StageDecision::Pass);
        };

        let decision = match (request.action, request.entity) {
            (EntityAction::CreateEntity, _) if request.class.permissions().any_member => {
                StageDecision::Grant
            }
            (EntityAction::CreateEntity, _) => {
                StageDecision::Deny(PermissionError::ActorCanNotCreateEntities)
            }
            (EntityAction::UpdatePermissions, _) | (_, None) => {
                StageDecision::Deny(PermissionError::EntityAccessDenied)
            }
            (_, Some(entity)) => {
                let permissions = entity.permissions();
                if permissions.controller != EntityController::Member(*member_id) {
                    StageDecision::Deny(PermissionError::EntityAccessDenied)
                } else if permissions.frozen {
                    StageDecision::Deny(PermissionError::EntityFrozen)
                } else {
                    StageDecision::Grant
                }
            }
        };
        Ok(decision)
    }
}
