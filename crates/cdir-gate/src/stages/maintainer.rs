use cdir_types::Actor;

use crate::error::{GateError, PermissionError};
use crate::stage::{AccessRequest, GateContext, GateStage, StageDecision};

/// Grants curators whose group maintains the class.
pub struct MaintainerStage;

impl GateStage for MaintainerStage {
    fn name(&self) -> &str {
        "maintainer"
    }

    fn evaluate(
        &self,
        request: &AccessRequest<'_>,
        _context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        match request.actor {
            Actor::Curator(group_id, _) if request.class.permissions().is_maintainer(*group_id) => {
                Ok(StageDecision::Grant)
            }
            Actor::Curator(..) => Ok(StageDecision::Deny(PermissionError::ClassAccessDenied)),
            _ => Ok(StageDecision::Pass),
        }
    }
}
