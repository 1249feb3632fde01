use cdir_types::Actor;

use crate::error::{GateError, PermissionError};
use crate::stage::{AccessRequest, GateContext, GateStage, StageDecision};

/// Establishes who the actor is.
///
/// The lead is granted outright. A curator must belong to an existing,
/// active curator group. Members pass through to the controller check.
pub struct ActorStage;

impl GateStage for ActorStage {
    fn name(&self) -> &str {
        "actor"
    }

    fn evaluate(
        &self,
        request: &AccessRequest<'_>,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        match request.actor {
            Actor::Lead => Ok(StageDecision::Grant),
            Actor::Curator(group_id, curator_id) => {
                let Some(group) = context.store.get_curator_group(*group_id)? else {
                    return Ok(StageDecision::Deny(
                        PermissionError::CuratorGroupDoesNotExist(*group_id),
                    ));
                };
                if !group.is_active() {
                    return Ok(StageDecision::Deny(
                        PermissionError::CuratorGroupIsNotActive(*group_id),
                    ));
                }
                if !group.has_curator(*curator_id) {
                    return Ok(StageDecision::Deny(
                        PermissionError::CuratorIsNotAMemberOfCuratorGroup {
                            group: *group_id,
                            curator: *curator_id,
                        },
                    ));
                }
                Ok(StageDecision::Pass)
            }
            Actor::Member(_) => Ok(StageDecision::Pass),
        }
    }
}
