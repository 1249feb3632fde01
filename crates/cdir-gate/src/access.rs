use cdir_schema::{Class, Entity, EntityAccessLevel};
use cdir_types::{Actor, EntityController};

/// The capacity in which an already authorized actor touches `entity`.
///
/// Returns `None` when the actor is neither the entity's controller nor a
/// maintainer of its class.
pub fn derive_access_level(
    actor: &Actor,
    class: &Class,
    entity: &Entity,
) -> Option<EntityAccessLevel> {
    let controller = entity.controller();
    match actor {
        Actor::Lead if *controller == EntityController::Lead => {
            Some(EntityAccessLevel::EntityControllerAndMaintainer)
        }
        Actor::Lead => Some(EntityAccessLevel::EntityMaintainer),
        Actor::Curator(group_id, _) if class.permissions().is_maintainer(*group_id) => {
            if *controller == EntityController::Maintainers {
                Some(EntityAccessLevel::EntityControllerAndMaintainer)
            } else {
                Some(EntityAccessLevel::EntityMaintainer)
            }
        }
        Actor::Curator(..) => None,
        Actor::Member(member_id) if *controller == EntityController::Member(*member_id) => {
            Some(EntityAccessLevel::EntityController)
        }
        Actor::Member(_) => None,
    }
}
