use std::collections::BTreeSet;

use cdir_types::{CuratorGroupId, CuratorId, EntityController};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Class-level policy consulted by the permission gate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPermissions {
    /// Any member may create entities of the class.
    pub any_member: bool,
    /// Nobody, the lead included, may create entities of the class.
    pub entity_creation_blocked: bool,
    /// No property value of any entity of the class may be changed.
    pub all_entity_property_values_locked: bool,
    /// Curator groups maintaining the class.
    pub maintainers: BTreeSet<CuratorGroupId>,
}

impl ClassPermissions {
    pub fn is_maintainer(&self, group_id: CuratorGroupId) -> bool {
        self.maintainers.contains(&group_id)
    }

    pub fn ensure_maintainer_does_not_exist(
        &self,
        group_id: CuratorGroupId,
    ) -> ValidationResult<()> {
        if self.is_maintainer(group_id) {
            return Err(ValidationError::MaintainerAlreadyExists(group_id));
        }
        Ok(())
    }

    pub fn ensure_maintainer_exists(&self, group_id: CuratorGroupId) -> ValidationResult<()> {
        if !self.is_maintainer(group_id) {
            return Err(ValidationError::MaintainerDoesNotExist(group_id));
        }
        Ok(())
    }
}

/// Entity-level policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPermissions {
    pub controller: EntityController,
    /// A frozen entity can not be mutated by its member controller.
    pub frozen: bool,
    /// Whether new references to the entity may be created.
    pub referenceable: bool,
}

impl EntityPermissions {
    pub fn new(controller: EntityController) -> Self {
        Self {
            controller,
            frozen: false,
            referenceable: true,
        }
    }

    pub fn controller_is_equal_to(&self, controller: &EntityController) -> bool {
        self.controller == *controller
    }
}

impl Default for EntityPermissions {
    fn default() -> Self {
        Self::new(EntityController::default())
    }
}

/// A set of curators that can be made a maintainer of classes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratorGroup {
    curators: BTreeSet<CuratorId>,
    active: bool,
    number_of_classes_maintained: u32,
}

impl CuratorGroup {
    pub fn curators(&self) -> &BTreeSet<CuratorId> {
        &self.curators
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_status(&mut self, active: bool) {
        self.active = active;
    }

    pub fn has_curator(&self, curator_id: CuratorId) -> bool {
        self.curators.contains(&curator_id)
    }

    pub fn add_curator(&mut self, curator_id: CuratorId) -> ValidationResult<()> {
        if !self.curators.insert(curator_id) {
            return Err(ValidationError::CuratorIsAlreadyAMemberOfGivenCuratorGroup(
                curator_id,
            ));
        }
        Ok(())
    }

    pub fn remove_curator(&mut self, curator_id: CuratorId) -> ValidationResult<()> {
        if !self.curators.remove(&curator_id) {
            return Err(ValidationError::CuratorIsNotAMemberOfGivenCuratorGroup(
                curator_id,
            ));
        }
        Ok(())
    }

    pub fn number_of_classes_maintained(&self) -> u32 {
        self.number_of_classes_maintained
    }

    pub fn increment_classes_maintained(&mut self) {
        self.number_of_classes_maintained += 1;
    }

    pub fn decrement_classes_maintained(&mut self) {
        self.number_of_classes_maintained = self.number_of_classes_maintained.saturating_sub(1);
    }
}

/// How many entities of a class a single controller may create.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCreationVoucher {
    pub maximum_entities_count: u64,
    pub entities_created: u64,
}

impl EntityCreationVoucher {
    pub fn new(maximum_entities_count: u64) -> Self {
        Self {
            maximum_entities_count,
            entities_created: 0,
        }
    }

    pub fn limit_not_reached(&self) -> bool {
        self.entities_created < self.maximum_entities_count
    }

    pub fn increment_created_entities_count(&mut self) {
        self.entities_created += 1;
    }

    pub fn decrement_created_entities_count(&mut self) {
        self.entities_created = self.entities_created.saturating_sub(1);
    }

    pub fn set_maximum_entities_count(&mut self, maximum_entities_count: u64) {
        self.maximum_entities_count = maximum_entities_count;
    }
}
