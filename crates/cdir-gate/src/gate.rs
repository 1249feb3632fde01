use cdir_schema::{Class, Entity};
use cdir_store::DirectoryStore;
use cdir_types::{Actor, PropertyId};

use crate::access::derive_access_level;
use crate::config::GateConfig;
use crate::error::{GateError, PermissionError};
use crate::stage::{AccessRequest, GateContext, GateStage, StageDecision};
use crate::stages::{ActorStage, ControllerStage, CreationStage, MaintainerStage};

/// The permission gate: a pipeline of stages every mutation of an entity
/// must pass before it touches the store.
pub struct PermissionGate {
    stages: Vec<Box<dyn GateStage>>,
    config: GateConfig,
}

impl PermissionGate {
    /// Create a gate with an empty pipeline.
    ///
    /// Use [`Self::add_stage`] to add stages, or
    /// [`Self::with_default_stages`] for the standard pipeline.
    pub fn new(config: GateConfig) -> Self {
        Self {
            stages: Vec::new(),
            config,
        }
    }

    /// Create a gate with the default pipeline:
    /// Creation -> Actor -> Maintainer -> Controller
    pub fn with_default_stages(config: GateConfig) -> Self {
        let mut gate = Self::new(config);
        gate.add_stage(Box::new(CreationStage));
        gate.add_stage(Box::new(ActorStage));
        gate.add_stage(Box::new(MaintainerStage));
        gate.add_stage(Box::new(ControllerStage));
        gate
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn GateStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run `request` through the pipeline.
    ///
    /// The pipeline is fail-fast: the first stage that grants or denies
    /// decides. A request no stage grants is refused.
    pub fn authorize(
        &self,
        request: &AccessRequest<'_>,
        store: &dyn DirectoryStore,
    ) -> Result<(), GateError> {
        if self.config.permissive {
            return Ok(());
        }

        let context = GateContext::new(store);
        for stage in &self.stages {
            match stage.evaluate(request, &context)? {
                StageDecision::Pass => continue,
                StageDecision::Grant => return Ok(()),
                StageDecision::Deny(error) => {
                    tracing::debug!(
                        actor = %request.actor,
                        class = %request.class_id,
                        action = ?request.action,
                        stage = stage.name(),
                        %error,
                        "access denied"
                    );
                    return Err(error.into());
                }
            }
        }
        Err(PermissionError::ActorNotAuthorized.into())
    }

    /// Refuse anyone but the lead.
    pub fn ensure_lead(&self, actor: &Actor) -> Result<(), GateError> {
        if self.config.permissive || *actor == Actor::Lead {
            return Ok(());
        }
        tracing::debug!(%actor, "lead-only operation refused");
        Err(PermissionError::LeadAuthFailed.into())
    }

    /// Refuse changes to values the actor's access level is locked out of.
    ///
    /// The actor must already have been authorized for the entity.
    pub fn ensure_values_unlocked(
        &self,
        actor: &Actor,
        class: &Class,
        entity: &Entity,
        property_ids: impl IntoIterator<Item = PropertyId>,
    ) -> Result<(), GateError> {
        if self.config.permissive {
            return Ok(());
        }
        if class.permissions().all_entity_property_values_locked {
            return Err(PermissionError::AllPropertiesWereLockedOnClassLevel.into());
        }
        let access_level =
            derive_access_level(actor, class, entity).ok_or(PermissionError::EntityAccessDenied)?;
        for property_id in property_ids {
            // Unknown ids are reported by validation, not here.
            let Ok(property) = class.property(property_id) else {
                continue;
            };
            if property.is_locked_from(access_level) {
                return Err(
                    PermissionError::ClassPropertyTypeLockedForGivenActor(property_id).into()
                );
            }
        }
        Ok(())
    }
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::with_default_stages(GateConfig::default())
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|stage| stage.name()).collect();
        f.debug_struct("PermissionGate")
            .field("stages", &names)
            .field("config", &self.config)
            .finish()
    }
}
