//! Permission gate for the content directory.
//!
//! Every entity mutation is authorized by the gate before it reaches the
//! store. The gate runs a fail-fast pipeline of stages; the first stage to
//! grant or deny decides.
//!
//! # Default pipeline
//!
//! 1. [`CreationStage`] -- refuses creation on classes with creation blocked
//! 2. [`ActorStage`] -- grants the lead, checks curator group membership
//! 3. [`MaintainerStage`] -- grants curators of a maintaining group
//! 4. [`ControllerStage`] -- decides for members by entity controller
//!
//! Beyond the pipeline, [`PermissionGate::ensure_values_unlocked`] enforces
//! property locking policies against the actor's [`derive_access_level`].
//!
//! # Quick Start
//!
//! ```rust
//! use cdir_gate::{AccessRequest, EntityAction, GateConfig, PermissionGate};
//! use cdir_schema::{Class, ClassPermissions};
//! use cdir_store::InMemoryDirectoryStore;
//! use cdir_types::{Actor, ClassId};
//!
//! let gate = PermissionGate::with_default_stages(GateConfig::default());
//! let store = InMemoryDirectoryStore::new();
//! let class = Class::new(ClassPermissions::default(), "Video", "", 10, 10);
//! let request = AccessRequest::new(&Actor::Lead, ClassId(1), &class, EntityAction::CreateEntity);
//! assert!(gate.authorize(&request, &store).is_ok());
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod gate;
pub mod stage;
pub mod stages;

pub use access::derive_access_level;
pub use config::GateConfig;
pub use error::{GateError, PermissionError};
pub use gate::PermissionGate;
pub use stage::{AccessRequest, EntityAction, GateContext, GateStage, StageDecision};
pub use stages::{ActorStage, ControllerStage, CreationStage, MaintainerStage};
