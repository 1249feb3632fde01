//! Built-in gate stages.

pub mod actor;
pub mod controller;
pub mod creation;
pub mod maintainer;

pub use actor::ActorStage;
pub use controller::ControllerStage;
pub use creation::CreationStage;
pub use maintainer::MaintainerStage;
