//! Session-scoped state: acts and their recorded steps.

pub mod act;
pub mod step;

pub use act::{Act, ActId, ActMetadata, ActResult, SessionId};
pub use step::{ModelInput, ModelOutput, Step};
