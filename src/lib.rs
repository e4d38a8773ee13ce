//! Execution engine for the WebPilot browser-automation agent.
//!
//! Turns a natural-language goal into a bounded sequence of remote planning
//! calls and local action executions against a hosted planning service, with
//! strict termination, retry, and failure semantics.
//!
//! # Architecture
//!
//! ```text
//! ActDispatcher ── Backend.step() ──> plan document
//!       │                                 │
//!       │                            interpreter
//!       │                                 │
//!       └──── ProgramRunner.run() <── Program
//! ```
//!
//! - [`dispatcher::ActDispatcher`] owns the step loop: time and step
//!   budgets, pause/cancel polling, terminal classification.
//! - [`backend`] is the protocol client: one implementation per
//!   authentication strategy, selected by [`backend::BackendFactory`].
//! - [`program`] holds the program model, the plan-document interpreter, and
//!   the runner that executes compiled programs against the capability set.
//! - [`tools`] is the capability contract the actuator implements.
//!
//! The concrete actuator (browser driver), URL validation, and sink
//! implementations beyond the in-crate ones live outside this crate.

pub mod backend;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod guardrail;
pub mod program;
pub mod tools;
pub mod types;
pub mod util;

pub use backend::{
    ApiKeyBackend, AuthConfig, AuthStrategy, Backend, BackendFactory, DelegatedBackend,
    Endpoints, PlannerBackend, SigningCredentials,
};
pub use config::{ActConfig, DispatcherConfig};
pub use controller::{ControlState, StateController};
pub use dispatcher::ActDispatcher;
pub use errors::{ActError, ActFailure, ApiFailure};
pub use events::{AgentEvent, BroadcastSink, EventSink, LogLevel, NullSink};
pub use guardrail::{GuardrailDecision, GuardrailState, StateGuardrail};
pub use program::{
    format_return_value, interpret, Call, CallResult, CompiledProgram, InterpreterError, Program,
    ProgramResult, ProgramRunner,
};
pub use tools::{Observation, Tool, ToolArgs, ToolError, ToolRegistry};
pub use types::{Act, ActId, ActMetadata, ActResult, ModelInput, ModelOutput, SessionId, Step};
