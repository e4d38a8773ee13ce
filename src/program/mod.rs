//! Program data model: calls, compiled programs, and run results.
//!
//! A [`Program`] lives for one loop iteration: interpreted from a plan
//! document, compiled against the capability registry, run once, discarded.

pub mod interpreter;
pub mod runner;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ActError;
use crate::tools::{Tool, ToolArgs, ToolRegistry, RETURN_CALL, THROW_CALL};

pub use interpreter::{interpret, InterpreterError};
pub use runner::{format_return_value, ProgramRunner};

/// One named, argument-bearing action request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Unique within one program.
    pub id: String,
    pub name: String,
    pub kwargs: ToolArgs,
}

impl Call {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kwargs: ToolArgs::new(),
        }
    }

    /// Builder: add one named argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    /// Whether this call ends the program when it executes.
    pub fn is_terminal(&self) -> bool {
        self.name == RETURN_CALL || self.name == THROW_CALL
    }
}

/// Ordered sequence of calls, not yet bound to executables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub calls: Vec<Call>,
}

impl Program {
    pub fn new(calls: Vec<Call>) -> Self {
        Self { calls }
    }

    /// Bind every call to its executable.
    ///
    /// Resolution failures surface here, at compile time, never during
    /// execution. An unresolved name is a model fault: the vocabulary sent
    /// to the planner is exactly the registry's contents.
    pub fn compile(&self, tools: &ToolRegistry) -> Result<CompiledProgram, ActError> {
        let mut calls = Vec::with_capacity(self.calls.len());
        for call in &self.calls {
            let target = tools.get(&call.name).ok_or_else(|| {
                ActError::InvalidModelGeneration(crate::errors::ApiFailure::message(format!(
                    "plan references unknown action '{}'",
                    call.name
                )))
            })?;
            calls.push(CompiledCall {
                source: call.clone(),
                target,
            });
        }
        Ok(CompiledProgram { calls })
    }
}

/// A call bound to its resolved executable.
#[derive(Clone)]
pub struct CompiledCall {
    pub source: Call,
    pub target: Arc<dyn Tool>,
}

impl std::fmt::Debug for CompiledCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCall")
            .field("source", &self.source)
            .finish()
    }
}

/// A program whose every call resolved against the capability set.
#[derive(Debug, Clone, Default)]
pub struct CompiledProgram {
    pub calls: Vec<CompiledCall>,
}

/// Outcome of one call: exactly one of `return_value`/`error` is meaningful.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub call: Call,
    pub return_value: Value,
    pub error: Option<ActError>,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the recorded error is in the soft-redirect class.
    pub fn is_soft_redirect(&self) -> bool {
        self.error
            .as_ref()
            .map(ActError::is_soft_redirect)
            .unwrap_or(false)
    }
}

/// Ordered call results of one program run.
///
/// Execution stops at the first terminal call or aborting error, so the
/// results are always a prefix of the requested calls and at most one of the
/// three classification queries matches.
#[derive(Debug, Clone, Default)]
pub struct ProgramResult {
    pub call_results: Vec<CallResult>,
}

impl ProgramResult {
    pub fn new(call_results: Vec<CallResult>) -> Self {
        Self { call_results }
    }

    /// The executed `throw` call, if the run ended with one.
    pub fn throw_result(&self) -> Option<&CallResult> {
        self.call_results
            .iter()
            .find(|result| result.call.name == THROW_CALL && result.is_success())
    }

    /// The first call that failed with a non-redirect error.
    pub fn error_result(&self) -> Option<&CallResult> {
        self.call_results
            .iter()
            .find(|result| result.error.is_some() && !result.is_soft_redirect())
    }

    /// The error of [`Self::error_result`], when there is one.
    pub fn failure_error(&self) -> Option<&ActError> {
        self.error_result().and_then(|result| result.error.as_ref())
    }

    /// The executed `return` call, if the run ended with one.
    pub fn return_result(&self) -> Option<&CallResult> {
        self.call_results
            .iter()
            .find(|result| result.call.name == RETURN_CALL && result.is_success())
    }
}
