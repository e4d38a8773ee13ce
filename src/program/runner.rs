//! Sequential program execution with per-call fault isolation.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::errors::{ActError, ApiFailure};
use crate::events::{AgentEvent, EventSink, LogLevel};
use crate::guardrail::{GuardrailDecision, GuardrailState, StateGuardrail};
use crate::program::{CallResult, CompiledProgram, ProgramResult};
use crate::tools::{Observation, ToolError, OBSERVATION_CALL};

/// Render a call's return value as user-facing text.
///
/// Strings pass through verbatim; everything else is pretty-printed JSON.
pub fn format_return_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Executes compiled programs against the capability set.
///
/// Failures of individual calls are trapped and recorded as data on the
/// [`CallResult`]; only the soft-redirect class lets execution continue.
pub struct ProgramRunner {
    events: Arc<dyn EventSink>,
    state_guardrail: Option<Arc<StateGuardrail>>,
}

impl ProgramRunner {
    pub fn new(events: Arc<dyn EventSink>, state_guardrail: Option<Arc<StateGuardrail>>) -> Self {
        Self {
            events,
            state_guardrail,
        }
    }

    /// Run a program.
    ///
    /// The returned results are a prefix of the requested calls: iteration
    /// stops at the first `return`/`throw` call or aborting error, and
    /// nothing after it executes.
    pub async fn run(&self, program: &CompiledProgram) -> ProgramResult {
        let mut call_results: Vec<CallResult> = Vec::new();

        for call in &program.calls {
            let mut return_value = Value::Null;
            let mut error: Option<ActError> = None;

            match call.target.invoke(&call.source.kwargs).await {
                Ok(value) => {
                    return_value = value;
                    error = self.check_state_guardrail(&call.source.name, &return_value);
                    if error.is_none() {
                        self.events.emit(AgentEvent::action(
                            call.source.name.clone(),
                            Value::Object(call.source.kwargs.clone()),
                            return_value.clone(),
                        ));
                    }
                }
                Err(ToolError::Redirect(correction)) => {
                    error = Some(ActError::AgentRedirect(correction));
                }
                Err(ToolError::InvalidArguments(message)) => {
                    error = Some(ActError::InvalidModelGeneration(ApiFailure::message(
                        message,
                    )));
                }
                Err(ToolError::Failure(cause)) => {
                    self.events.emit(AgentEvent::log(
                        LogLevel::Error,
                        format!("{}: {cause:#}", call.source.name),
                    ));
                    error = Some(ActError::actuation(format!("{cause:#}")));
                }
            }

            let aborting = error
                .as_ref()
                .map(|err| !err.is_soft_redirect())
                .unwrap_or(false);
            let terminal = call.source.is_terminal();

            call_results.push(CallResult {
                call: call.source.clone(),
                return_value,
                error,
            });

            if terminal || aborting {
                break;
            }
        }

        ProgramResult::new(call_results)
    }

    fn check_state_guardrail(&self, call_name: &str, return_value: &Value) -> Option<ActError> {
        if call_name != OBSERVATION_CALL {
            return None;
        }
        let guardrail = self.state_guardrail.as_ref()?;
        let observation = Observation::from_value(return_value)?;
        let state = GuardrailState::new(observation.active_url);
        if guardrail(&state) == GuardrailDecision::Block {
            debug!(url = %state.observed_url, "state guardrail denied action");
            return Some(ActError::StateGuardrail);
        }
        None
    }
}
