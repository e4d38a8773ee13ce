//! The act dispatcher: owns one act's lifecycle from first observation to
//! terminal result.
//!
//! ```text
//! run initial program (settle + observe)
//! deadline = now + timeout
//! loop:
//!     check deadline, check step budget
//!     step = backend.step(prior call results)
//!     poll pause/cancel
//!     program = interpret(step) + trailer calls
//!     run program; classify throw / error / return
//! ```
//!
//! Budgets are strict: the dispatcher never issues more than `max_steps`
//! step requests and never initiates one past the deadline. Pause and cancel
//! are polled between steps only; an in-flight request is never interrupted.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::DispatcherConfig;
use crate::controller::{ControlState, StateController};
use crate::errors::{ActError, ActFailure};
use crate::events::{AgentEvent, EventSink, LogLevel};
use crate::guardrail::StateGuardrail;
use crate::program::runner::{format_return_value, ProgramRunner};
use crate::program::{interpret, Call, Program, ProgramResult};
use crate::tools::{
    ToolRegistry, OBSERVATION_CALL, SETTLE_CALL, WAIT_CALL,
};
use crate::types::act::{Act, ActResult};
use crate::types::step::ModelOutput;
use crate::util::decode::decode_plan_body;
use crate::util::logging::session_prefix;

/// Top-level orchestrator for dispatching acts.
///
/// One dispatcher serves one act at a time; run concurrent acts on separate
/// dispatcher instances sharing the backend read-only.
pub struct ActDispatcher {
    backend: Arc<dyn Backend>,
    tools: ToolRegistry,
    controller: Arc<StateController>,
    events: Arc<dyn EventSink>,
    runner: ProgramRunner,
    config: DispatcherConfig,
}

impl ActDispatcher {
    /// Build a dispatcher over a validated capability set.
    ///
    /// Fails when the registry is missing any required capability, so name
    /// resolution can never fail later than here for the engine's own calls.
    pub fn new(
        backend: Arc<dyn Backend>,
        tools: ToolRegistry,
        controller: Arc<StateController>,
        events: Arc<dyn EventSink>,
        state_guardrail: Option<Arc<StateGuardrail>>,
        config: DispatcherConfig,
    ) -> Result<Self, ActError> {
        let missing = tools.missing_capabilities();
        if !missing.is_empty() {
            return Err(ActError::ValidationFailed(format!(
                "capability set is missing required actions: {}",
                missing.join(", ")
            )));
        }
        let runner = ProgramRunner::new(events.clone(), state_guardrail);
        Ok(Self {
            backend,
            tools,
            controller,
            events,
            runner,
            config,
        })
    }

    /// Dispatch one act to completion.
    ///
    /// Always finalises the act: the end time is set on every exit path and
    /// failures carry the act's metadata snapshot.
    pub async fn dispatch(&self, act: &mut Act) -> Result<ActResult, ActFailure> {
        let outcome = self.dispatch_inner(act).await;
        act.finish();

        match outcome {
            Ok(response) => {
                self.events.emit(AgentEvent::action(
                    "result",
                    Value::Null,
                    Value::String(response.clone()),
                ));
                Ok(ActResult {
                    response,
                    metadata: act.metadata(),
                })
            }
            Err(error) => Err(ActFailure::new(error, act.metadata())),
        }
    }

    async fn dispatch_inner(&self, act: &mut Act) -> Result<String, ActError> {
        // Capture a first observation so the very first step request has
        // fresh state to plan from.
        let initial = initial_program(act);
        let compiled = initial.compile(&self.tools)?;
        let mut program_result = self.runner.run(&compiled).await;
        if let Some(error) = program_result.failure_error() {
            return Err(error.clone());
        }

        let deadline = Instant::now() + act.timeout;
        let mut step_idx: u32 = 0;

        loop {
            if Instant::now() >= deadline {
                act.mark_timed_out();
                return Err(ActError::Timeout(format!(
                    "act exceeded its {:?} budget",
                    act.timeout
                )));
            }

            if step_idx >= act.max_steps {
                return Err(ActError::ExceededMaxSteps(format!(
                    "exceeded max steps {} without return",
                    act.max_steps
                )));
            }

            let step = self
                .backend
                .step(act, &program_result.call_results, &self.tools)
                .await?;
            let model_output = step.model_output.clone();
            debug!(
                "{}{}",
                session_prefix(&act.session_id),
                decode_plan_body(&model_output.raw_plan)
            );
            act.add_step(step);

            // Pause holds the loop here; the request above is never
            // interrupted. Latency bound is one poll interval (~100ms).
            while self.controller.state() == ControlState::Paused {
                tokio::time::sleep(self.config.poll_interval()).await;
            }
            if self.controller.state() == ControlState::Cancelled {
                info!("{}terminating agent workflow", session_prefix(&act.session_id));
                self.events.emit(AgentEvent::log(
                    LogLevel::Info,
                    "Terminating agent workflow",
                ));
                return Err(ActError::Canceled);
            }

            match self.plan_and_run(act, &model_output).await {
                Ok(result) => program_result = result,
                Err(error) if error.is_soft_redirect() => {
                    // The plan was abandoned in favour of re-planning; keep
                    // the previous result as the basis for classification.
                    warn!("agent redirect surfaced from plan execution: {error}");
                    self.events
                        .emit(AgentEvent::log(LogLevel::Info, error.to_string()));
                }
                Err(error) => return Err(error),
            }

            if let Some(returned) = program_result.return_result() {
                let response = if returned.return_value.is_null() {
                    None
                } else {
                    Some(format_return_value(&returned.return_value))
                };
                act.complete(response);
                break;
            }

            step_idx += 1;
        }

        match act.result() {
            Some(response) => Ok(response.to_string()),
            None => Err(ActError::execution("act completed without a result")),
        }
    }

    /// Interpret one plan, attach the trailer calls, compile and run it, and
    /// classify throw/error outcomes.
    async fn plan_and_run(
        &self,
        act: &mut Act,
        model_output: &ModelOutput,
    ) -> Result<ProgramResult, ActError> {
        let interpreted = interpret(&model_output.plan_ast, &self.tools).map_err(|error| {
            error.into_act_error(&model_output.request_id, &model_output.raw_plan)
        })?;
        let program = with_trailer_calls(interpreted, act);
        if let Some(step) = act.last_step_mut() {
            step.program = Some(program.clone());
        }

        let compiled = program.compile(&self.tools)?;
        let result = self.runner.run(&compiled).await;

        if let Some(thrown) = result.throw_result() {
            return Err(ActError::AgentFailed(format_return_value(
                &thrown.return_value,
            )));
        }
        if let Some(error) = result.failure_error() {
            return Err(error.clone());
        }
        Ok(result)
    }
}

/// The program run before the loop starts: optional settle delay, wait for
/// the page, take one observation.
fn initial_program(act: &Act) -> Program {
    let mut calls = Vec::new();
    if let Some(delay) = act.observation_delay {
        calls.push(
            Call::new(WAIT_CALL, WAIT_CALL).kwarg("seconds", json!(delay.as_secs_f64())),
        );
    }
    calls.push(Call::new(SETTLE_CALL, SETTLE_CALL));
    calls.push(Call::new(OBSERVATION_CALL, OBSERVATION_CALL));
    Program::new(calls)
}

/// Append the fixed trailer to an interpreted program so fresh state is
/// always captured after the model's actions.
fn with_trailer_calls(mut program: Program, act: &Act) -> Program {
    if let Some(delay) = act.observation_delay {
        program.calls.push(
            Call::new("wait-trailer", WAIT_CALL).kwarg("seconds", json!(delay.as_secs_f64())),
        );
    }
    program.calls.push(Call::new("settle-trailer", SETTLE_CALL));
    program
        .calls
        .push(Call::new("observe-trailer", OBSERVATION_CALL));
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActConfig;
    use crate::types::act::{ActId, SessionId};
    use std::time::Duration;

    fn act_with_delay(delay: Option<Duration>) -> Act {
        let mut config = ActConfig::default();
        if let Some(delay) = delay {
            config = config.observation_delay(delay);
        }
        Act::new(ActId::new(), SessionId::new(), "goal", &config)
    }

    #[test]
    fn initial_program_has_settle_then_observe() {
        let program = initial_program(&act_with_delay(None));
        let names: Vec<&str> = program.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![SETTLE_CALL, OBSERVATION_CALL]);
    }

    #[test]
    fn observation_delay_prepends_a_wait() {
        let program = initial_program(&act_with_delay(Some(Duration::from_millis(1500))));
        assert_eq!(program.calls[0].name, WAIT_CALL);
        assert_eq!(program.calls[0].kwargs["seconds"], json!(1.5));
    }

    #[test]
    fn trailer_is_appended_after_model_calls() {
        let base = Program::new(vec![Call::new("c-0", "click")]);
        let program = with_trailer_calls(base, &act_with_delay(None));
        let names: Vec<&str> = program.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["click", SETTLE_CALL, OBSERVATION_CALL]);
    }

    #[test]
    fn trailer_includes_wait_when_delay_configured() {
        let base = Program::new(vec![]);
        let program = with_trailer_calls(base, &act_with_delay(Some(Duration::from_secs(2))));
        let names: Vec<&str> = program.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![WAIT_CALL, SETTLE_CALL, OBSERVATION_CALL]);
    }
}
