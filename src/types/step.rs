//! One round trip with the planning service.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::program::Program;
use crate::tools::Observation;

/// What the planning service was shown for one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInput {
    pub prompt: String,
    pub active_url: String,
    pub simplified_dom: String,
    pub screenshot_base64: String,
}

impl ModelInput {
    pub fn from_observation(prompt: impl Into<String>, observation: &Observation) -> Self {
        Self {
            prompt: prompt.into(),
            active_url: observation.active_url.clone(),
            simplified_dom: observation.simplified_dom.clone(),
            screenshot_base64: observation.screenshot_base64.clone(),
        }
    }
}

/// Why a plan response could not be decoded into a [`ModelOutput`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelOutputError {
    /// The response was well-formed but carried no plan: the model produced
    /// nothing executable.
    #[error("plan response contains no plan body")]
    MissingPlan,

    /// The response violated the plan-response shape.
    #[error("malformed plan response: {0}")]
    Malformed(String),
}

/// What the planning service answered for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Raw, possibly escape-encoded plan-document text.
    pub raw_plan: String,
    /// Server-assigned request id.
    pub request_id: String,
    /// Parsed plan document, ready for interpretation.
    pub plan_ast: Value,
}

impl ModelOutput {
    /// Decode the `planResponse` object of a step response.
    pub fn from_plan_response(plan_response: &Value) -> Result<Self, ModelOutputError> {
        let object = plan_response
            .as_object()
            .ok_or_else(|| ModelOutputError::Malformed("planResponse is not an object".into()))?;

        let raw_plan = match object.get("rawPlan") {
            None | Some(Value::Null) => return Err(ModelOutputError::MissingPlan),
            Some(Value::String(text)) if text.is_empty() => {
                return Err(ModelOutputError::MissingPlan)
            }
            Some(Value::String(text)) => text.clone(),
            Some(other) => {
                return Err(ModelOutputError::Malformed(format!(
                    "rawPlan has unexpected type: {other}"
                )))
            }
        };

        let plan_ast = object
            .get("planAst")
            .filter(|ast| ast.is_object())
            .cloned()
            .ok_or_else(|| ModelOutputError::Malformed("planAst missing or not an object".into()))?;

        let request_id = object
            .get("requestId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            raw_plan,
            request_id,
            plan_ast,
        })
    }
}

/// One completed planning round trip, immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub model_input: ModelInput,
    pub model_output: ModelOutput,
    /// Wall-clock instant the response was observed.
    pub observed_time: DateTime<Utc>,
    /// Time the round trip spent on the wire and in the service.
    pub server_latency: Duration,
    /// Server-side trace payload, when tracing was requested.
    pub trace: Option<Value>,
    /// The interpreted program, attached after successful interpretation.
    pub program: Option<Program>,
}

impl Step {
    pub fn new(
        model_input: ModelInput,
        model_output: ModelOutput,
        server_latency: Duration,
        trace: Option<Value>,
    ) -> Self {
        Self {
            model_input,
            model_output,
            observed_time: Utc::now(),
            server_latency,
            trace,
            program: None,
        }
    }

    pub fn with_program(mut self, program: Program) -> Self {
        self.program = Some(program);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_complete_plan_response() {
        let response = json!({
            "rawPlan": "click(\"search\");\nreturn \"ok\";",
            "requestId": "req-42",
            "planAst": {"statements": []},
        });
        let output = ModelOutput::from_plan_response(&response).expect("model output");
        assert_eq!(output.request_id, "req-42");
        assert!(output.raw_plan.contains("click"));
    }

    #[test]
    fn empty_plan_body_is_a_model_fault() {
        let response = json!({"rawPlan": "", "requestId": "r", "planAst": {}});
        assert_eq!(
            ModelOutput::from_plan_response(&response),
            Err(ModelOutputError::MissingPlan)
        );

        let absent = json!({"requestId": "r", "planAst": {}});
        assert_eq!(
            ModelOutput::from_plan_response(&absent),
            Err(ModelOutputError::MissingPlan)
        );
    }

    #[test]
    fn structural_violations_are_malformed() {
        assert!(matches!(
            ModelOutput::from_plan_response(&json!("not an object")),
            Err(ModelOutputError::Malformed(_))
        ));
        assert!(matches!(
            ModelOutput::from_plan_response(&json!({"rawPlan": 7, "planAst": {}})),
            Err(ModelOutputError::Malformed(_))
        ));
        assert!(matches!(
            ModelOutput::from_plan_response(&json!({"rawPlan": "x", "planAst": []})),
            Err(ModelOutputError::Malformed(_))
        ));
    }

    #[test]
    fn missing_request_id_is_tolerated() {
        let response = json!({"rawPlan": "return;", "planAst": {"statements": []}});
        let output = ModelOutput::from_plan_response(&response).expect("model output");
        assert!(output.request_id.is_empty());
    }
}
