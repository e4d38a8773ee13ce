//! Step wire contract: request/response shapes, decoding, and the
//! error-code taxonomy of the planning service.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ActError, ApiFailure};
use crate::program::CallResult;
use crate::tools::{Observation, ToolRegistry, OBSERVATION_CALL};
use crate::types::act::Act;
use crate::types::step::{ModelInput, ModelOutput, ModelOutputError, Step};

pub const DEFAULT_REQUEST_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";

/// Complete step request sent to the planning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    pub enable_trace: bool,
    pub task_id: String,
    pub session_id: String,
    pub plan_input: PlanInput,
}

/// Container for the plan request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInput {
    #[serde(rename = "planRequest")]
    pub plan_request: PlanRequest,
}

/// What the planner needs to produce the next plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub prompt: String,
    pub active_url: String,
    pub simplified_dom: String,
    pub screenshot_base64: String,
    /// Error context from the previous step's execution, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_executing_previous_step: Option<String>,
    /// Number of steps already recorded on the act.
    pub step_count: usize,
    /// Action vocabulary the client can execute.
    pub actions: Vec<String>,
}

/// Build the step request for one round trip.
pub fn build_step_request(
    act: &Act,
    observation: &Observation,
    previous_error: Option<String>,
    tools: &ToolRegistry,
    enable_trace: bool,
) -> StepRequest {
    StepRequest {
        enable_trace,
        task_id: act.id.0.clone(),
        session_id: act.session_id.0.clone(),
        plan_input: PlanInput {
            plan_request: PlanRequest {
                prompt: act.prompt.clone(),
                active_url: observation.active_url.clone(),
                simplified_dom: observation.simplified_dom.clone(),
                screenshot_base64: observation.screenshot_base64.clone(),
                error_executing_previous_step: previous_error,
                step_count: act.num_steps(),
                actions: tools.names(),
            },
        },
    }
}

/// Pull the most recent observation and any propagated error out of the
/// previous run's call results.
///
/// The trailer calls guarantee every run ends with an observation, so a
/// missing one is an execution invariant violation, not a protocol error.
pub fn extract_step_context(
    call_results: &[CallResult],
) -> Result<(Observation, Option<String>), ActError> {
    let mut observation: Option<Observation> = None;
    let mut previous_error: Option<String> = None;

    for result in call_results {
        if result.call.name == OBSERVATION_CALL {
            if let Some(decoded) = Observation::from_value(&result.return_value) {
                observation = Some(decoded);
            }
        }
        if let Some(error) = &result.error {
            previous_error = Some(error.to_string());
        }
    }

    let observation = observation
        .ok_or_else(|| ActError::execution("no observation found in prior call results"))?;
    Ok((observation, previous_error))
}

/// Decode one step response into a [`Step`], or the mapped failure.
///
/// Status 200 with a well-formed `planOutput.planResponse` is the only
/// success path; every other shape maps to a typed failure and is never
/// silently ignored.
pub fn decode_step_response(
    step_url: &str,
    status: u16,
    body: &str,
    model_input: ModelInput,
    server_latency: Duration,
    auth_warning: &str,
) -> Result<Step, ActError> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(_) => {
            return Err(ActError::BadResponse(
                ApiFailure::message(format!("response from {step_url} is not valid JSON"))
                    .with_status(status)
                    .with_raw_response(body.to_string()),
            ))
        }
    };

    if status == 200 {
        let plan_response = json
            .get("planOutput")
            .and_then(|output| output.get("planResponse"))
            .ok_or_else(|| {
                ActError::BadResponse(
                    ApiFailure::message(format!(
                        "response from {step_url} missing planOutput..planResponse"
                    ))
                    .with_status(status)
                    .with_raw_response(body.to_string()),
                )
            })?;

        let model_output = ModelOutput::from_plan_response(plan_response).map_err(
            |error| match error {
                ModelOutputError::MissingPlan => ActError::InvalidModelGeneration(
                    ApiFailure::message("plan response contains no plan body")
                        .with_status(status)
                        .with_raw_response(body.to_string()),
                ),
                ModelOutputError::Malformed(message) => ActError::BadResponse(
                    ApiFailure::message(format!("bad response from {step_url}: {message}"))
                        .with_status(status)
                        .with_raw_response(body.to_string()),
                ),
            },
        )?;

        let trace = json.get("trace").filter(|trace| !trace.is_null()).cloned();
        return Ok(Step::new(model_input, model_output, server_latency, trace));
    }

    let Some(code) = json
        .get("error")
        .and_then(|error| error.get("code"))
        .and_then(Value::as_str)
    else {
        return Err(ActError::BadResponse(
            ApiFailure::message(format!("response from {step_url} missing error code"))
                .with_status(status)
                .with_raw_response(body.to_string()),
        ));
    };

    let message = json["error"]
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);

    let failure = ApiFailure {
        status: Some(status),
        message,
        request_id: None,
        raw_response: Some(body.to_string()),
    };

    Err(match code {
        "INVALID_INPUT" => ActError::BadRequest(failure),
        "MODEL_ERROR" => ActError::InvalidModelGeneration(failure),
        "INTERNAL_ERROR" => ActError::InternalServerError(failure),
        "GUARDRAILS_ERROR" => ActError::Guardrails(failure),
        "UNAUTHORIZED_ERROR" => ActError::Auth(auth_warning.to_string()),
        "TOO_MANY_REQUESTS" => ActError::Throttled(failure),
        "DAILY_QUOTA_LIMIT_ERROR" => ActError::QuotaExceeded(failure),
        "SESSION_EXPIRED_ERROR" => {
            ActError::Timeout(format!("session expired in planning backend: {body}"))
        }
        other => ActError::BadResponse(
            ApiFailure::message(format!(
                "response from {step_url} contains unknown error code: {other}"
            ))
            .with_status(status)
            .with_raw_response(body.to_string()),
        ),
    })
}

/// Prepared request body plus the model-input snapshot it was built from.
pub(crate) struct PreparedStep {
    pub body: String,
    pub model_input: ModelInput,
}

/// Shared HTTP plumbing of the step protocol, auth-agnostic.
#[derive(Debug)]
pub(crate) struct StepClient {
    client: reqwest::Client,
    step_url: String,
    enable_trace: bool,
}

impl StepClient {
    pub fn new(api_url: &str, enable_trace: bool) -> Result<Self, ActError> {
        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_REQUEST_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_READ_TIMEOUT)
            .build()
            .map_err(|error| {
                ActError::ValidationFailed(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            client,
            step_url: format!("{}/agent/invoke", api_url.trim_end_matches('/')),
            enable_trace,
        })
    }

    pub fn step_url(&self) -> &str {
        &self.step_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Build the request body and model-input snapshot for one step.
    pub fn prepare(
        &self,
        act: &Act,
        call_results: &[CallResult],
        tools: &ToolRegistry,
    ) -> Result<PreparedStep, ActError> {
        let (observation, previous_error) = extract_step_context(call_results)?;
        let request =
            build_step_request(act, &observation, previous_error, tools, self.enable_trace);
        let body = serde_json::to_string(&request)
            .map_err(|error| ActError::execution(format!("failed to encode step request: {error}")))?;
        Ok(PreparedStep {
            body,
            model_input: ModelInput::from_observation(&act.prompt, &observation),
        })
    }

    /// POST the prepared body with the given headers and decode the response.
    pub async fn send(
        &self,
        prepared: PreparedStep,
        headers: Vec<(String, String)>,
        auth_warning: &str,
    ) -> Result<Step, ActError> {
        let started = Instant::now();

        let mut request = self.client.post(&self.step_url).body(prepared.body);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|error| {
            ActError::BadResponse(ApiFailure::message(format!(
                "step request to {} failed: {error}",
                self.step_url
            )))
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| {
            ActError::BadResponse(
                ApiFailure::message(format!(
                    "failed reading response from {}: {error}",
                    self.step_url
                ))
                .with_status(status),
            )
        })?;
        let latency = started.elapsed();

        decode_step_response(
            &self.step_url,
            status,
            &body,
            prepared.model_input,
            latency,
            auth_warning,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActConfig;
    use crate::errors::ActError;
    use crate::program::Call;
    use crate::types::act::{ActId, SessionId};
    use serde_json::json;

    fn model_input() -> ModelInput {
        ModelInput {
            prompt: "buy socks".into(),
            active_url: "https://shop.example".into(),
            simplified_dom: "<main/>".into(),
            screenshot_base64: String::new(),
        }
    }

    fn decode(status: u16, body: &str) -> Result<Step, ActError> {
        decode_step_response(
            "https://api.test/agent/invoke",
            status,
            body,
            model_input(),
            Duration::from_millis(10),
            "auth warning",
        )
    }

    #[test]
    fn success_response_decodes_into_step() {
        let body = json!({
            "planOutput": {"planResponse": {
                "rawPlan": "return \\\"done\\\";",
                "requestId": "req-1",
                "planAst": {"statements": [{"kind": "return", "value": "done"}]},
            }},
            "trace": {"spans": []},
        })
        .to_string();

        let step = decode(200, &body).expect("step");
        assert_eq!(step.model_output.request_id, "req-1");
        assert!(step.trace.is_some());
        assert!(step.program.is_none());
    }

    #[test]
    fn every_error_code_maps_to_its_failure_kind() {
        let cases: Vec<(&str, fn(&ActError) -> bool)> = vec![
            ("INVALID_INPUT", |e| matches!(e, ActError::BadRequest(_))),
            ("MODEL_ERROR", |e| {
                matches!(e, ActError::InvalidModelGeneration(_))
            }),
            ("INTERNAL_ERROR", |e| {
                matches!(e, ActError::InternalServerError(_))
            }),
            ("GUARDRAILS_ERROR", |e| matches!(e, ActError::Guardrails(_))),
            ("UNAUTHORIZED_ERROR", |e| matches!(e, ActError::Auth(_))),
            ("TOO_MANY_REQUESTS", |e| matches!(e, ActError::Throttled(_))),
            ("DAILY_QUOTA_LIMIT_ERROR", |e| {
                matches!(e, ActError::QuotaExceeded(_))
            }),
            ("SESSION_EXPIRED_ERROR", |e| matches!(e, ActError::Timeout(_))),
        ];

        for (code, matches_kind) in cases {
            let body = json!({"error": {"code": code, "message": "m"}}).to_string();
            let error = decode(400, &body).expect_err("failure");
            assert!(matches_kind(&error), "code {code} mapped to {error:?}");
        }
    }

    #[test]
    fn unknown_code_and_missing_code_are_bad_responses() {
        let unknown = json!({"error": {"code": "FLUX_CAPACITOR"}}).to_string();
        assert!(matches!(
            decode(500, &unknown),
            Err(ActError::BadResponse(_))
        ));

        let missing = json!({"error": {"message": "no code"}}).to_string();
        assert!(matches!(
            decode(500, &missing),
            Err(ActError::BadResponse(_))
        ));

        let empty = json!({}).to_string();
        assert!(matches!(decode(500, &empty), Err(ActError::BadResponse(_))));
    }

    #[test]
    fn non_json_body_is_a_bad_response_at_any_status() {
        assert!(matches!(
            decode(200, "<html>gateway error</html>"),
            Err(ActError::BadResponse(_))
        ));
        assert!(matches!(
            decode(502, "<html>gateway error</html>"),
            Err(ActError::BadResponse(_))
        ));
    }

    #[test]
    fn missing_plan_response_is_a_bad_response() {
        let body = json!({"planOutput": {}}).to_string();
        let error = decode(200, &body).expect_err("failure");
        match error {
            ActError::BadResponse(failure) => {
                assert!(failure.message.unwrap().contains("planResponse"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_plan_body_at_200_is_a_model_fault() {
        let body = json!({
            "planOutput": {"planResponse": {"rawPlan": "", "planAst": {}}},
        })
        .to_string();
        assert!(matches!(
            decode(200, &body),
            Err(ActError::InvalidModelGeneration(_))
        ));
    }

    #[test]
    fn throttled_carries_status_and_raw_response() {
        let body = json!({"error": {"code": "TOO_MANY_REQUESTS"}}).to_string();
        match decode(429, &body).expect_err("failure") {
            ActError::Throttled(failure) => {
                assert_eq!(failure.status, Some(429));
                assert!(failure.raw_response.unwrap().contains("TOO_MANY_REQUESTS"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn step_context_takes_latest_observation_and_error() {
        let observation = |url: &str| {
            json!({"activeURL": url, "simplifiedDOM": "", "screenshotBase64": ""})
        };

        let results = vec![
            CallResult {
                call: Call::new("o1", OBSERVATION_CALL),
                return_value: observation("https://first.example"),
                error: None,
            },
            CallResult {
                call: Call::new("c", "click"),
                return_value: Value::Null,
                error: Some(ActError::AgentRedirect("try the menu".into())),
            },
            CallResult {
                call: Call::new("o2", OBSERVATION_CALL),
                return_value: observation("https://second.example"),
                error: None,
            },
        ];

        let (observation, error) = extract_step_context(&results).expect("context");
        assert_eq!(observation.active_url, "https://second.example");
        assert!(error.unwrap().contains("try the menu"));
    }

    #[test]
    fn missing_observation_is_an_execution_error() {
        let results = vec![CallResult {
            call: Call::new("c", "click"),
            return_value: Value::Null,
            error: None,
        }];
        assert!(matches!(
            extract_step_context(&results),
            Err(ActError::Execution(_))
        ));
    }

    #[test]
    fn request_serializes_with_wire_field_names() {
        let act = Act::new(
            ActId("act-1".into()),
            SessionId("session-1".into()),
            "compare prices",
            &ActConfig::default(),
        );
        let observation = Observation {
            active_url: "https://shop.example".into(),
            simplified_dom: "<main/>".into(),
            screenshot_base64: "abc".into(),
        };
        let registry = crate::tools::ToolRegistry::with_terminals();
        let request = build_step_request(&act, &observation, None, &registry, true);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["enableTrace"], json!(true));
        assert_eq!(value["taskId"], json!("act-1"));
        assert_eq!(value["sessionId"], json!("session-1"));
        let plan_request = &value["planInput"]["planRequest"];
        assert_eq!(plan_request["prompt"], json!("compare prices"));
        assert_eq!(plan_request["activeUrl"], json!("https://shop.example"));
        assert!(plan_request
            .get("errorExecutingPreviousStep")
            .is_none());
        assert!(plan_request["actions"]
            .as_array()
            .unwrap()
            .contains(&json!("return")));
    }
}
