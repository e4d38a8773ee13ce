//! Failure taxonomy for act dispatch.
//!
//! Every terminal failure of an act is one [`ActError`] kind. Protocol-level
//! kinds carry an [`ApiFailure`] payload with the raw server response and
//! request id so callers can escalate with support.

use std::fmt;

use thiserror::Error;

use crate::types::act::ActMetadata;

/// Structured payload for failures raised from the planning-service protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiFailure {
    /// HTTP status of the offending response, when one was received.
    pub status: Option<u16>,
    /// Human-readable message, from the server when it supplied one.
    pub message: Option<String>,
    /// Server-assigned request id for support escalation.
    pub request_id: Option<String>,
    /// Raw response body, kept verbatim for diagnosis.
    pub raw_response: Option<String>,
}

impl ApiFailure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_raw_response(mut self, raw_response: impl Into<String>) -> Self {
        self.raw_response = Some(raw_response.into());
        self
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        if let Some(message) = &self.message {
            write!(f, "{message}")?;
            wrote = true;
        }
        if let Some(status) = self.status {
            if wrote {
                write!(f, " ")?;
            }
            write!(f, "(status {status})")?;
            wrote = true;
        }
        if let Some(request_id) = &self.request_id {
            if wrote {
                write!(f, " ")?;
            }
            write!(f, "[request id: {request_id}]")?;
            wrote = true;
        }
        if !wrote {
            write!(f, "no further details")?;
        }
        Ok(())
    }
}

/// Errors emitted while dispatching an act.
///
/// The soft-redirect kinds ([`ActError::AgentRedirect`],
/// [`ActError::StateGuardrail`]) are recorded on call results and steer the
/// plan loop; every other kind terminates the act.
#[derive(Debug, Error, Clone)]
pub enum ActError {
    /// The step request was rejected as malformed by the planning service.
    #[error("bad request to planning service: {0}")]
    BadRequest(ApiFailure),

    /// The planning service response violated the wire contract.
    #[error("bad response from planning service: {0}")]
    BadResponse(ApiFailure),

    /// The model emitted a plan this client cannot execute.
    #[error("invalid model generation: {0}")]
    InvalidModelGeneration(ApiFailure),

    /// The planning service failed internally.
    #[error("planning service internal error: {0}")]
    InternalServerError(ApiFailure),

    /// The planning service refused the request on policy grounds.
    #[error("request rejected by service guardrails: {0}")]
    Guardrails(ApiFailure),

    /// The local state guardrail denied continuation after an observation.
    #[error("state guardrail denied action")]
    StateGuardrail,

    /// The planning service throttled the request.
    #[error("request throttled by planning service: {0}")]
    Throttled(ApiFailure),

    /// The daily request quota is exhausted.
    #[error("daily quota exceeded: {0}")]
    QuotaExceeded(ApiFailure),

    /// The act ran past its time budget (or the remote session expired).
    #[error("act timed out: {0}")]
    Timeout(String),

    /// The act was cancelled through the state controller.
    #[error("act was cancelled")]
    Canceled,

    /// The act ran past its step budget without returning.
    #[error("{0}")]
    ExceededMaxSteps(String),

    /// A capability failed while executing a call.
    #[error("actuation failed: {0}")]
    Actuation(String),

    /// The model issued an explicit `throw`.
    #[error("agent failed: {0}")]
    AgentFailed(String),

    /// An internal invariant was violated.
    #[error("execution invariant violated: {0}")]
    Execution(String),

    /// Credentials are missing, ambiguous, or rejected.
    #[error("authentication failed\n{0}")]
    Auth(String),

    /// Soft signal: abandon the current plan and ask the planner again.
    #[error("agent redirect: {0}")]
    AgentRedirect(String),

    /// A constructor-time configuration check failed.
    #[error("invalid configuration: {0}")]
    ValidationFailed(String),
}

impl ActError {
    /// Whether this error steers the plan loop instead of terminating it.
    pub fn is_soft_redirect(&self) -> bool {
        matches!(self, Self::AgentRedirect(_) | Self::StateGuardrail)
    }

    /// Helper for execution-invariant violations.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Helper for actuation failures.
    pub fn actuation(message: impl Into<String>) -> Self {
        Self::Actuation(message.into())
    }
}

/// Terminal failure of one act: the error plus the act's metadata snapshot.
///
/// Returned from [`crate::dispatcher::ActDispatcher::dispatch`] so callers
/// always receive the session/act identifiers and timings alongside the
/// failure, regardless of which layer raised it.
#[derive(Debug, Error, Clone)]
#[error("{error}")]
pub struct ActFailure {
    pub error: ActError,
    pub metadata: ActMetadata,
}

impl ActFailure {
    pub fn new(error: ActError, metadata: ActMetadata) -> Self {
        Self { error, metadata }
    }

    /// The failure kind, for callers that match on taxonomy only.
    pub fn kind(&self) -> &ActError {
        &self.error
    }
}
