//! Runtime state guardrail.
//!
//! An optional caller-supplied policy check evaluated after every successful
//! observation. A BLOCK decision is recorded on the observation's call result
//! and steers the planner; it is never raised out of the runner directly.

use serde::{Deserialize, Serialize};

/// Decision returned by a state guardrail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailDecision {
    Allow,
    Block,
}

/// State presented to the guardrail: where the agent currently is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailState {
    pub observed_url: String,
}

impl GuardrailState {
    pub fn new(observed_url: impl Into<String>) -> Self {
        Self {
            observed_url: observed_url.into(),
        }
    }
}

/// Synchronous policy hook from observed state to a decision.
pub type StateGuardrail = dyn Fn(&GuardrailState) -> GuardrailDecision + Send + Sync;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn guardrail_closures_compose() {
        let guardrail: Arc<StateGuardrail> = Arc::new(|state| {
            if state.observed_url.contains("forbidden") {
                GuardrailDecision::Block
            } else {
                GuardrailDecision::Allow
            }
        });

        assert_eq!(
            guardrail(&GuardrailState::new("https://ok.example")),
            GuardrailDecision::Allow
        );
        assert_eq!(
            guardrail(&GuardrailState::new("https://forbidden.example")),
            GuardrailDecision::Block
        );
    }
}
