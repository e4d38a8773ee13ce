//! The act: one bounded natural-language automation request.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ActConfig;
use crate::types::step::Step;

/// Opaque act identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActId(pub String);

impl ActId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque session identifier shared by the acts of one browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutable record of one automation request.
///
/// Created by the caller, mutated only by the dispatcher. `end_time` is set
/// exactly once, on every exit path.
#[derive(Debug, Clone)]
pub struct Act {
    pub id: ActId,
    pub session_id: SessionId,
    pub prompt: String,
    pub timeout: Duration,
    pub max_steps: u32,
    pub observation_delay: Option<Duration>,
    steps: Vec<Step>,
    result: Option<String>,
    did_timeout: bool,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl Act {
    pub fn new(
        id: ActId,
        session_id: SessionId,
        prompt: impl Into<String>,
        config: &ActConfig,
    ) -> Self {
        Self {
            id,
            session_id,
            prompt: prompt.into(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_steps: config.max_steps,
            observation_delay: config.observation_delay_ms.map(Duration::from_millis),
            steps: Vec::new(),
            result: None,
            did_timeout: false,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn did_timeout(&self) -> bool {
        self.did_timeout
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Snapshot of identifiers and timings, attached to results and failures.
    pub fn metadata(&self) -> ActMetadata {
        ActMetadata {
            act_id: self.id.clone(),
            session_id: self.session_id.clone(),
            prompt: self.prompt.clone(),
            num_steps: self.steps.len(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    pub(crate) fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub(crate) fn last_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.last_mut()
    }

    pub(crate) fn complete(&mut self, result: Option<String>) {
        self.result = result;
    }

    pub(crate) fn mark_timed_out(&mut self) {
        self.did_timeout = true;
    }

    /// Set the end time if not already set. Idempotent.
    pub(crate) fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }
}

/// Snapshot of an act's identifiers and timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActMetadata {
    pub act_id: ActId,
    pub session_id: SessionId,
    pub prompt: String,
    pub num_steps: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl fmt::Display for ActMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "act={} session={} steps={} prompt={:?}",
            self.act_id, self.session_id, self.num_steps, self.prompt
        )
    }
}

/// Successful outcome of a dispatched act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActResult {
    /// The value the model returned, formatted as text.
    pub response: String,
    pub metadata: ActMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_act() -> Act {
        Act::new(
            ActId::new(),
            SessionId::new(),
            "find the cheapest flight",
            &ActConfig::default(),
        )
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ActId::new(), ActId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn finish_is_idempotent() {
        let mut act = test_act();
        assert!(act.end_time().is_none());
        act.finish();
        let first = act.end_time().expect("end time");
        act.finish();
        assert_eq!(act.end_time(), Some(first));
        assert!(first >= act.start_time());
    }

    #[test]
    fn metadata_reflects_progress() {
        let mut act = test_act();
        act.complete(Some("booked".into()));
        let metadata = act.metadata();
        assert_eq!(metadata.num_steps, 0);
        assert_eq!(act.result(), Some("booked"));
        assert!(metadata.to_string().contains("cheapest flight"));
    }
}
