//! Configuration for acts and the dispatcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Budgets applied to a single act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActConfig {
    /// Wall-clock budget for the whole act in milliseconds.
    /// Default: 300000 (5 minutes)
    pub timeout_ms: u64,

    /// Maximum number of planning steps before the act fails.
    /// Default: 30
    pub max_steps: u32,

    /// Extra delay before every observation, for pages that render late.
    /// Default: none
    pub observation_delay_ms: Option<u64>,
}

impl Default for ActConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 300_000,
            max_steps: 30,
            observation_delay_ms: None,
        }
    }
}

impl ActConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the act timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder: set the step budget.
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: set the pre-observation delay.
    pub fn observation_delay(mut self, delay: Duration) -> Self {
        self.observation_delay_ms = Some(delay.as_millis() as u64);
        self
    }
}

/// Knobs of the dispatch loop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Interval between control-state polls while paused, in milliseconds.
    ///
    /// This bounds pause/cancel latency at loop boundaries: a pause takes
    /// effect within one poll interval once the in-flight step completes.
    /// Default: 100
    pub pause_poll_interval_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pause_poll_interval_ms: 100,
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the pause poll interval.
    pub fn pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn act_defaults() {
        let config = ActConfig::default();
        assert_eq!(config.timeout_ms, 300_000);
        assert_eq!(config.max_steps, 30);
        assert!(config.observation_delay_ms.is_none());
    }

    #[test]
    fn act_builder() {
        let config = ActConfig::new()
            .timeout(Duration::from_secs(10))
            .max_steps(3)
            .observation_delay(Duration::from_millis(250));
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.max_steps, 3);
        assert_eq!(config.observation_delay_ms, Some(250));
    }

    #[test]
    fn dispatcher_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.pause_poll_interval_ms, 100);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }
}
