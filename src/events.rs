//! Observability events emitted by the runner and dispatcher.
//!
//! Sinks are fire-and-forget: emitting must never block the dispatch loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Structured event describing one action execution or one log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    Action {
        name: String,
        arguments: Value,
        data: Value,
    },
    Log {
        level: LogLevel,
        message: String,
    },
}

impl AgentEvent {
    pub fn action(name: impl Into<String>, arguments: Value, data: Value) -> Self {
        Self::Action {
            name: name.into(),
            arguments,
            data,
        }
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }
}

/// Destination for agent events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AgentEvent) {}
}

/// In-memory broadcast sink suitable for tests and embedding.
///
/// Events are fanned out to every live subscriber; with no subscribers they
/// are silently dropped, preserving the fire-and-forget contract.
pub struct BroadcastSink {
    sender: broadcast::Sender<AgentEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: AgentEvent) {
        let _ = self.sender.send(event);
    }
}
