//! Capability contract between the engine and the actuator.
//!
//! The actuator (a browser driver, in production) exposes its actions as
//! named [`Tool`]s collected in a [`ToolRegistry`]. The registry is a closed
//! lookup table: it is built once, validated at dispatcher construction, and
//! program compilation fails loudly on any name it cannot resolve.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Named arguments of a single call.
pub type ToolArgs = serde_json::Map<String, Value>;

/// Call name that captures the current environment state.
pub const OBSERVATION_CALL: &str = "takeObservation";
/// Call name that waits for the page to reach a settled state.
pub const SETTLE_CALL: &str = "waitForPageToSettle";
/// Call name that sleeps for a given number of seconds.
pub const WAIT_CALL: &str = "wait";
/// Terminal call carrying the act's result.
pub const RETURN_CALL: &str = "return";
/// Terminal call carrying an explicit model-issued failure.
pub const THROW_CALL: &str = "throw";

/// Capabilities every registry must resolve before dispatch can start.
pub const REQUIRED_CAPABILITIES: &[&str] = &[
    OBSERVATION_CALL,
    SETTLE_CALL,
    WAIT_CALL,
    RETURN_CALL,
    THROW_CALL,
];

/// Failure of a single capability invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Soft signal: the actuator wants the planner to try something else.
    #[error("agent redirect: {0}")]
    Redirect(String),

    /// The supplied arguments do not fit this capability.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Any other actuation failure.
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

/// One named action the actuator can perform.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Execute the action. The returned value must be JSON-compatible.
    async fn invoke(&self, args: &ToolArgs) -> Result<Value, ToolError>;
}

/// Closed name-to-executable lookup table.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in `return`/`throw` terminals.
    pub fn with_terminals() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TerminalTool::new(RETURN_CALL)));
        registry.register(Arc::new(TerminalTool::new(THROW_CALL)));
        registry
    }

    /// Register a tool under its own name. Last registration wins.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted action vocabulary, advertised to the planning service.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Required capabilities this registry does not resolve.
    pub fn missing_capabilities(&self) -> Vec<&'static str> {
        REQUIRED_CAPABILITIES
            .iter()
            .copied()
            .filter(|name| !self.contains(name))
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Built-in `return`/`throw` tool: hands its `value` argument back verbatim.
///
/// The runner and dispatcher give these names their terminal semantics; the
/// tool itself only surfaces the payload.
#[derive(Debug)]
struct TerminalTool {
    name: &'static str,
}

impl TerminalTool {
    fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &str {
        self.name
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        Ok(args.get("value").cloned().unwrap_or(Value::Null))
    }
}

/// Environment snapshot produced by the `takeObservation` capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "activeURL")]
    pub active_url: String,

    #[serde(rename = "simplifiedDOM", default)]
    pub simplified_dom: String,

    #[serde(rename = "screenshotBase64", default)]
    pub screenshot_base64: String,
}

impl Observation {
    /// Decode an observation from a capability return value, if it is one.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn terminal_tools_echo_their_value() {
        let registry = ToolRegistry::with_terminals();
        let ret = registry.get(RETURN_CALL).expect("return tool");

        let mut args = ToolArgs::new();
        args.insert("value".into(), json!("done"));
        assert_eq!(block_on(ret.invoke(&args)).unwrap(), json!("done"));

        let empty = ToolArgs::new();
        assert_eq!(block_on(ret.invoke(&empty)).unwrap(), Value::Null);
    }

    #[test]
    fn missing_capabilities_reported() {
        let registry = ToolRegistry::with_terminals();
        let missing = registry.missing_capabilities();
        assert!(missing.contains(&OBSERVATION_CALL));
        assert!(missing.contains(&SETTLE_CALL));
        assert!(missing.contains(&WAIT_CALL));
        assert!(!missing.contains(&RETURN_CALL));
    }

    #[test]
    fn observation_decodes_from_value() {
        let value = json!({
            "activeURL": "https://example.com",
            "simplifiedDOM": "<main/>",
            "screenshotBase64": "",
        });
        let observation = Observation::from_value(&value).expect("observation");
        assert_eq!(observation.active_url, "https://example.com");

        assert!(Observation::from_value(&json!({"other": true})).is_none());
        assert!(Observation::from_value(&Value::Null).is_none());
    }

    #[test]
    fn names_are_sorted() {
        let registry = ToolRegistry::with_terminals();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
