//! Plan-document interpretation.
//!
//! Pure translation of the planning service's statement tree into an ordered
//! call list, validated against the capability vocabulary. The two failure
//! classes stay distinguishable end to end: a document that is not a valid
//! statement tree is the server's fault, a document that names actions or
//! argument shapes outside the vocabulary is the model's fault.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

use crate::errors::{ActError, ApiFailure};
use crate::program::{Call, Program};
use crate::tools::{ToolArgs, ToolRegistry, RETURN_CALL, THROW_CALL};

/// Interpretation failure, split by fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpreterError {
    /// The document is not a valid statement tree (server/protocol fault).
    #[error("malformed plan document: {0}")]
    MalformedDocument(String),

    /// The document names actions or argument shapes outside the vocabulary
    /// (model fault, recoverable by asking again).
    #[error("invalid action in plan: {0}")]
    InvalidAction(String),
}

impl InterpreterError {
    /// Attach request context and lift into the act failure taxonomy.
    pub fn into_act_error(self, request_id: &str, raw_plan: &str) -> ActError {
        let failure = ApiFailure::message(self.to_string())
            .with_status(200)
            .with_request_id(request_id.to_string())
            .with_raw_response(raw_plan.to_string());
        match self {
            Self::MalformedDocument(_) => ActError::BadResponse(failure),
            Self::InvalidAction(_) => ActError::InvalidModelGeneration(failure),
        }
    }
}

/// Interpret a plan document into a program.
pub fn interpret(plan_ast: &Value, tools: &ToolRegistry) -> Result<Program, InterpreterError> {
    let root = plan_ast.as_object().ok_or_else(|| {
        InterpreterError::MalformedDocument("plan document is not an object".into())
    })?;

    let statements = root
        .get("statements")
        .ok_or_else(|| InterpreterError::MalformedDocument("missing 'statements'".into()))?
        .as_array()
        .ok_or_else(|| InterpreterError::MalformedDocument("'statements' is not an array".into()))?;

    let mut calls = Vec::with_capacity(statements.len());
    let mut seen_ids = HashSet::new();

    for (index, statement) in statements.iter().enumerate() {
        let call = interpret_statement(index, statement, tools)?;
        if !seen_ids.insert(call.id.clone()) {
            return Err(InterpreterError::InvalidAction(format!(
                "duplicate statement id '{}'",
                call.id
            )));
        }
        calls.push(call);
    }

    Ok(Program::new(calls))
}

fn interpret_statement(
    index: usize,
    statement: &Value,
    tools: &ToolRegistry,
) -> Result<Call, InterpreterError> {
    let object = statement.as_object().ok_or_else(|| {
        InterpreterError::MalformedDocument(format!("statement {index} is not an object"))
    })?;

    let kind = object
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            InterpreterError::MalformedDocument(format!("statement {index} has no string 'kind'"))
        })?;

    match kind {
        "call" => {
            let action = object.get("action").and_then(Value::as_str).ok_or_else(|| {
                InterpreterError::MalformedDocument(format!(
                    "call statement {index} has no string 'action'"
                ))
            })?;

            if !tools.contains(action) {
                return Err(InterpreterError::InvalidAction(format!(
                    "unknown action '{action}'"
                )));
            }

            let kwargs = match object.get("arguments") {
                None | Some(Value::Null) => ToolArgs::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(_) => {
                    return Err(InterpreterError::InvalidAction(format!(
                        "arguments of '{action}' are not an object"
                    )))
                }
            };

            Ok(Call {
                id: statement_id(object, index, action)?,
                name: action.to_string(),
                kwargs,
            })
        }
        "return" | "throw" => {
            let name = if kind == "return" { RETURN_CALL } else { THROW_CALL };
            let mut kwargs = ToolArgs::new();
            if let Some(value) = object.get("value") {
                kwargs.insert("value".into(), value.clone());
            }
            Ok(Call {
                id: statement_id(object, index, name)?,
                name: name.to_string(),
                kwargs,
            })
        }
        other => Err(InterpreterError::MalformedDocument(format!(
            "statement {index} has unknown kind '{other}'"
        ))),
    }
}

fn statement_id(
    object: &serde_json::Map<String, Value>,
    index: usize,
    name: &str,
) -> Result<String, InterpreterError> {
    match object.get("id") {
        None | Some(Value::Null) => Ok(format!("{name}-{index}")),
        Some(Value::String(id)) => Ok(id.clone()),
        Some(_) => Err(InterpreterError::MalformedDocument(format!(
            "statement {index} id is not a string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct NoopTool(&'static str);

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            self.0
        }

        async fn invoke(&self, _args: &ToolArgs) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::with_terminals();
        registry.register(Arc::new(NoopTool("click")));
        registry.register(Arc::new(NoopTool("typeText")));
        registry
    }

    #[test]
    fn interprets_calls_and_terminals() {
        let ast = json!({"statements": [
            {"kind": "call", "id": "s1", "action": "click", "arguments": {"box": 2}},
            {"kind": "call", "action": "typeText", "arguments": {"text": "rust"}},
            {"kind": "return", "value": "done"},
        ]});
        let program = interpret(&ast, &registry()).expect("program");
        assert_eq!(program.calls.len(), 3);
        assert_eq!(program.calls[0].id, "s1");
        assert_eq!(program.calls[1].id, "typeText-1");
        assert_eq!(program.calls[2].name, RETURN_CALL);
        assert_eq!(program.calls[2].kwargs["value"], json!("done"));
    }

    #[test]
    fn unknown_action_is_a_model_fault() {
        let ast = json!({"statements": [
            {"kind": "call", "action": "teleport", "arguments": {}},
        ]});
        match interpret(&ast, &registry()) {
            Err(InterpreterError::InvalidAction(message)) => {
                assert!(message.contains("teleport"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_object_arguments_are_a_model_fault() {
        let ast = json!({"statements": [
            {"kind": "call", "action": "click", "arguments": [1, 2]},
        ]});
        assert!(matches!(
            interpret(&ast, &registry()),
            Err(InterpreterError::InvalidAction(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_a_model_fault() {
        let ast = json!({"statements": [
            {"kind": "call", "id": "dup", "action": "click"},
            {"kind": "call", "id": "dup", "action": "typeText"},
        ]});
        assert!(matches!(
            interpret(&ast, &registry()),
            Err(InterpreterError::InvalidAction(_))
        ));
    }

    #[test]
    fn structural_violations_are_server_faults() {
        for ast in [
            json!([]),
            json!({"other": 1}),
            json!({"statements": "nope"}),
            json!({"statements": [42]}),
            json!({"statements": [{"action": "click"}]}),
            json!({"statements": [{"kind": "loop"}]}),
            json!({"statements": [{"kind": "call", "action": 9}]}),
            json!({"statements": [{"kind": "call", "action": "click", "id": 5}]}),
        ] {
            assert!(
                matches!(
                    interpret(&ast, &registry()),
                    Err(InterpreterError::MalformedDocument(_))
                ),
                "expected malformed for {ast}"
            );
        }
    }

    #[test]
    fn fault_classes_map_to_distinct_act_errors() {
        let malformed = InterpreterError::MalformedDocument("x".into())
            .into_act_error("req-1", "raw");
        assert!(matches!(malformed, ActError::BadResponse(_)));

        let invalid = InterpreterError::InvalidAction("y".into()).into_act_error("req-1", "raw");
        match invalid {
            ActError::InvalidModelGeneration(failure) => {
                assert_eq!(failure.request_id.as_deref(), Some("req-1"));
                assert_eq!(failure.status, Some(200));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_statement_list_is_valid() {
        let program = interpret(&json!({"statements": []}), &registry()).expect("program");
        assert!(program.calls.is_empty());
    }
}
