//! Tool registry: schema declaration and dispatch of model tool calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::conversation::turn::{ToolCall, ToolResult};
use crate::tools::datetime::{AddDurationTool, Clock, CurrentDateTimeTool, system_clock};
use crate::tools::error::{ToolError, ToolsResult};

/// JSON-schema descriptor advertised to the completion API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Human-readable description for the model.
    pub description: String,
    /// Object schema of the arguments.
    pub input_schema: Value,
}

impl ToolSchema {
    /// Build a descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A locally executable capability.
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by.
    fn name(&self) -> &str;

    /// Descriptor sent with every completion request.
    fn schema(&self) -> ToolSchema;

    /// Run the tool.
    ///
    /// # Errors
    /// Returns an error if the arguments are invalid or the tool fails.
    fn call(&self, arguments: &Map<String, Value>) -> ToolsResult<String>;
}

/// Ordered set of tools keyed by name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_datetime_tools(system_clock())
    }
}

impl ToolRegistry {
    /// Registry with no tools.
    #[must_use]
    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with both date/time tools reading `clock`.
    #[must_use]
    pub fn with_datetime_tools(clock: Clock) -> Self {
        let mut registry = Self::empty();
        registry.register(CurrentDateTimeTool::new(clock));
        registry.register(AddDurationTool);
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(Box::new(tool));
    }

    /// Descriptors for every tool.
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|tool| tool.schema()).collect()
    }

    /// Run a tool by name.
    ///
    /// # Errors
    /// Returns `UnknownTool` for an unregistered name, or the tool's own error.
    pub fn dispatch(&self, name: &str, arguments: &Map<String, Value>) -> ToolsResult<String> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!(tool = name, "dispatching tool call");
        tool.call(arguments)
    }

    /// Run a tool by name, folding every failure into a diagnostic string.
    #[must_use]
    pub fn process_tool_call(&self, name: &str, arguments: &Map<String, Value>) -> String {
        match self.dispatch(name, arguments) {
            Ok(output) => output,
            Err(err) => describe_failure(name, &err),
        }
    }

    /// Answer one model tool call; failures become error results, never panics.
    #[must_use]
    pub fn execute(&self, call: &ToolCall) -> ToolResult {
        match self.dispatch(&call.name, &call.arguments) {
            Ok(output) => ToolResult {
                call_id: call.call_id.clone(),
                output,
                is_error: false,
            },
            Err(err) => {
                warn!(tool = %call.name, call_id = %call.call_id, error = %err, "tool call failed");
                ToolResult {
                    call_id: call.call_id.clone(),
                    output: describe_failure(&call.name, &err),
                    is_error: true,
                }
            }
        }
    }
}

fn describe_failure(name: &str, err: &ToolError) -> String {
    match err {
        ToolError::UnknownTool(_) => err.to_string(),
        _ => format!("Error running {name}: {err}"),
    }
}

/// Read a string argument, falling back to `default` when absent or null.
///
/// # Errors
/// Returns `InvalidArguments` when the value is missing without a default or is not a string.
pub fn string_arg(
    tool: &str,
    arguments: &Map<String, Value>,
    key: &str,
    default: Option<&str>,
) -> ToolsResult<String> {
    match arguments.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        None | Some(Value::Null) => default.map(str::to_string).ok_or_else(|| {
            ToolError::InvalidArguments {
                tool: tool.to_string(),
                reason: format!("missing required argument '{key}'"),
            }
        }),
        Some(other) => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("argument '{key}' must be a string, got {other}"),
        }),
    }
}

/// Read an integer argument; integral floats and numeric strings are accepted.
///
/// # Errors
/// Returns `InvalidArguments` when the value is not an integer.
pub fn integer_arg(
    tool: &str,
    arguments: &Map<String, Value>,
    key: &str,
    default: i64,
) -> ToolsResult<i64> {
    let invalid = |value: &Value| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: format!("argument '{key}' must be an integer, got {value}"),
    };

    match arguments.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(whole_f64_to_i64)
            })
            .ok_or_else(|| invalid(&Value::Number(number.clone()))),
        Some(Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(&Value::String(text.clone()))),
        Some(other) => Err(invalid(other)),
    }
}

/// Callers only pass integral values below 2^53.
#[allow(clippy::cast_possible_truncation)]
const fn whole_f64_to_i64(value: f64) -> i64 {
    value as i64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn registry() -> ToolRegistry {
        ToolRegistry::with_datetime_tools(Arc::new(|| {
            NaiveDate::from_ymd_opt(2024, 5, 6)
                .unwrap()
                .and_hms_opt(7, 8, 9)
                .unwrap()
        }))
    }

    #[test]
    fn test_schemas_are_closed_objects() {
        let schemas = registry().schemas();
        assert_eq!(schemas.len(), 2);
        for schema in &schemas {
            assert_eq!(schema.input_schema["type"], "object");
            assert_eq!(schema.input_schema["additionalProperties"], false);
        }
        let names: Vec<&str> = schemas.iter().map(|schema| schema.name.as_str()).collect();
        assert_eq!(names, vec!["get_current_datetime", "add_duration_to_datetime"]);
    }

    #[test]
    fn test_unknown_tool_returns_diagnostic() {
        let output = registry().process_tool_call("nonexistent_tool", &Map::new());
        assert!(output.contains("nonexistent_tool"));
        assert!(matches!(
            registry().dispatch("nonexistent_tool", &Map::new()),
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_process_tool_call_runs_tool() {
        let output = registry().process_tool_call("get_current_datetime", &Map::new());
        assert_eq!(output, "2024-05-06 07:08:09");
    }

    #[test]
    fn test_failed_tool_becomes_error_result() {
        let mut arguments = Map::new();
        arguments.insert("format".to_string(), json!(""));
        let result = registry().execute(&ToolCall {
            name: "get_current_datetime".to_string(),
            arguments,
            call_id: "toolu_9".to_string(),
        });

        assert!(result.is_error);
        assert_eq!(result.call_id, "toolu_9");
        assert!(result.output.contains("format string cannot be empty"));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = registry();
        registry.register(AddDurationTool);
        assert_eq!(registry.schemas().len(), 2);
    }

    #[test]
    fn test_integer_arg_coercion() {
        let mut arguments = Map::new();
        arguments.insert("a".to_string(), json!(3.0));
        arguments.insert("b".to_string(), json!(" -2 "));
        arguments.insert("c".to_string(), json!(1.5));
        arguments.insert("d".to_string(), json!(true));

        assert_eq!(integer_arg("t", &arguments, "a", 0).unwrap(), 3);
        assert_eq!(integer_arg("t", &arguments, "b", 0).unwrap(), -2);
        assert!(integer_arg("t", &arguments, "c", 0).is_err());
        assert!(integer_arg("t", &arguments, "d", 0).is_err());
        assert_eq!(integer_arg("t", &arguments, "missing", 7).unwrap(), 7);
    }

    #[test]
    fn test_string_arg_type_checked() {
        let mut arguments = Map::new();
        arguments.insert("format".to_string(), json!(42));
        assert!(string_arg("t", &arguments, "format", Some("x")).is_err());
        assert_eq!(string_arg("t", &Map::new(), "format", Some("x")).unwrap(), "x");
        assert!(string_arg("t", &Map::new(), "format", None).is_err());
    }
}
