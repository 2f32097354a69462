//! Tool definitions and registry
//!
//! Tools are externally supplied async functions invoked by tool-execution nodes. A
//! [`Tool`] pairs a name, a description and a JSON schema for its arguments with an
//! executor closure. The [`ToolRegistry`] is the static lookup table built once at graph
//! construction; scopes reference tools in it by name and the graph builder rejects names
//! it does not contain.
//!
//! Invocation never fails outward: [`ToolRegistry::execute_tool_call`] always yields a
//! [`ToolCallResult`], turning lookup failures, argument validation failures, executor
//! errors and panics into [`ToolOutput::Error`].
//!
//! ```rust
//! use concierge_core::tools::{Tool, ToolRegistry};
//! use serde_json::json;
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Tool::from_fn(
//!     "lookup_policy",
//!     "Consult the company policies",
//!     json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}),
//!     |args, _ctx| async move { Ok(json!(format!("No policy matches {}", args["query"]))) },
//! ));
//! assert!(registry.has_tool("lookup_policy"));
//! ```

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use crate::messages::ToolCall;

/// Result type for tool execution
pub type ToolResult = Result<Value, ToolError>;

/// Future type for async tool execution
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Type-erased tool executor
pub type ToolFn = Arc<dyn Fn(Value, ToolContext) -> ToolFuture + Send + Sync>;

/// Errors that can occur during tool invocation
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolError {
    /// Tool not found in registry
    #[error("Tool '{0}' not found. Available tools: {1}")]
    ToolNotFound(String, String),

    /// Tool exists but is not declared for the invoking scope
    #[error("tool not available in this context: '{tool}' is not declared for {scope}")]
    NotAvailable { tool: String, scope: String },

    /// Arguments failed validation
    #[error("Invalid arguments for tool '{tool}': {error}")]
    InvalidArguments { tool: String, error: String },

    /// Tool returned an error
    #[error("Tool '{tool}' execution failed: {error}")]
    ExecutionFailed { tool: String, error: String },

    /// Tool panicked
    #[error("Tool '{tool}' panicked: {error}")]
    Panicked { tool: String, error: String },
}

impl ToolError {
    /// Convenience constructor for executor failures
    pub fn failed(tool: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            error: error.to_string(),
        }
    }
}

/// Context handed to every tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Conversation thread
    pub thread_id: String,

    /// Scope whose tool node is executing
    pub scope: String,

    /// Caller context fetched when the thread started
    pub user_context: Value,
}

impl ToolContext {
    /// Create a context
    pub fn new(thread_id: impl Into<String>, scope: impl Into<String>, user_context: Value) -> Self {
        Self {
            thread_id: thread_id.into(),
            scope: scope.into(),
            user_context,
        }
    }
}

/// Tool specification
pub struct Tool {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    pub input_schema: Value,

    /// Tool executor function
    pub executor: ToolFn,
}

impl Tool {
    /// Create a new tool
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        executor: ToolFn,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            executor,
        }
    }

    /// Create a tool from an async closure
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        f: F,
    ) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let executor: ToolFn = Arc::new(move |args, ctx| Box::pin(f(args, ctx)));
        Self::new(name, description, input_schema, executor)
    }

    /// Execute the tool with given arguments
    pub async fn execute(&self, args: Value, ctx: ToolContext) -> ToolResult {
        (self.executor)(args, ctx).await
    }

    /// Validate tool arguments against the schema
    ///
    /// Arguments must be a JSON object and every key in the schema's `required` array must
    /// be present. Full JSON Schema validation requires the `json-validation` feature.
    pub fn validate_args(&self, args: &Value) -> Result<(), ToolError> {
        let Some(object) = args.as_object() else {
            return Err(ToolError::InvalidArguments {
                tool: self.name.clone(),
                error: "Arguments must be an object".to_string(),
            });
        };

        let missing: Vec<&str> = self
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: self.name.clone(),
                error: format!("missing required field(s): {}", missing.join(", ")),
            });
        }

        #[cfg(feature = "json-validation")]
        {
            use jsonschema::JSONSchema;

            let compiled_schema =
                JSONSchema::compile(&self.input_schema).map_err(|e| ToolError::InvalidArguments {
                    tool: self.name.clone(),
                    error: format!("Invalid JSON Schema: {}", e),
                })?;

            let error_messages = match compiled_schema.validate(args) {
                Ok(()) => None,
                Err(errors) => Some(
                    errors
                        .map(|e| format!("{}: {}", e.instance_path, e))
                        .collect::<Vec<String>>(),
                ),
            };

            if let Some(messages) = error_messages {
                return Err(ToolError::InvalidArguments {
                    tool: self.name.clone(),
                    error: messages.join("; "),
                });
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("executor", &"<function>")
            .finish()
    }
}

/// Tool call result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Tool call ID (matches the request)
    pub id: String,

    /// Tool name that was invoked
    pub name: String,

    /// Tool output (success or error)
    pub output: ToolOutput,
}

/// Tool execution output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutput {
    /// Successful execution
    Success { content: Value },

    /// Execution failed with error
    Error { error: ToolError },
}

impl ToolCallResult {
    fn error(tool_call: &ToolCall, error: ToolError) -> Self {
        Self {
            id: tool_call.id.clone(),
            name: tool_call.name.clone(),
            output: ToolOutput::Error { error },
        }
    }

    /// Whether the call failed
    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutput::Error { .. })
    }
}

/// Tool registry for managing available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Builder-style registration
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names, sorted
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call
    pub async fn execute_tool_call(&self, tool_call: &ToolCall, ctx: ToolContext) -> ToolCallResult {
        let Some(tool) = self.get(&tool_call.name) else {
            return ToolCallResult::error(
                tool_call,
                ToolError::ToolNotFound(tool_call.name.clone(), self.tool_names().join(", ")),
            );
        };

        if let Err(e) = tool.validate_args(&tool_call.args) {
            return ToolCallResult::error(tool_call, e);
        }

        let invocation = AssertUnwindSafe(tool.execute(tool_call.args.clone(), ctx)).catch_unwind();
        match invocation.await {
            Ok(Ok(content)) => ToolCallResult {
                id: tool_call.id.clone(),
                name: tool_call.name.clone(),
                output: ToolOutput::Success { content },
            },
            Ok(Err(e)) => ToolCallResult::error(tool_call, e),
            Err(panic) => ToolCallResult::error(
                tool_call,
                ToolError::Panicked {
                    tool: tool_call.name.clone(),
                    error: panic_message(panic.as_ref()),
                },
            ),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
