//! Tool execution node with fallback
//!
//! A [`ToolNode`] executes the tool calls of the last assistant message against the
//! shared [`ToolRegistry`], restricted to the tools its scope declares. Calls run
//! concurrently and each produces exactly one tool message, in call order, whatever the
//! outcome:
//!
//! ```text
//! tool_calls: [search_flights, cancel_ticket, made_up]
//!                   │               │             │
//!                   ↓               ↓             ↓
//!               Success         ExecutionFailed  NotAvailable
//!                   │               │             │
//!                   ↓               ↓             ↓
//! messages:   [tool(result), tool_error(..), tool_error(..)]
//! ```
//!
//! Failures never escape the node. Each call reports independently; one failing call
//! does not prevent or roll back the others.

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::messages::{Message, ToolCall};
use crate::tools::{ToolCallResult, ToolContext, ToolError, ToolOutput, ToolRegistry};

/// Executes tool calls for one node of the graph
#[derive(Debug, Clone)]
pub struct ToolNode {
    name: String,
    scope: String,
    registry: Arc<ToolRegistry>,
    allowed: HashSet<String>,
}

impl ToolNode {
    /// Create a tool node that may only invoke `allowed` tools
    pub fn new<I, S>(name: impl Into<String>, scope: impl Into<String>, registry: Arc<ToolRegistry>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            scope: scope.into(),
            registry,
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this node may invoke `tool`
    pub fn allows(&self, tool: &str) -> bool {
        self.allowed.contains(tool)
    }

    /// Execute every call and return one tool message per call, in order
    #[tracing::instrument(skip(self, tool_calls, ctx), fields(node = %self.name, calls = tool_calls.len()))]
    pub async fn execute(&self, tool_calls: &[ToolCall], ctx: ToolContext) -> Vec<Message> {
        let futures = tool_calls.iter().map(|call| {
            let ctx = ctx.clone();
            async move {
                if !self.allows(&call.name) {
                    return ToolCallResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        output: ToolOutput::Error {
                            error: ToolError::NotAvailable {
                                tool: call.name.clone(),
                                scope: self.scope.clone(),
                            },
                        },
                    };
                }
                self.registry.execute_tool_call(call, ctx).await
            }
        });

        join_all(futures)
            .await
            .into_iter()
            .map(|result| self.to_message(result))
            .collect()
    }

    fn to_message(&self, result: ToolCallResult) -> Message {
        match result.output {
            ToolOutput::Success { content } => Message::tool(render_content(content), result.id),
            ToolOutput::Error { error } => {
                tracing::warn!(node = %self.name, tool = %result.name, error = %error, "Tool call failed");
                Message::tool_error(format_tool_error(&error), result.id)
            }
        }
    }
}

/// Text fed back to the policy when a tool call fails
pub fn format_tool_error(error: &ToolError) -> String {
    format!("Error: {error}\n please fix your mistakes.")
}

fn render_content(content: Value) -> String {
    match content {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        let registry = ToolRegistry::new()
            .with_tool(Tool::from_fn("echo", "Echo args", json!({"type": "object"}), |args, _| async move {
                Ok(args)
            }))
            .with_tool(Tool::from_fn("greet", "Say hi", json!({"type": "object"}), |_, ctx| async move {
                Ok(json!(format!("hi from {}", ctx.scope)))
            }))
            .with_tool(Tool::from_fn("fail", "Always fails", json!({"type": "object"}), |_, _| async move {
                Err(ToolError::failed("fail", "backend unavailable"))
            }));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_one_message_per_call_in_order() {
        let node = ToolNode::new("s_safe_tools", "s", registry(), ["echo", "greet", "fail"]);
        let calls = vec![
            ToolCall::new("1", "echo", json!({"k": 1})),
            ToolCall::new("2", "fail", json!({})),
            ToolCall::new("3", "greet", json!({})),
        ];

        let messages = node.execute(&calls, ToolContext::new("t", "s", json!(null))).await;

        assert_eq!(messages.len(), 3);
        let ids: Vec<_> = messages.iter().map(|m| m.tool_call_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(messages[0].content, r#"{"k":1}"#);
        assert!(messages[1].is_error);
        assert!(messages[1].content.starts_with("Error: "));
        assert!(messages[1].content.ends_with("please fix your mistakes."));
        assert_eq!(messages[2].content, "hi from s");
    }

    #[tokio::test]
    async fn test_undeclared_tool_not_available() {
        let node = ToolNode::new("s_safe_tools", "s", registry(), ["echo"]);
        let messages = node
            .execute(&[ToolCall::new("1", "greet", json!({}))], ToolContext::default())
            .await;

        assert!(messages[0].is_error);
        assert!(messages[0].content.contains("tool not available in this context"));
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_error() {
        let node = ToolNode::new("s_safe_tools", "s", registry(), ["ghost"]);
        let messages = node
            .execute(&[ToolCall::new("1", "ghost", json!({}))], ToolContext::default())
            .await;

        assert!(messages[0].is_error);
        assert!(messages[0].content.contains("not found"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let node = ToolNode::new("n", "s", registry(), ["echo"]);
        assert!(node.execute(&[], ToolContext::default()).await.is_empty());
    }
}
