//! Conversation messages
//!
//! A [`Message`] is one turn of the conversation: user input, an assistant reply (possibly
//! requesting tool calls), or a tool result answering exactly one of those calls. Messages
//! are immutable once appended; a node that needs to correct an earlier entry emits a new
//! message carrying the same `id`, and the [`merge_messages`](crate::state::merge_messages)
//! reducer replaces it in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user input
    User,
    /// Policy output
    Assistant,
    /// Result of one tool call
    Tool,
}

/// A tool invocation requested by an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID, answered by exactly one tool message
    pub id: String,

    /// Tool to invoke
    pub name: String,

    /// Arguments (JSON object)
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    /// Create a tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Create a tool call with a generated ID
    pub fn generate(name: impl Into<String>, args: Value) -> Self {
        Self::new(format!("call_{}", Uuid::new_v4().simple()), name, args)
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, used for replace-by-id merging
    pub id: String,

    /// Role of the sender
    pub role: Role,

    /// Text content, possibly empty
    #[serde(default)]
    pub content: String,

    /// Requested tool calls (assistant messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// The call this message answers (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Whether this tool result reports a failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,

    /// Optional sender name (e.g. the scope that produced an assistant message)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
            name: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a successful tool result
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Create a failed tool result
    pub fn tool_error(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        let mut message = Self::tool(content, tool_call_id);
        message.is_error = true;
        message
    }

    /// Set the message ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach tool calls
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Set the sender name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether this message requests any tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// An assistant message with neither text nor tool calls
    pub fn is_empty_response(&self) -> bool {
        self.role == Role::Assistant && !self.has_tool_calls() && self.content.trim().is_empty()
    }
}
