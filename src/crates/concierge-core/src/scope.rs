//! Scope declarations
//!
//! A [`Scope`] is one specialized assistant. It owns a policy node, a set of safe tools
//! executed without approval, a set of sensitive tools gated behind human approval, and
//! the delegation tool the primary controller calls to hand the conversation to it. Every
//! scope exits through the same sentinel tool, [`COMPLETE_OR_ESCALATE`].
//!
//! The primary controller is declared separately as a [`PrimaryScope`]: its tools always
//! auto-execute and it is the only scope that can delegate.

use serde::{Deserialize, Serialize};

/// Tool name a scope's policy calls to hand control back to the primary controller
pub const COMPLETE_OR_ESCALATE: &str = "CompleteOrEscalate";

/// Identifier used for the primary controller
pub const PRIMARY_SCOPE: &str = "primary_assistant";

/// A specialized assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Identifier, also the policy node name (e.g. `update_flight`)
    pub name: String,

    /// Human-readable name used in hand-off messages
    pub display_name: String,

    /// Tool the primary controller calls to enter this scope
    pub delegation_tool: String,

    /// Read-only tools, executed without approval
    #[serde(default)]
    pub safe_tools: Vec<String>,

    /// Side-effecting tools, executed only after approval
    #[serde(default)]
    pub sensitive_tools: Vec<String>,
}

impl Scope {
    /// Declare a scope
    pub fn new(name: impl Into<String>, delegation_tool: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.replace('_', " "),
            name,
            delegation_tool: delegation_tool.into(),
            safe_tools: Vec::new(),
            sensitive_tools: Vec::new(),
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Add safe tools
    pub fn with_safe_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.safe_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Add sensitive tools
    pub fn with_sensitive_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Whether `tool` is declared safe for this scope
    pub fn is_safe(&self, tool: &str) -> bool {
        self.safe_tools.iter().any(|t| t == tool)
    }

    /// Whether `tool` is declared sensitive for this scope
    pub fn is_sensitive(&self, tool: &str) -> bool {
        self.sensitive_tools.iter().any(|t| t == tool)
    }

    /// Safe tools followed by sensitive tools
    pub fn all_tools(&self) -> impl Iterator<Item = &String> {
        self.safe_tools.iter().chain(self.sensitive_tools.iter())
    }
}

/// The primary controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryScope {
    /// Tools the primary controller may call directly
    #[serde(default)]
    pub tools: Vec<String>,
}

impl PrimaryScope {
    /// Declare the primary controller with its tools
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a policy sees of the scope it is answering for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeView {
    /// Scope identifier ([`PRIMARY_SCOPE`] for the primary controller)
    pub name: String,

    /// Tool names the policy may request, including routing tools
    pub tools: Vec<String>,
}

impl ScopeView {
    /// Whether this view is the primary controller
    pub fn is_primary(&self) -> bool {
        self.name == PRIMARY_SCOPE
    }
}
