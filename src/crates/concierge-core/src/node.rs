//! Node registry
//!
//! Every node in a dialog graph is one of a fixed set of shapes, derived statically from
//! the declared scopes. Node names follow a fixed scheme so checkpoints can refer to them
//! by string:
//!
//! | Node | Name |
//! |------|------|
//! | primary policy | `primary_assistant` |
//! | primary tools | `primary_assistant_tools` |
//! | scope policy | `<scope>` |
//! | scope safe tools | `<scope>_safe_tools` |
//! | scope sensitive tools | `<scope>_sensitive_tools` |
//! | entry adapter | `enter_<scope>` |
//! | shared exit | `leave_skill` |

use crate::scope::PRIMARY_SCOPE;
use std::fmt;

/// Name of the shared exit node
pub const LEAVE_NODE: &str = "leave_skill";

/// Name of the primary controller's tool node
pub const PRIMARY_TOOLS_NODE: &str = "primary_assistant_tools";

/// Identifies a node in the dialog graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// Primary controller policy
    Primary,
    /// Primary controller tool execution
    PrimaryTools,
    /// Policy node of a scope
    Policy(String),
    /// Auto-executed tools of a scope
    SafeTools(String),
    /// Approval-gated tools of a scope
    SensitiveTools(String),
    /// Entry adapter for a scope
    Enter(String),
    /// Shared exit node
    Leave,
}

/// Broad category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Produces one assistant message
    Policy,
    /// Executes the last message's tool calls
    Tools,
    /// Acknowledges a hand-off and pushes a scope
    Entry,
    /// Pops the active scope
    Exit,
}

impl NodeId {
    /// Node name as stored in checkpoints
    pub fn name(&self) -> String {
        match self {
            NodeId::Primary => PRIMARY_SCOPE.to_string(),
            NodeId::PrimaryTools => PRIMARY_TOOLS_NODE.to_string(),
            NodeId::Policy(scope) => scope.clone(),
            NodeId::SafeTools(scope) => format!("{scope}_safe_tools"),
            NodeId::SensitiveTools(scope) => format!("{scope}_sensitive_tools"),
            NodeId::Enter(scope) => format!("enter_{scope}"),
            NodeId::Leave => LEAVE_NODE.to_string(),
        }
    }

    /// Category of this node
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Primary | NodeId::Policy(_) => NodeKind::Policy,
            NodeId::PrimaryTools | NodeId::SafeTools(_) | NodeId::SensitiveTools(_) => NodeKind::Tools,
            NodeId::Enter(_) => NodeKind::Entry,
            NodeId::Leave => NodeKind::Exit,
        }
    }

    /// Scope owning this node; `None` for the primary controller and the shared exit
    pub fn scope(&self) -> Option<&str> {
        match self {
            NodeId::Policy(scope)
            | NodeId::SafeTools(scope)
            | NodeId::SensitiveTools(scope)
            | NodeId::Enter(scope) => Some(scope),
            NodeId::Primary | NodeId::PrimaryTools | NodeId::Leave => None,
        }
    }

    /// Policy node that regains control after this node
    pub fn owner_policy(&self) -> NodeId {
        match self.scope() {
            Some(scope) => NodeId::Policy(scope.to_string()),
            None => NodeId::Primary,
        }
    }

    /// Whether the engine always pauses before this node
    pub fn is_interrupt_point(&self) -> bool {
        matches!(self, NodeId::SensitiveTools(_))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
