//! Error types for graph construction and execution
//!
//! ```text
//! GraphError
//! ├── Validation        - Static graph construction errors
//! ├── UnknownNode       - A node name absent from the static graph
//! ├── Routing           - Routing reached a state the graph cannot express
//! ├── NodeExecution     - A node failed outside the recoverable tool path
//! ├── Policy            - The model call itself failed
//! ├── Checkpoint        - Persistence errors (step is aborted, nothing written)
//! ├── Serialization     - State (de)serialization errors
//! ├── NotInterrupted    - Resume on a thread with nothing pending
//! ├── PendingApproval   - New input on a thread awaiting an approval decision
//! ├── RecursionLimit    - Too many steps in one turn
//! ├── Configuration     - Invalid engine configuration
//! └── Custom            - Application-defined errors
//! ```
//!
//! Tool failures have no variant here: the executor folds them into tool-result messages
//! and they never abort a step. See [`ToolError`](crate::tools::ToolError).

use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that abort a step and surface to the caller
#[derive(Debug, Error)]
pub enum GraphError {
    /// Graph structure is invalid
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// Node name not present in the graph
    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    /// Routing produced a destination the graph cannot handle
    #[error("Routing error at node '{node}': {reason}")]
    Routing { node: String, reason: String },

    /// Node failed
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    /// Policy (model) invocation failed
    #[error("Policy for scope '{scope}' failed: {error}")]
    Policy { scope: String, error: String },

    /// Checkpoint store failure
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] concierge_checkpoint::CheckpointError),

    /// State could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resume requested but the thread is not interrupted
    #[error("Thread '{0}' is not waiting for approval")]
    NotInterrupted(String),

    /// New input arrived while an approval decision is outstanding
    #[error("Thread '{thread_id}' is waiting for approval at node '{node}'")]
    PendingApproval { thread_id: String, node: String },

    /// Step budget for one turn exhausted
    #[error("Recursion limit of {limit} steps reached without completing the turn")]
    RecursionLimit { limit: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl GraphError {
    /// Create a routing error
    pub fn routing(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Routing {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Create a policy error
    pub fn policy(scope: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Policy {
            scope: scope.into(),
            error: error.to_string(),
        }
    }
}
