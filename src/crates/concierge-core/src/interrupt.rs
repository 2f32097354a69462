//! Human-in-the-loop approval
//!
//! When the engine reaches a sensitive tool node it persists an interrupted checkpoint and
//! returns a [`PendingApproval`] describing the calls waiting for a decision. The caller
//! answers with an [`ApprovalDecision`] through
//! [`GraphEngine::resume`](crate::engine::GraphEngine::resume), either directly or via an
//! [`ApprovalHandler`] passed to
//! [`GraphEngine::run_turn`](crate::engine::GraphEngine::run_turn).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;
use crate::messages::ToolCall;

/// Decision on a batch of sensitive tool calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum ApprovalDecision {
    /// Execute the calls as requested
    Approve,

    /// Do not execute; each call is answered with an error result
    Deny {
        /// Explanation passed back to the assistant
        #[serde(default)]
        reason: Option<String>,
    },

    /// Replace arguments (keyed by call id), then execute
    Edit { arguments: HashMap<String, Value> },
}

impl ApprovalDecision {
    /// Deny with a reason
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: Some(reason.into()),
        }
    }

    /// Edit the arguments of a single call
    pub fn edit(call_id: impl Into<String>, arguments: Value) -> Self {
        Self::Edit {
            arguments: HashMap::from([(call_id.into(), arguments)]),
        }
    }
}

/// Sensitive tool calls awaiting a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    /// Thread that is paused
    pub thread_id: String,

    /// Interrupt node the thread will run on approval
    pub node: String,

    /// Scope that requested the calls
    pub scope: String,

    /// The calls to approve, deny or edit
    pub tool_calls: Vec<ToolCall>,
}

/// Collects approval decisions from a human (or an automated stand-in)
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Decide on the pending calls
    async fn await_approval(&self, pending: &PendingApproval) -> Result<ApprovalDecision>;
}

/// Approves everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalHandler for AutoApprove {
    async fn await_approval(&self, _pending: &PendingApproval) -> Result<ApprovalDecision> {
        Ok(ApprovalDecision::Approve)
    }
}

/// Denies everything with a fixed reason
#[derive(Debug, Clone, Default)]
pub struct AutoDeny {
    reason: Option<String>,
}

impl AutoDeny {
    /// Deny with the given reason
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

#[async_trait]
impl ApprovalHandler for AutoDeny {
    async fn await_approval(&self, _pending: &PendingApproval) -> Result<ApprovalDecision> {
        Ok(ApprovalDecision::Deny {
            reason: self.reason.clone(),
        })
    }
}
