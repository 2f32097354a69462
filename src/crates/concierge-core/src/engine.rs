//! Graph engine: stepping, interrupts and resume
//!
//! [`GraphEngine`] drives one conversation thread at a time through a [`DialogGraph`]:
//!
//! ```text
//!   send(thread, text)                         resume(thread, decision)
//!        │                                             │
//!        ↓                                             ↓
//!   load checkpoint ── none ──► fetch user context     load interrupted checkpoint
//!        │                                             │
//!        ↓                                             ↓
//!   append user message, checkpoint              apply decision, checkpoint
//!        │                                             │
//!        └──────────────────────┬──────────────────────┘
//!                               ↓
//!               ┌──► interrupt point? ── yes ──► checkpoint(interrupted) ──► Interrupted
//!               │          │ no
//!               │          ↓
//!               │    execute node, merge delta
//!               │          │
//!               │          ↓
//!               │    route, checkpoint
//!               │          │
//!               └── next ──┘── none ──► Completed
//! ```
//!
//! A checkpoint is written after every completed node and on entry to an interrupt, and
//! the latest checkpoint is the only state read when a thread continues. A failed save
//! aborts the step and leaves the previous checkpoint in place.
//!
//! Steps of one thread are strictly sequential: every public operation holds a
//! per-thread async lock for its duration. Different threads run in parallel.
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_core::{GraphEngine, ApprovalDecision, TurnOutcome};
//!
//! let engine = GraphEngine::new(graph, policy, checkpointer).with_context_fetcher(fetcher);
//!
//! match engine.send("thread-1", "Cancel my ticket please").await? {
//!     TurnOutcome::Completed { reply, .. } => println!("{}", reply.unwrap_or_default()),
//!     TurnOutcome::Interrupted(pending) => {
//!         // show pending.tool_calls to a human, then:
//!         engine.resume("thread-1", ApprovalDecision::Approve).await?;
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use concierge_checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSaver, CheckpointSource, ThreadLocks};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::context::{StaticContext, UserContextFetcher};
use crate::error::{GraphError, Result};
use crate::graph::DialogGraph;
use crate::interrupt::{ApprovalDecision, ApprovalHandler, PendingApproval};
use crate::messages::{Message, Role};
use crate::node::{NodeId, NodeKind};
use crate::policy::{Policy, PolicyNode};
use crate::stack;
use crate::state::{ConversationState, StateUpdate};
use crate::tools::ToolContext;

/// Result of driving a thread until it stops
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TurnOutcome {
    /// The router terminated the turn
    Completed {
        /// Thread that completed
        thread_id: String,
        /// Text of the final assistant message
        reply: Option<String>,
        /// Scope that will receive the next user input, `None` for primary
        active_scope: Option<String>,
    },

    /// Paused before a sensitive tool node
    Interrupted(PendingApproval),
}

impl TurnOutcome {
    /// Final reply, if the turn completed
    pub fn reply(&self) -> Option<&str> {
        match self {
            TurnOutcome::Completed { reply, .. } => reply.as_deref(),
            TurnOutcome::Interrupted(_) => None,
        }
    }

    /// Pending approval, if the turn was interrupted
    pub fn pending(&self) -> Option<&PendingApproval> {
        match self {
            TurnOutcome::Interrupted(pending) => Some(pending),
            TurnOutcome::Completed { .. } => None,
        }
    }

    /// Whether the turn stopped at an interrupt point
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TurnOutcome::Interrupted(_))
    }
}

/// Checkpointed view of a thread
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Conversation state
    pub state: ConversationState,

    /// Node scheduled next, `None` once the turn terminated
    pub next: Option<String>,

    /// Whether the thread waits for an approval decision
    pub interrupted: bool,

    /// Step counter of the checkpoint
    pub step: u64,

    /// Checkpoint this snapshot was read from
    pub checkpoint_id: String,

    /// When the checkpoint was written
    pub created_at: DateTime<Utc>,
}

impl StateSnapshot {
    fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self> {
        Ok(Self {
            state: ConversationState::from_value(checkpoint.state)?,
            next: checkpoint.next_node,
            interrupted: checkpoint.interrupted,
            step: checkpoint.step,
            checkpoint_id: checkpoint.id,
            created_at: checkpoint.ts,
        })
    }
}

/// Where the stepping loop picks up
struct Cursor {
    state: ConversationState,
    next: Option<NodeId>,
    step: u64,
    /// The first node was approved and must not interrupt again
    approved: bool,
}

/// Drives conversation threads through a dialog graph
pub struct GraphEngine {
    graph: Arc<DialogGraph>,
    policy: PolicyNode,
    checkpointer: Arc<dyn CheckpointSaver>,
    context: Arc<dyn UserContextFetcher>,
    config: EngineConfig,
    locks: ThreadLocks,
}

impl GraphEngine {
    /// Create an engine with default configuration and an empty user context
    pub fn new(graph: Arc<DialogGraph>, policy: Arc<dyn Policy>, checkpointer: Arc<dyn CheckpointSaver>) -> Self {
        let config = EngineConfig::default();
        Self {
            graph,
            policy: PolicyNode::new(policy, &config),
            checkpointer,
            context: Arc::new(StaticContext::default()),
            config,
            locks: ThreadLocks::new(),
        }
    }

    /// Set the user context fetcher
    pub fn with_context_fetcher(mut self, context: Arc<dyn UserContextFetcher>) -> Self {
        self.context = context;
        self
    }

    /// Set the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.policy = PolicyNode::new(self.policy_handle(), &config);
        self.config = config;
        Ok(self)
    }

    fn policy_handle(&self) -> Arc<dyn Policy> {
        self.policy.policy()
    }

    /// The graph this engine runs
    pub fn graph(&self) -> &Arc<DialogGraph> {
        &self.graph
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submit user input and run until the turn completes or is interrupted
    #[tracing::instrument(skip(self, text))]
    pub async fn send(&self, thread_id: &str, text: &str) -> Result<TurnOutcome> {
        let _guard = self.locks.acquire(thread_id).await;

        let (state, step) = match self.checkpointer.load(thread_id).await? {
            Some(checkpoint) if checkpoint.interrupted => {
                return Err(GraphError::PendingApproval {
                    thread_id: thread_id.to_string(),
                    node: checkpoint.next_node.unwrap_or_default(),
                });
            }
            Some(checkpoint) => {
                let step = checkpoint.step;
                let state = ConversationState::from_value(checkpoint.state)?;
                (close_unanswered_calls(state), step)
            }
            None => {
                tracing::info!(thread_id, "Starting new thread");
                let user_context = self.context.fetch_user_context(thread_id).await?;
                (ConversationState::new().with_user_context(user_context), 0)
            }
        };

        let state = state.apply(StateUpdate::message(Message::user(text)));
        let entry = self.graph.entry_node(&state)?;
        let step = step + 1;
        self.save(
            thread_id,
            step,
            &state,
            Some(&entry),
            false,
            CheckpointMetadata::new().with_source(CheckpointSource::Input),
        )
        .await?;

        self.run(
            thread_id,
            Cursor {
                state,
                next: Some(entry),
                step,
                approved: false,
            },
        )
        .await
    }

    /// Continue an interrupted thread with an approval decision
    #[tracing::instrument(skip(self, decision))]
    pub async fn resume(&self, thread_id: &str, decision: ApprovalDecision) -> Result<TurnOutcome> {
        let _guard = self.locks.acquire(thread_id).await;

        let checkpoint = self
            .checkpointer
            .load(thread_id)
            .await?
            .filter(|c| c.interrupted)
            .ok_or_else(|| GraphError::NotInterrupted(thread_id.to_string()))?;

        let node_name = checkpoint
            .next_node
            .clone()
            .ok_or_else(|| GraphError::NotInterrupted(thread_id.to_string()))?;
        let node = self.graph.node(&node_name)?.clone();
        let state = ConversationState::from_value(checkpoint.state)?;
        let step = checkpoint.step;

        let pending = state
            .last_message()
            .filter(|m| m.role == Role::Assistant)
            .ok_or_else(|| GraphError::routing(&node_name, "interrupted without pending tool calls"))?
            .clone();

        let cursor = match decision {
            ApprovalDecision::Approve => {
                tracing::info!(node = %node_name, "Approval granted");
                Cursor {
                    state,
                    next: Some(node),
                    step,
                    approved: true,
                }
            }
            ApprovalDecision::Deny { reason } => {
                tracing::info!(node = %node_name, reason = ?reason, "Approval denied");
                let messages = pending
                    .tool_calls
                    .iter()
                    .map(|call| Message::tool_error(denial_message(reason.as_deref()), &call.id))
                    .collect();
                let state = state.apply(StateUpdate::messages(messages));
                let next = node.owner_policy();
                let step = step + 1;
                self.save(
                    thread_id,
                    step,
                    &state,
                    Some(&next),
                    false,
                    CheckpointMetadata::new()
                        .with_source(CheckpointSource::Update)
                        .with_node(&node_name),
                )
                .await?;
                Cursor {
                    state,
                    next: Some(next),
                    step,
                    approved: false,
                }
            }
            ApprovalDecision::Edit { arguments } => {
                tracing::info!(node = %node_name, calls = arguments.len(), "Approval granted with edited arguments");
                let mut edited = pending;
                for (call_id, args) in arguments {
                    let call = edited
                        .tool_calls
                        .iter_mut()
                        .find(|c| c.id == call_id)
                        .ok_or_else(|| GraphError::Custom(format!("no pending tool call with id '{call_id}'")))?;
                    call.args = args;
                }
                let state = state.apply(StateUpdate::message(edited));
                let step = step + 1;
                self.save(
                    thread_id,
                    step,
                    &state,
                    Some(&node),
                    false,
                    CheckpointMetadata::new()
                        .with_source(CheckpointSource::Update)
                        .with_node(&node_name),
                )
                .await?;
                Cursor {
                    state,
                    next: Some(node),
                    step,
                    approved: true,
                }
            }
        };

        self.run(thread_id, cursor).await
    }

    /// Send input and settle every interrupt through `handler`
    pub async fn run_turn(
        &self,
        thread_id: &str,
        text: &str,
        handler: &dyn ApprovalHandler,
    ) -> Result<TurnOutcome> {
        let mut outcome = self.send(thread_id, text).await?;
        while let TurnOutcome::Interrupted(pending) = &outcome {
            let decision = handler.await_approval(pending).await?;
            outcome = self.resume(thread_id, decision).await?;
        }
        Ok(outcome)
    }

    /// Latest checkpointed state of a thread
    pub async fn get_state(&self, thread_id: &str) -> Result<Option<StateSnapshot>> {
        self.checkpointer
            .load(thread_id)
            .await?
            .map(StateSnapshot::from_checkpoint)
            .transpose()
    }

    /// The calls awaiting a decision, if the thread is interrupted
    pub async fn pending_approval(&self, thread_id: &str) -> Result<Option<PendingApproval>> {
        let Some(checkpoint) = self.checkpointer.load(thread_id).await? else {
            return Ok(None);
        };
        if !checkpoint.interrupted {
            return Ok(None);
        }
        let node = checkpoint
            .next_node
            .as_deref()
            .map(|name| self.graph.node(name))
            .transpose()?
            .cloned()
            .ok_or_else(|| GraphError::NotInterrupted(thread_id.to_string()))?;
        let state = ConversationState::from_value(checkpoint.state)?;
        Ok(Some(pending_for(thread_id, &node, &state)))
    }

    /// Checkpoint history of a thread, newest first
    pub async fn history(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<StateSnapshot>> {
        let mut stream = self.checkpointer.list(thread_id, limit).await?;
        let mut snapshots = Vec::new();
        while let Some(checkpoint) = stream.next().await {
            snapshots.push(StateSnapshot::from_checkpoint(checkpoint?)?);
        }
        Ok(snapshots)
    }

    async fn run(&self, thread_id: &str, cursor: Cursor) -> Result<TurnOutcome> {
        let Cursor {
            mut state,
            mut next,
            mut step,
            mut approved,
        } = cursor;
        let resumed = approved;
        let mut executed = 0usize;

        while let Some(node) = next {
            if self.graph.is_interrupt_point(&node) && !approved {
                let pending = pending_for(thread_id, &node, &state);
                step += 1;
                self.save(
                    thread_id,
                    step,
                    &state,
                    Some(&node),
                    true,
                    CheckpointMetadata::new()
                        .with_source(CheckpointSource::Loop)
                        .with_extra("scope", serde_json::Value::String(pending.scope.clone())),
                )
                .await?;
                tracing::info!(node = %node, calls = pending.tool_calls.len(), "Interrupted before sensitive tools");
                return Ok(TurnOutcome::Interrupted(pending));
            }
            approved = false;

            if executed >= self.config.max_steps {
                tracing::error!(limit = self.config.max_steps, "Recursion limit reached");
                return Err(GraphError::RecursionLimit {
                    limit: self.config.max_steps,
                });
            }
            executed += 1;

            let update = self.execute_node(thread_id, &node, &state).await?;
            state = state.apply(update);
            next = self.graph.next_node(&node, &state)?;
            tracing::debug!(node = %node, next = ?next.as_ref().map(NodeId::name), "Routed");

            step += 1;
            let source = if resumed && executed == 1 {
                CheckpointSource::Resume
            } else {
                CheckpointSource::Loop
            };
            self.save(
                thread_id,
                step,
                &state,
                next.as_ref(),
                false,
                CheckpointMetadata::new().with_source(source).with_node(node.name()),
            )
            .await?;
        }

        let reply = state
            .last_message()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone());
        tracing::info!(steps = executed, active_scope = ?state.active_scope(), "Turn completed");
        Ok(TurnOutcome::Completed {
            thread_id: thread_id.to_string(),
            reply,
            active_scope: state.active_scope().map(str::to_string),
        })
    }

    #[tracing::instrument(skip(self, thread_id, node, state), fields(node = %node))]
    async fn execute_node(&self, thread_id: &str, node: &NodeId, state: &ConversationState) -> Result<StateUpdate> {
        match node.kind() {
            NodeKind::Policy => {
                let view = self.graph.scope_view(node)?;
                let reply = self.policy.run(&view, state).await?;
                Ok(StateUpdate::message(reply))
            }
            NodeKind::Tools => {
                let tool_node = self.graph.tool_node(node)?;
                let calls = state
                    .last_message()
                    .map(|m| m.tool_calls.as_slice())
                    .unwrap_or_default();
                let ctx = ToolContext::new(
                    thread_id,
                    node.scope().unwrap_or(crate::scope::PRIMARY_SCOPE),
                    state.user_context.clone(),
                );
                Ok(StateUpdate::messages(tool_node.execute(calls, ctx).await))
            }
            NodeKind::Entry => {
                let scope_name = node
                    .scope()
                    .ok_or_else(|| GraphError::UnknownNode(node.name()))?;
                stack::enter(self.graph.scope(scope_name)?, state)
            }
            NodeKind::Exit => stack::leave(state),
        }
    }

    async fn save(
        &self,
        thread_id: &str,
        step: u64,
        state: &ConversationState,
        next: Option<&NodeId>,
        interrupted: bool,
        metadata: CheckpointMetadata,
    ) -> Result<()> {
        let mut checkpoint = Checkpoint::new(thread_id, step, state.to_value()?, next.map(NodeId::name))
            .with_metadata(metadata);
        checkpoint.interrupted = interrupted;

        self.checkpointer.save(checkpoint).await.map_err(|e| {
            tracing::error!(thread_id, step, error = %e, "Checkpoint save failed, step aborted");
            GraphError::from(e)
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field("graph", &self.graph)
            .field("config", &self.config)
            .finish()
    }
}

fn pending_for(thread_id: &str, node: &NodeId, state: &ConversationState) -> PendingApproval {
    PendingApproval {
        thread_id: thread_id.to_string(),
        node: node.name(),
        scope: node.scope().unwrap_or(crate::scope::PRIMARY_SCOPE).to_string(),
        tool_calls: state
            .last_message()
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default(),
    }
}

fn denial_message(reason: Option<&str>) -> String {
    match reason {
        Some(reason) if !reason.trim().is_empty() => format!(
            "Denied by the user. Reason: '{reason}'. The action was not performed; continue assisting the user with this in mind."
        ),
        _ => "Denied by the user. The action was not performed; ask the user how they would like to proceed."
            .to_string(),
    }
}

/// Answer tool calls left without a result by an aborted turn
fn close_unanswered_calls(state: ConversationState) -> ConversationState {
    let Some(last) = state.last_message() else {
        return state;
    };
    if last.role != Role::Assistant || !last.has_tool_calls() {
        return state;
    }
    let messages = last
        .tool_calls
        .iter()
        .map(|call| Message::tool_error("Not executed: the previous turn was aborted.", &call.id))
        .collect();
    tracing::warn!(calls = last.tool_calls.len(), "Closing tool calls left unanswered by an aborted turn");
    state.apply(StateUpdate::messages(messages))
}
