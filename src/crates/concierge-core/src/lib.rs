//! # concierge-core - Multi-Assistant Dialog Engine
//!
//! **A graph-based state machine** that routes one customer conversation between a
//! primary assistant and a fixed set of specialized assistants, gates side-effecting tool
//! calls behind human approval, and resumes from durable checkpoints.
//!
//! ## Overview
//!
//! - **Conversation state** ([`state`]) - messages, caller context and the delegation
//!   stack, mutated only through the `merge_messages` / `merge_stack` reducers.
//! - **Scopes** ([`scope`]) - specialized assistants with safe and sensitive tool sets.
//! - **Graph** ([`graph`]) - static node table built once from the scopes and validated
//!   against the [`ToolRegistry`].
//! - **Router** ([`router`]) - pure routing over the last assistant message.
//! - **Tool executor** ([`executor`]) - concurrent execution where every call yields
//!   exactly one result message and failures become error messages.
//! - **Delegation stack** ([`stack`]) - entry and exit adapters.
//! - **Policy node** ([`policy`]) - wraps the model call with bounded empty-reply retry.
//! - **Engine** ([`engine`]) - the stepping loop, interrupts, resume and checkpointing.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use concierge_core::*;
//! use concierge_checkpoint::InMemoryCheckpointSaver;
//! use std::sync::Arc;
//!
//! let graph = GraphBuilder::new(registry)
//!     .primary(PrimaryScope::new(["search_flights", "lookup_policy"]))
//!     .scope(
//!         Scope::new("update_flight", "ToFlightBookingAssistant")
//!             .with_safe_tools(["search_flights"])
//!             .with_sensitive_tools(["update_ticket_to_new_flight", "cancel_ticket"]),
//!     )
//!     .build()?;
//!
//! let engine = GraphEngine::new(Arc::new(graph), policy, Arc::new(InMemoryCheckpointSaver::new()));
//! let outcome = engine.run_turn("thread-1", "Please cancel my ticket", &AutoApprove).await?;
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod graph;
pub mod interrupt;
pub mod messages;
pub mod node;
pub mod policy;
pub mod router;
pub mod scope;
pub mod stack;
pub mod state;
pub mod tools;

pub use config::EngineConfig;
pub use context::{StaticContext, UserContextFetcher};
pub use engine::{GraphEngine, StateSnapshot, TurnOutcome};
pub use error::{GraphError, Result};
pub use executor::ToolNode;
pub use graph::{DialogGraph, GraphBuilder, InterruptConfig};
pub use interrupt::{ApprovalDecision, ApprovalHandler, AutoApprove, AutoDeny, PendingApproval};
pub use messages::{Message, Role, ToolCall};
pub use node::{NodeId, NodeKind};
pub use policy::{Policy, PolicyNode};
pub use scope::{PrimaryScope, Scope, ScopeView, COMPLETE_OR_ESCALATE, PRIMARY_SCOPE};
pub use state::{merge_messages, merge_stack, ConversationState, StackOp, StateUpdate};
pub use tools::{Tool, ToolContext, ToolError, ToolRegistry};
