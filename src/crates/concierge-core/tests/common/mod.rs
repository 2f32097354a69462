//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use concierge_checkpoint::{Checkpoint, CheckpointAck, CheckpointError, CheckpointSaver, CheckpointStream, InMemoryCheckpointSaver};
use concierge_core::{
    ConversationState, DialogGraph, GraphBuilder, GraphEngine, Message, Policy, PrimaryScope, Result,
    Role, Scope, ScopeView, StaticContext, Tool, ToolCall, ToolError, ToolRegistry, UserContextFetcher,
    COMPLETE_OR_ESCALATE,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PASSENGER_ID: &str = "3442 587242";
pub const TICKET_NO: &str = "7240005432906569";

/// Counters observed by the stub tools
#[derive(Debug, Default)]
pub struct ToolLog {
    pub cancellations: AtomicUsize,
    pub cancelled_tickets: Mutex<Vec<String>>,
}

impl ToolLog {
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }
}

/// Registry with stub customer-support tools
pub fn support_registry(log: Arc<ToolLog>) -> ToolRegistry {
    let object = json!({"type": "object"});

    ToolRegistry::new()
        .with_tool(Tool::from_fn(
            "fetch_user_flight_information",
            "Fetch the caller's tickets and flights",
            object.clone(),
            |_, ctx| async move {
                let passenger = ctx.user_context["passenger_id"].as_str().unwrap_or("unknown").to_string();
                Ok(json!([{
                    "passenger_id": passenger,
                    "ticket_no": TICKET_NO,
                    "flight_no": "LX0112",
                    "status": "Scheduled"
                }]))
            },
        ))
        .with_tool(Tool::from_fn(
            "search_flights",
            "Search flights",
            object.clone(),
            |_, _| async move { Ok(json!([{"flight_no": "LX0112"}])) },
        ))
        .with_tool(Tool::from_fn(
            "lookup_policy",
            "Consult company policies",
            json!({"type": "object", "required": ["query"]}),
            |args, _| async move { Ok(json!(format!("Policy for {}: changes allowed", args["query"]))) },
        ))
        .with_tool(Tool::from_fn(
            "update_ticket_to_new_flight",
            "Move a ticket to another flight",
            json!({"type": "object", "required": ["ticket_no", "new_flight_id"]}),
            |_, _| async move { Ok(json!("Ticket successfully updated to new flight.")) },
        ))
        .with_tool({
            let log = log.clone();
            Tool::from_fn(
                "cancel_ticket",
                "Cancel a ticket",
                json!({"type": "object", "required": ["ticket_no"]}),
                move |args, _| {
                    let log = log.clone();
                    async move {
                        let ticket = args["ticket_no"]
                            .as_str()
                            .ok_or_else(|| ToolError::failed("cancel_ticket", "ticket_no must be a string"))?
                            .to_string();
                        log.cancellations.fetch_add(1, Ordering::SeqCst);
                        log.cancelled_tickets.lock().unwrap().push(ticket.clone());
                        Ok(json!(format!("Ticket successfully cancelled: {ticket}")))
                    }
                },
            )
        })
        .with_tool(Tool::from_fn(
            "search_hotels",
            "Search hotels",
            object.clone(),
            |_, _| async move { Ok(json!([{"id": 1, "name": "Hilton Basel"}])) },
        ))
        .with_tool(Tool::from_fn(
            "book_hotel",
            "Book a hotel",
            json!({"type": "object", "required": ["hotel_id"]}),
            |args, _| async move { Ok(json!(format!("Hotel {} successfully booked.", args["hotel_id"]))) },
        ))
}

fn flight_scope(cancel_is_sensitive: bool) -> Scope {
    let scope = Scope::new("update_flight", "ToFlightBookingAssistant")
        .with_display_name("Flight Updates & Booking Assistant")
        .with_safe_tools(["search_flights", "lookup_policy"]);
    if cancel_is_sensitive {
        scope.with_sensitive_tools(["update_ticket_to_new_flight", "cancel_ticket"])
    } else {
        scope
            .with_safe_tools(["cancel_ticket"])
            .with_sensitive_tools(["update_ticket_to_new_flight"])
    }
}

fn build_graph(log: Arc<ToolLog>, cancel_is_sensitive: bool) -> DialogGraph {
    GraphBuilder::new(support_registry(log))
        .primary(PrimaryScope::new(["fetch_user_flight_information", "search_flights", "lookup_policy"]))
        .scope(flight_scope(cancel_is_sensitive))
        .scope(
            Scope::new("book_hotel", "ToHotelBookingAssistant")
                .with_display_name("Hotel Booking Assistant")
                .with_safe_tools(["search_hotels"])
                .with_sensitive_tools(["book_hotel"]),
        )
        .build()
        .expect("fixture graph is valid")
}

/// Customer-support graph with cancellation gated behind approval
pub fn support_graph(log: Arc<ToolLog>) -> Arc<DialogGraph> {
    Arc::new(build_graph(log, true))
}

/// Same graph with cancellation declared safe
pub fn ungated_support_graph(log: Arc<ToolLog>) -> Arc<DialogGraph> {
    Arc::new(build_graph(log, false))
}

fn call(name: &str, args: Value) -> Message {
    Message::assistant("").with_tool_calls(vec![ToolCall::generate(name, args)])
}

fn last_user_text(state: &ConversationState) -> String {
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.to_lowercase())
        .unwrap_or_default()
}

/// Deterministic keyword policy standing in for the model
#[derive(Debug, Default)]
pub struct SupportPolicy;

impl SupportPolicy {
    fn primary(state: &ConversationState) -> Message {
        let last = state.last_message().expect("policy runs after input");
        if last.role == Role::Tool {
            return if last.is_error {
                Message::assistant(format!("Sorry, that did not work: {}", last.content))
            } else if last.content.starts_with("Resuming dialog") {
                Message::assistant("Back with the main assistant. Anything else I can do?")
            } else {
                Message::assistant(format!("Here is what I found: {}", last.content))
            };
        }

        let text = last_user_text(state);
        if text.contains("sneaky") {
            call("cancel_ticket", json!({"ticket_no": TICKET_NO}))
        } else if text.contains("flight status") {
            call("fetch_user_flight_information", json!({}))
        } else if text.contains("cancel") {
            call("ToFlightBookingAssistant", json!({"request": text}))
        } else if text.contains("hotel") {
            call("ToHotelBookingAssistant", json!({"location": "Basel"}))
        } else {
            Message::assistant("How can I help you today?")
        }
    }

    fn update_flight(state: &ConversationState) -> Message {
        let last = state.last_message().expect("policy runs after input");
        if last.role == Role::Tool {
            if last.is_error {
                return Message::assistant("I did not cancel the ticket. What would you like to do instead?");
            }
            if last.content.starts_with("Ticket successfully cancelled") {
                return Message::assistant(format!("Done. {}", last.content));
            }
        }

        let text = last_user_text(state);
        if text.contains("never mind") {
            call(COMPLETE_OR_ESCALATE, json!({"cancel": true, "reason": "User changed their mind"}))
        } else if text.contains("cancel") {
            call("cancel_ticket", json!({"ticket_no": TICKET_NO}))
        } else {
            Message::assistant("Anything else about your flight?")
        }
    }

    fn book_hotel(state: &ConversationState) -> Message {
        let last = state.last_message().expect("policy runs after input");
        if last.role == Role::Tool && !last.is_error && last.content.contains("Hilton") {
            return call("book_hotel", json!({"hotel_id": 1}));
        }
        if last.role == Role::Tool && last.content.contains("booked") {
            return Message::assistant(last.content.clone());
        }
        if last_user_text(state).contains("never mind") {
            return call(COMPLETE_OR_ESCALATE, json!({"cancel": true}));
        }
        call("search_hotels", json!({"location": "Basel"}))
    }
}

#[async_trait]
impl Policy for SupportPolicy {
    async fn invoke(&self, scope: &ScopeView, state: &ConversationState) -> Result<Message> {
        Ok(match scope.name.as_str() {
            "update_flight" => Self::update_flight(state),
            "book_hotel" => Self::book_hotel(state),
            _ => Self::primary(state),
        })
    }
}

/// Policy backed by a closure
pub struct FnPolicy<F>(pub F);

#[async_trait]
impl<F> Policy for FnPolicy<F>
where
    F: Fn(&ScopeView, &ConversationState) -> Message + Send + Sync,
{
    async fn invoke(&self, scope: &ScopeView, state: &ConversationState) -> Result<Message> {
        Ok((self.0)(scope, state))
    }
}

/// Context fetcher that counts invocations
#[derive(Debug, Default)]
pub struct CountingContext {
    pub fetches: AtomicUsize,
}

#[async_trait]
impl UserContextFetcher for CountingContext {
    async fn fetch_user_context(&self, _thread_id: &str) -> Result<Value> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"passenger_id": PASSENGER_ID}))
    }
}

/// Checkpoint saver whose writes can be made to fail
#[derive(Debug, Default)]
pub struct FlakySaver {
    pub inner: InMemoryCheckpointSaver,
    pub fail_saves: AtomicBool,
}

#[async_trait]
impl CheckpointSaver for FlakySaver {
    async fn load(&self, thread_id: &str) -> concierge_checkpoint::Result<Option<Checkpoint>> {
        self.inner.load(thread_id).await
    }

    async fn save(&self, checkpoint: Checkpoint) -> concierge_checkpoint::Result<CheckpointAck> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CheckpointError::Storage("store unavailable".to_string()));
        }
        self.inner.save(checkpoint).await
    }

    async fn list(&self, thread_id: &str, limit: Option<usize>) -> concierge_checkpoint::Result<CheckpointStream> {
        self.inner.list(thread_id, limit).await
    }
}

/// Engine over the gated support graph with in-memory checkpoints
pub fn support_engine(log: Arc<ToolLog>) -> GraphEngine {
    GraphEngine::new(
        support_graph(log),
        Arc::new(SupportPolicy),
        Arc::new(InMemoryCheckpointSaver::new()),
    )
    .with_context_fetcher(Arc::new(StaticContext::new(json!({"passenger_id": PASSENGER_ID}))))
}
