//! Conversation state and its reducers
//!
//! [`ConversationState`] is the record threaded through every step. Nodes never mutate it
//! in place: each node returns a [`StateUpdate`] delta and the engine folds it in through
//! the two reducers below, which are the only mutation path.
//!
//! - [`merge_messages`] appends incoming messages, replacing any message whose `id` is
//!   already present at its original position. Re-applying the same delta is a no-op.
//! - [`merge_stack`] applies a [`StackOp`] to the delegation stack. Popping an empty stack
//!   does nothing, and pushing the scope already on top does nothing.

use crate::messages::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Mutable record of one conversation thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Ordered message history
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Caller context fetched once per thread, read-only to nodes
    #[serde(default)]
    pub user_context: Value,

    /// Active delegation, innermost last
    #[serde(default)]
    pub dialog_stack: Vec<String>,
}

impl ConversationState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state with the given user context
    pub fn with_user_context(mut self, user_context: Value) -> Self {
        self.user_context = user_context;
        self
    }

    /// The most recent message
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Scope owning the conversation, `None` for the primary controller
    pub fn active_scope(&self) -> Option<&str> {
        self.dialog_stack.last().map(String::as_str)
    }

    /// Look up a message by id
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Fold a node's delta into the state
    pub fn apply(self, update: StateUpdate) -> Self {
        Self {
            messages: merge_messages(self.messages, update.messages),
            user_context: self.user_context,
            dialog_stack: merge_stack(self.dialog_stack, update.stack),
        }
    }

    /// Serialize into the opaque checkpoint payload
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Restore from a checkpoint payload
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

/// Delegation stack operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "scope", rename_all = "lowercase")]
pub enum StackOp {
    /// Enter a scope
    Push(String),
    /// Return to the caller
    Pop,
    /// Leave the stack untouched
    #[default]
    Noop,
}

/// Partial update returned by a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Messages to merge
    pub messages: Vec<Message>,

    /// Stack operation to apply
    pub stack: StackOp,
}

impl StateUpdate {
    /// An update that only adds messages
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            stack: StackOp::Noop,
        }
    }

    /// An update with a single message
    pub fn message(message: Message) -> Self {
        Self::messages(vec![message])
    }

    /// Set the stack operation
    pub fn with_stack(mut self, op: StackOp) -> Self {
        self.stack = op;
        self
    }
}

/// Merge message lists, replacing by id and appending otherwise
pub fn merge_messages(existing: Vec<Message>, incoming: Vec<Message>) -> Vec<Message> {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.clone(), i))
        .collect();

    for message in incoming {
        match index.get(&message.id) {
            Some(&pos) => merged[pos] = message,
            None => {
                index.insert(message.id.clone(), merged.len());
                merged.push(message);
            }
        }
    }
    merged
}

/// Apply a stack operation
pub fn merge_stack(existing: Vec<String>, op: StackOp) -> Vec<String> {
    let mut stack = existing;
    match op {
        StackOp::Push(scope) => {
            if stack.last() != Some(&scope) {
                stack.push(scope);
            }
        }
        StackOp::Pop => {
            stack.pop();
        }
        StackOp::Noop => {}
    }
    stack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;

    fn msg(id: &str, content: &str) -> Message {
        Message::user(content).with_id(id)
    }

    #[test]
    fn test_merge_appends_new_ids() {
        let merged = merge_messages(vec![msg("1", "a")], vec![msg("2", "b"), msg("3", "c")]);
        let ids: Vec<_> = merged.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_merge_replaces_in_position() {
        let existing = vec![msg("1", "a"), msg("2", "b"), msg("3", "c")];
        let merged = merge_messages(existing, vec![msg("2", "B"), msg("4", "d")]);
        let contents: Vec<_> = merged.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "B", "c", "d"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = vec![msg("1", "a")];
        let delta = vec![msg("1", "A"), msg("2", "b")];
        let once = merge_messages(existing.clone(), delta.clone());
        let twice = merge_messages(once.clone(), delta);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_stack_ops() {
        let stack = merge_stack(vec![], StackOp::Push("book_hotel".into()));
        assert_eq!(stack, vec!["book_hotel"]);

        // pushing the current top is a no-op
        let stack = merge_stack(stack, StackOp::Push("book_hotel".into()));
        assert_eq!(stack.len(), 1);

        let stack = merge_stack(stack, StackOp::Pop);
        assert!(stack.is_empty());

        let stack = merge_stack(stack, StackOp::Pop);
        assert!(stack.is_empty());

        assert_eq!(merge_stack(vec!["x".into()], StackOp::Noop), vec!["x"]);
    }

    #[test]
    fn test_apply_and_roundtrip() {
        let state = ConversationState::new()
            .with_user_context(serde_json::json!({"passenger_id": "3442 587242"}))
            .apply(
                StateUpdate::message(msg("1", "hello")).with_stack(StackOp::Push("update_flight".into())),
            );

        assert_eq!(state.active_scope(), Some("update_flight"));
        assert_eq!(state.last_message().map(|m| m.content.as_str()), Some("hello"));

        let restored = ConversationState::from_value(state.to_value().unwrap()).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_stack_op_serialization() {
        let value = serde_json::to_value(StackOp::Push("book_car_rental".into())).unwrap();
        assert_eq!(value["op"], "push");
        assert_eq!(value["scope"], "book_car_rental");
    }
}
