//! Delegation stack transitions
//!
//! [`enter`] and [`leave`] are the entry-adapter and exit node bodies. Both answer every
//! tool call on the triggering assistant message so the history never holds a call
//! without a result, and both express the stack change as a [`StackOp`] delta.

use crate::error::{GraphError, Result};
use crate::messages::{Message, Role};
use crate::node::LEAVE_NODE;
use crate::scope::{Scope, COMPLETE_OR_ESCALATE};
use crate::state::{ConversationState, StackOp, StateUpdate};

/// Content of the tool message acknowledging a return to the primary controller
pub const RESUME_HOST_MESSAGE: &str =
    "Resuming dialog with the host assistant. Please reflect on the past conversation and assist the user as needed.";

fn last_assistant<'a>(state: &'a ConversationState, node: &str) -> Result<&'a Message> {
    state
        .last_message()
        .filter(|m| m.role == Role::Assistant)
        .ok_or_else(|| GraphError::routing(node, "expected the last message to come from an assistant"))
}

/// Hand the conversation to `scope`
///
/// Acknowledges the delegation call and pushes the scope. Calls discarded by the
/// delegation tie-break are answered with error results.
pub fn enter(scope: &Scope, state: &ConversationState) -> Result<StateUpdate> {
    let node = format!("enter_{}", scope.name);

    if let Some(active) = state.active_scope() {
        return Err(GraphError::routing(
            node,
            format!("cannot enter '{}' while '{}' is active", scope.name, active),
        ));
    }

    let last = last_assistant(state, &node)?;
    let delegation = last
        .tool_calls
        .iter()
        .find(|tc| tc.name == scope.delegation_tool)
        .ok_or_else(|| {
            GraphError::routing(&node, format!("no '{}' call to acknowledge", scope.delegation_tool))
        })?;

    let mut messages = Vec::with_capacity(last.tool_calls.len());
    for call in &last.tool_calls {
        if call.id == delegation.id {
            messages.push(Message::tool(
                format!(
                    "The {display} is now handling this conversation. Review the conversation so far: \
                     the user's request is not yet resolved. Use your tools to complete it; an action \
                     is only done once the matching tool call has succeeded. If the user changes their \
                     mind or needs something outside your remit, call {sentinel} to return control to \
                     the host assistant. Do not introduce yourself, just continue helping.",
                    display = scope.display_name,
                    sentinel = COMPLETE_OR_ESCALATE,
                ),
                &call.id,
            ));
        } else {
            messages.push(Message::tool_error(
                format!(
                    "Not executed: the request was handed to the {} first. Ask again if this is still needed.",
                    scope.display_name
                ),
                &call.id,
            ));
        }
    }

    Ok(StateUpdate::messages(messages).with_stack(StackOp::Push(scope.name.clone())))
}

/// Return control from the active scope
///
/// Only valid when the active scope's own policy requested it with the exit sentinel.
pub fn leave(state: &ConversationState) -> Result<StateUpdate> {
    let last = last_assistant(state, LEAVE_NODE)?;
    if !last.tool_calls.iter().any(|tc| tc.name == COMPLETE_OR_ESCALATE) {
        return Err(GraphError::routing(
            LEAVE_NODE,
            format!("exit requires a {COMPLETE_OR_ESCALATE} call from the active scope"),
        ));
    }
    if let (Some(active), Some(sender)) = (state.active_scope(), last.name.as_deref()) {
        if active != sender {
            return Err(GraphError::routing(
                LEAVE_NODE,
                format!("scope '{sender}' cannot exit '{active}'"),
            ));
        }
    }

    let messages = last
        .tool_calls
        .iter()
        .map(|call| {
            if call.name == COMPLETE_OR_ESCALATE {
                Message::tool(RESUME_HOST_MESSAGE, &call.id)
            } else {
                Message::tool_error(
                    "Not executed: control was returned to the host assistant.",
                    &call.id,
                )
            }
        })
        .collect();

    Ok(StateUpdate::messages(messages).with_stack(StackOp::Pop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ToolCall;
    use serde_json::json;

    fn hotel() -> Scope {
        Scope::new("book_hotel", "ToHotelBookingAssistant").with_display_name("Hotel Booking Assistant")
    }

    fn state_with(stack: Vec<String>, last: Message) -> ConversationState {
        ConversationState {
            messages: vec![Message::user("hi"), last],
            user_context: json!(null),
            dialog_stack: stack,
        }
    }

    #[test]
    fn test_enter_acknowledges_and_pushes() {
        let last = Message::assistant("").with_tool_calls(vec![
            ToolCall::new("a", "search_flights", json!({})),
            ToolCall::new("b", "ToHotelBookingAssistant", json!({"location": "Zurich"})),
        ]);
        let update = enter(&hotel(), &state_with(vec![], last)).unwrap();

        assert_eq!(update.stack, StackOp::Push("book_hotel".into()));
        assert_eq!(update.messages.len(), 2);
        assert!(update.messages[0].is_error);
        assert_eq!(update.messages[0].tool_call_id.as_deref(), Some("a"));
        assert!(!update.messages[1].is_error);
        assert!(update.messages[1].content.contains("Hotel Booking Assistant"));
    }

    #[test]
    fn test_enter_rejects_nested_delegation() {
        let last = Message::assistant("")
            .with_tool_calls(vec![ToolCall::new("b", "ToHotelBookingAssistant", json!({}))]);
        let result = enter(&hotel(), &state_with(vec!["update_flight".into()], last));
        assert!(matches!(result, Err(GraphError::Routing { .. })));
    }

    #[test]
    fn test_leave_pops_and_resumes_host() {
        let last = Message::assistant("")
            .with_name("book_hotel")
            .with_tool_calls(vec![ToolCall::new("x", COMPLETE_OR_ESCALATE, json!({"cancel": true}))]);
        let update = leave(&state_with(vec!["book_hotel".into()], last)).unwrap();

        assert_eq!(update.stack, StackOp::Pop);
        assert_eq!(update.messages[0].content, RESUME_HOST_MESSAGE);
        assert_eq!(update.messages[0].tool_call_id.as_deref(), Some("x"));
    }

    #[test]
    fn test_leave_requires_sentinel() {
        let last = Message::assistant("bye");
        assert!(leave(&state_with(vec!["book_hotel".into()], last)).is_err());
    }

    #[test]
    fn test_leave_rejects_foreign_scope() {
        let last = Message::assistant("")
            .with_name("update_flight")
            .with_tool_calls(vec![ToolCall::new("x", COMPLETE_OR_ESCALATE, json!({}))]);
        assert!(leave(&state_with(vec!["book_hotel".into()], last)).is_err());
    }
}
