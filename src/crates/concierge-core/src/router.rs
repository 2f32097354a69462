//! Routing decisions
//!
//! Pure functions evaluated after every policy node. They inspect the last message and
//! decide where the conversation goes next. Tool, entry and exit nodes always hand control
//! back to their owning policy, so only policy output needs routing.
//!
//! ```text
//! route_scope(last, scope)
//!     no tool calls                    -> Terminate
//!     any CompleteOrEscalate call      -> Leave
//!     every call is a safe tool        -> SafeTools
//!     otherwise                        -> SensitiveTools   (interrupt point)
//!
//! route_primary(last, delegations)
//!     no tool calls                    -> Terminate
//!     any delegation call              -> Enter(scope)     (other calls are discarded)
//!     otherwise                        -> PrimaryTools
//! ```

use crate::messages::Message;
use crate::scope::{Scope, COMPLETE_OR_ESCALATE};

/// Where a scope's policy output sends the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeRoute {
    /// Turn complete
    Terminate,
    /// Hand control back through the exit node
    Leave,
    /// Auto-execute the requested tools
    SafeTools,
    /// Pause for approval, then execute
    SensitiveTools,
}

/// Where the primary controller's output sends the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryRoute {
    /// Turn complete
    Terminate,
    /// Delegate to the named scope
    Enter(String),
    /// Execute the primary controller's own tools
    PrimaryTools,
}

/// Route the output of a specialized scope's policy
pub fn route_scope(last: &Message, scope: &Scope) -> ScopeRoute {
    if !last.has_tool_calls() {
        return ScopeRoute::Terminate;
    }
    if last.tool_calls.iter().any(|tc| tc.name == COMPLETE_OR_ESCALATE) {
        return ScopeRoute::Leave;
    }
    if last.tool_calls.iter().all(|tc| scope.is_safe(&tc.name)) {
        ScopeRoute::SafeTools
    } else {
        ScopeRoute::SensitiveTools
    }
}

/// Route the output of the primary controller
///
/// The first delegation call in the batch wins, even when ordinary tool calls are
/// requested alongside it.
pub fn route_primary<'a, I>(last: &Message, scopes: I) -> PrimaryRoute
where
    I: IntoIterator<Item = &'a Scope> + Clone,
{
    if !last.has_tool_calls() {
        return PrimaryRoute::Terminate;
    }
    for call in &last.tool_calls {
        if let Some(scope) = scopes
            .clone()
            .into_iter()
            .find(|s| s.delegation_tool == call.name)
        {
            return PrimaryRoute::Enter(scope.name.clone());
        }
    }
    PrimaryRoute::PrimaryTools
}

/// Scope that should receive the next user input: the stack top, or `None` for primary
pub fn route_to_workflow(dialog_stack: &[String]) -> Option<&str> {
    dialog_stack.last().map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ToolCall;
    use serde_json::json;

    fn flight_scope() -> Scope {
        Scope::new("update_flight", "ToFlightBookingAssistant")
            .with_safe_tools(["search_flights"])
            .with_sensitive_tools(["update_ticket_to_new_flight", "cancel_ticket"])
    }

    fn calls(names: &[&str]) -> Message {
        Message::assistant("").with_tool_calls(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| ToolCall::new(format!("c{i}"), *n, json!({})))
                .collect(),
        )
    }

    #[test]
    fn test_scope_routes() {
        let scope = flight_scope();
        assert_eq!(route_scope(&Message::assistant("done"), &scope), ScopeRoute::Terminate);
        assert_eq!(route_scope(&calls(&["search_flights"]), &scope), ScopeRoute::SafeTools);
        assert_eq!(route_scope(&calls(&["cancel_ticket"]), &scope), ScopeRoute::SensitiveTools);
        assert_eq!(
            route_scope(&calls(&["search_flights", "cancel_ticket"]), &scope),
            ScopeRoute::SensitiveTools
        );
        assert_eq!(
            route_scope(&calls(&["search_flights", COMPLETE_OR_ESCALATE]), &scope),
            ScopeRoute::Leave
        );
    }

    #[test]
    fn test_undeclared_tool_is_gated() {
        assert_eq!(
            route_scope(&calls(&["made_up_tool"]), &flight_scope()),
            ScopeRoute::SensitiveTools
        );
    }

    #[test]
    fn test_primary_routes() {
        let scopes = vec![flight_scope()];
        assert_eq!(route_primary(&Message::assistant("hi"), &scopes), PrimaryRoute::Terminate);
        assert_eq!(
            route_primary(&calls(&["fetch_user_flight_information"]), &scopes),
            PrimaryRoute::PrimaryTools
        );
        assert_eq!(
            route_primary(&calls(&["lookup_policy", "ToFlightBookingAssistant"]), &scopes),
            PrimaryRoute::Enter("update_flight".into())
        );
    }

    #[test]
    fn test_route_to_workflow() {
        assert_eq!(route_to_workflow(&[]), None);
        assert_eq!(route_to_workflow(&["book_hotel".to_string()]), Some("book_hotel"));
    }
}
