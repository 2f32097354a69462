//! Property tests for reducers, stack discipline and executor cardinality

use concierge_core::executor::ToolNode;
use concierge_core::stack::{enter, leave};
use concierge_core::{
    merge_messages, merge_stack, ConversationState, Message, Scope, StackOp, Tool, ToolCall, ToolContext,
    ToolError, ToolRegistry, COMPLETE_OR_ESCALATE,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn message_strategy() -> impl Strategy<Value = Message> {
    (0u8..6, "[a-z]{0,8}").prop_map(|(id, content)| Message::user(content).with_id(format!("m{id}")))
}

#[derive(Debug, Clone)]
enum Transition {
    Enter(usize),
    Leave,
}

fn transition_strategy() -> impl Strategy<Value = Transition> {
    prop_oneof![(0usize..3).prop_map(Transition::Enter), Just(Transition::Leave)]
}

fn scopes() -> Vec<Scope> {
    vec![
        Scope::new("update_flight", "ToFlightBookingAssistant"),
        Scope::new("book_hotel", "ToHotelBookingAssistant"),
        Scope::new("book_excursion", "ToBookExcursion"),
    ]
}

proptest! {
    #[test]
    fn merge_messages_is_idempotent(
        existing in prop::collection::vec(message_strategy(), 0..8),
        delta in prop::collection::vec(message_strategy(), 0..8),
    ) {
        let existing = merge_messages(Vec::new(), existing);
        let once = merge_messages(existing, delta.clone());
        let twice = merge_messages(once.clone(), delta);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_messages_never_duplicates_ids(
        existing in prop::collection::vec(message_strategy(), 0..8),
        delta in prop::collection::vec(message_strategy(), 0..8),
    ) {
        let merged = merge_messages(merge_messages(Vec::new(), existing), delta);
        let mut ids: Vec<_> = merged.iter().map(|m| m.id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);
    }

    #[test]
    fn merge_stack_never_repeats_top(ops in prop::collection::vec(
        prop_oneof![
            "[ab]".prop_map(StackOp::Push),
            Just(StackOp::Pop),
            Just(StackOp::Noop),
        ],
        0..20,
    )) {
        let mut stack = Vec::new();
        for op in ops {
            stack = merge_stack(stack, op);
            prop_assert!(stack.windows(2).all(|w| w[0] != w[1]));
        }
    }

    #[test]
    fn stack_depth_stays_within_one(transitions in prop::collection::vec(transition_strategy(), 0..24)) {
        let scopes = scopes();
        let mut state = ConversationState::new();

        for transition in transitions {
            let (last, result) = match transition {
                Transition::Enter(i) => {
                    let scope = &scopes[i];
                    let last = Message::assistant("")
                        .with_tool_calls(vec![ToolCall::generate(scope.delegation_tool.clone(), json!({}))]);
                    let mut staged = state.clone();
                    staged.messages.push(last.clone());
                    (last, enter(scope, &staged))
                }
                Transition::Leave => {
                    let mut last = Message::assistant("")
                        .with_tool_calls(vec![ToolCall::generate(COMPLETE_OR_ESCALATE, json!({}))]);
                    if let Some(active) = state.active_scope() {
                        last = last.with_name(active);
                    }
                    let mut staged = state.clone();
                    staged.messages.push(last.clone());
                    (last, leave(&staged))
                }
            };

            if let Ok(update) = result {
                state.messages.push(last);
                state = state.apply(update);
            }
            prop_assert!(state.dialog_stack.len() <= 1);
        }
    }

    #[test]
    fn executor_emits_one_message_per_call(names in prop::collection::vec(
        prop_oneof![Just("ok"), Just("fails"), Just("panics"), Just("ghost"), Just("hidden")],
        0..10,
    )) {
        let registry = ToolRegistry::new()
            .with_tool(Tool::from_fn("ok", "", json!({"type": "object"}), |_, _| async move { Ok(json!("fine")) }))
            .with_tool(Tool::from_fn("fails", "", json!({"type": "object"}), |_, _| async move {
                Err(ToolError::failed("fails", "nope"))
            }))
            .with_tool(Tool::from_fn("panics", "", json!({"type": "object"}), |args, _| async move {
                if args.is_object() {
                    panic!("tool bug");
                }
                Ok(json!(null))
            }))
            .with_tool(Tool::from_fn("hidden", "", json!({"type": "object"}), |_, _| async move { Ok(json!("secret")) }));
        let node = ToolNode::new("n", "s", Arc::new(registry), ["ok", "fails", "panics", "ghost"]);

        let calls: Vec<ToolCall> = names
            .iter()
            .enumerate()
            .map(|(i, name)| ToolCall::new(format!("c{i}"), *name, json!({})))
            .collect();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let messages = runtime.block_on(node.execute(&calls, ToolContext::default()));

        prop_assert_eq!(messages.len(), calls.len());
        for (call, message) in calls.iter().zip(&messages) {
            prop_assert_eq!(message.tool_call_id.as_deref(), Some(call.id.as_str()));
            prop_assert_eq!(message.is_error, call.name != "ok");
        }
    }
}
