//! Deterministic keyword policy standing in for a chat model

use async_trait::async_trait;
use concierge_core::{
    ConversationState, Message, Policy, Result, Role, ScopeView, ToolCall, COMPLETE_OR_ESCALATE,
};
use serde_json::{json, Value};

use super::tools::{
    ListingTools, CANCEL_TICKET, CAR_RENTAL_TOOLS, EXCURSION_TOOLS, FETCH_USER_FLIGHT_INFORMATION, HOTEL_TOOLS,
    LOOKUP_POLICY, SEARCH_FLIGHTS, UPDATE_TICKET_TO_NEW_FLIGHT,
};
use super::{
    BOOK_CAR_RENTAL, BOOK_EXCURSION, BOOK_HOTEL, TO_BOOK_CAR_RENTAL, TO_BOOK_EXCURSION, TO_FLIGHT_BOOKING,
    TO_HOTEL_BOOKING, UPDATE_FLIGHT,
};

const CITIES: &[&str] = &["Basel", "Zurich", "Lucerne", "Paris"];
const DELEGATION_TOOLS: &[&str] = &[TO_FLIGHT_BOOKING, TO_BOOK_CAR_RENTAL, TO_HOTEL_BOOKING, TO_BOOK_EXCURSION];
const DONE_PHRASES: &[&str] = &["never mind", "nevermind", "that's all", "nothing else", "go back", "stop"];

/// Picks tool calls from keywords in the latest user message
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordPolicy;

/// What the latest message asks the policy to react to
enum Cue<'a> {
    /// A tool result other than a delegation acknowledgement
    ToolResult { call: Option<&'a ToolCall>, message: &'a Message },
    /// The user's latest request
    Request(String),
}

fn cue(state: &ConversationState) -> Cue<'_> {
    if let Some(last) = state.last_message().filter(|m| m.role == Role::Tool) {
        let call = answered_call(state, last);
        let delegated = call.map_or(false, |c| DELEGATION_TOOLS.contains(&c.name.as_str()) && !last.is_error);
        if !delegated {
            return Cue::ToolResult { call, message: last };
        }
    }
    Cue::Request(last_user_text(state))
}

fn answered_call<'a>(state: &'a ConversationState, message: &Message) -> Option<&'a ToolCall> {
    let id = message.tool_call_id.as_deref()?;
    state
        .messages
        .iter()
        .rev()
        .flat_map(|m| m.tool_calls.iter())
        .find(|c| c.id == id)
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

fn first_number(text: &str) -> Option<i64> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|token| !token.is_empty())
        .and_then(|token| token.parse().ok())
}

fn city(text: &str) -> Option<&'static str> {
    CITIES
        .iter()
        .find(|c| text.contains(&c.to_lowercase()))
        .copied()
}

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn call(name: &str, args: Value) -> Message {
    Message::assistant("").with_tool_calls(vec![ToolCall::generate(name, args)])
}

fn escalate(text: &str) -> Message {
    call(
        COMPLETE_OR_ESCALATE,
        json!({"cancel": true, "reason": format!("User said: {text}")}),
    )
}

fn report(message: &Message) -> Message {
    if message.is_error {
        Message::assistant(format!("That did not go through. {}", message.content))
    } else {
        Message::assistant(message.content.clone())
    }
}

impl KeywordPolicy {
    fn primary(state: &ConversationState) -> Message {
        let text = match cue(state) {
            Cue::ToolResult { message, .. } if message.content.starts_with("Resuming dialog") => {
                return Message::assistant("Welcome back. Is there anything else I can help you with?");
            }
            Cue::ToolResult { message, .. } if message.is_error => {
                return Message::assistant(format!("Sorry, that did not work: {}", message.content));
            }
            Cue::ToolResult { message, .. } => {
                return Message::assistant(format!("Here is what I found:\n{}", message.content));
            }
            Cue::Request(text) => text,
        };

        if mentions(&text, &["policy", "refund", "baggage", "allowed"]) {
            call(LOOKUP_POLICY, json!({"query": text}))
        } else if mentions(&text, &["ticket", "cancel", "reschedule", "rebook", "change my flight"]) {
            call(TO_FLIGHT_BOOKING, json!({"request": text}))
        } else if mentions(&text, &["car"]) {
            call(TO_BOOK_CAR_RENTAL, json!({"location": city(&text), "request": text}))
        } else if mentions(&text, &["hotel"]) {
            call(TO_HOTEL_BOOKING, json!({"location": city(&text), "request": text}))
        } else if mentions(&text, &["excursion", "trip", "tour", "visit"]) {
            call(TO_BOOK_EXCURSION, json!({"location": city(&text), "request": text}))
        } else if mentions(&text, &["my flight"]) {
            call(FETCH_USER_FLIGHT_INFORMATION, json!({}))
        } else if mentions(&text, &["flight"]) {
            call(SEARCH_FLIGHTS, json!({}))
        } else {
            Message::assistant("Hello! I can help with your flights, hotels, car rentals and excursions.")
        }
    }

    fn update_flight(state: &ConversationState) -> Message {
        let text = match cue(state) {
            Cue::ToolResult {
                call: Some(call), message,
            } if call.name == SEARCH_FLIGHTS && !message.is_error => {
                return Message::assistant(format!(
                    "These flights are available:\n{}\nWhich flight ID should I move your ticket to?",
                    message.content
                ));
            }
            Cue::ToolResult { message, .. } => return report(message),
            Cue::Request(text) => text,
        };

        let ticket_no = state.user_context["flights"][0]["ticket_no"].clone();
        if mentions(&text, DONE_PHRASES) {
            escalate(&text)
        } else if mentions(&text, &["cancel"]) {
            call(CANCEL_TICKET, json!({"ticket_no": ticket_no}))
        } else if let Some(flight_id) = first_number(&text) {
            call(
                UPDATE_TICKET_TO_NEW_FLIGHT,
                json!({"ticket_no": ticket_no, "new_flight_id": flight_id}),
            )
        } else {
            let flight = &state.user_context["flights"][0];
            call(
                SEARCH_FLIGHTS,
                json!({
                    "departure_airport": flight["departure_airport"],
                    "arrival_airport": flight["arrival_airport"],
                }),
            )
        }
    }

    fn listing(state: &ConversationState, tools: ListingTools) -> Message {
        let text = match cue(state) {
            Cue::ToolResult {
                call: Some(call), message,
            } if call.name == tools.search && !message.is_error => {
                return Message::assistant(format!(
                    "I found these options:\n{}\nTell me the ID of the one you would like.",
                    message.content
                ));
            }
            Cue::ToolResult { message, .. } => return report(message),
            Cue::Request(text) => text,
        };

        let id_field = tools.kind.id_field();
        match first_number(&text) {
            _ if mentions(&text, DONE_PHRASES) => escalate(&text),
            Some(id) if mentions(&text, &["cancel"]) => call(tools.cancel, json!({ id_field: id })),
            Some(id) if mentions(&text, &["change", "update"]) => {
                call(tools.update, json!({ id_field: id, "request": text }))
            }
            Some(id) => call(tools.book, json!({ id_field: id })),
            None => call(tools.search, json!({"location": city(&text)})),
        }
    }
}

#[async_trait]
impl Policy for KeywordPolicy {
    async fn invoke(&self, scope: &ScopeView, state: &ConversationState) -> Result<Message> {
        Ok(match scope.name.as_str() {
            UPDATE_FLIGHT => Self::update_flight(state),
            BOOK_HOTEL => Self::listing(state, HOTEL_TOOLS),
            BOOK_CAR_RENTAL => Self::listing(state, CAR_RENTAL_TOOLS),
            BOOK_EXCURSION => Self::listing(state, EXCURSION_TOOLS),
            _ => Self::primary(state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(text: &str) -> ConversationState {
        let mut state = ConversationState::new().with_user_context(json!({
            "passenger_id": "3442 587242",
            "flights": [{"ticket_no": "7240005432906569", "departure_airport": "CDG", "arrival_airport": "BSL"}],
        }));
        state.messages.push(Message::user(text));
        state
    }

    fn requested(message: &Message) -> Option<&str> {
        message.tool_calls.first().map(|c| c.name.as_str())
    }

    #[test]
    fn test_primary_delegates_by_keyword() {
        assert_eq!(requested(&KeywordPolicy::primary(&state("Cancel my ticket"))), Some(TO_FLIGHT_BOOKING));
        assert_eq!(requested(&KeywordPolicy::primary(&state("A hotel in Basel"))), Some(TO_HOTEL_BOOKING));
        assert_eq!(requested(&KeywordPolicy::primary(&state("rent a car"))), Some(TO_BOOK_CAR_RENTAL));
        assert_eq!(requested(&KeywordPolicy::primary(&state("When is my flight?"))), Some(FETCH_USER_FLIGHT_INFORMATION));
        assert_eq!(requested(&KeywordPolicy::primary(&state("hi"))), None);
    }

    #[test]
    fn test_flight_scope_cancels_own_ticket() {
        let message = KeywordPolicy::update_flight(&state("please cancel it"));
        let call = &message.tool_calls[0];
        assert_eq!(call.name, CANCEL_TICKET);
        assert_eq!(call.args["ticket_no"], "7240005432906569");
    }

    #[test]
    fn test_listing_scope_books_by_id() {
        let message = KeywordPolicy::listing(&state("book number 3"), HOTEL_TOOLS);
        assert_eq!(requested(&message), Some(HOTEL_TOOLS.book));
        assert_eq!(message.tool_calls[0].args["hotel_id"], 3);

        let message = KeywordPolicy::listing(&state("never mind"), HOTEL_TOOLS);
        assert_eq!(requested(&message), Some(COMPLETE_OR_ESCALATE));
    }

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("flight 19251 please"), Some(19251));
        assert_eq!(first_number("no digits"), None);
    }
}
