//! Demo travel tools backed by a [`TravelDesk`]

use chrono::Utc;
use concierge_core::{Tool, ToolContext, ToolError, ToolRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

use super::desk::{ListingKind, TravelDesk};

pub const FETCH_USER_FLIGHT_INFORMATION: &str = "fetch_user_flight_information";
pub const SEARCH_FLIGHTS: &str = "search_flights";
pub const LOOKUP_POLICY: &str = "lookup_policy";
pub const UPDATE_TICKET_TO_NEW_FLIGHT: &str = "update_ticket_to_new_flight";
pub const CANCEL_TICKET: &str = "cancel_ticket";

const POLICIES: &[(&str, &str)] = &[
    (
        "ticket changes",
        "Tickets can be rebooked to another flight up to 3 hours before departure. \
         A change fee applies to Economy fares.",
    ),
    (
        "cancellation refunds",
        "Cancelled tickets are refunded to the original form of payment within 7 business days. \
         Economy Light fares are non-refundable.",
    ),
    (
        "baggage",
        "Economy fares include one checked bag up to 23 kg. Business fares include two.",
    ),
    (
        "hotel car rental excursion bookings",
        "Partner hotels, car rentals and excursions can be booked, changed or cancelled free of \
         charge up to 24 hours before the start date.",
    ),
];

/// Tool names for one listing kind
#[derive(Debug, Clone, Copy)]
pub struct ListingTools {
    pub kind: ListingKind,
    pub search: &'static str,
    pub book: &'static str,
    pub update: &'static str,
    pub cancel: &'static str,
}

pub const HOTEL_TOOLS: ListingTools = ListingTools {
    kind: ListingKind::Hotel,
    search: "search_hotels",
    book: "book_hotel",
    update: "update_hotel",
    cancel: "cancel_hotel",
};

pub const CAR_RENTAL_TOOLS: ListingTools = ListingTools {
    kind: ListingKind::CarRental,
    search: "search_car_rentals",
    book: "book_car_rental",
    update: "update_car_rental",
    cancel: "cancel_car_rental",
};

pub const EXCURSION_TOOLS: ListingTools = ListingTools {
    kind: ListingKind::Excursion,
    search: "search_trip_recommendations",
    book: "book_excursion",
    update: "update_excursion",
    cancel: "cancel_excursion",
};

fn passenger_id(tool: &str, ctx: &ToolContext) -> Result<String, ToolError> {
    ctx.user_context["passenger_id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ToolError::failed(tool, "No passenger ID configured."))
}

fn string_arg(tool: &str, args: &Value, key: &str) -> Result<String, ToolError> {
    match &args[key] {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            error: format!("'{key}' must be a string"),
        }),
    }
}

fn int_arg(tool: &str, args: &Value, key: &str) -> Result<i64, ToolError> {
    match &args[key] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ToolError::InvalidArguments {
        tool: tool.to_string(),
        error: format!("'{key}' must be an integer"),
    })
}

fn object_schema(required: &[&str]) -> Value {
    json!({"type": "object", "required": required})
}

fn flight_tools(desk: &Arc<TravelDesk>) -> Vec<Tool> {
    let fetch = {
        let desk = desk.clone();
        Tool::from_fn(
            FETCH_USER_FLIGHT_INFORMATION,
            "Fetch all tickets for the user along with flight information",
            object_schema(&[]),
            move |_, ctx| {
                let desk = desk.clone();
                async move {
                    let passenger = passenger_id(FETCH_USER_FLIGHT_INFORMATION, &ctx)?;
                    Ok(Value::Array(desk.flights_for(&passenger).await))
                }
            },
        )
    };

    let search = {
        let desk = desk.clone();
        Tool::from_fn(
            SEARCH_FLIGHTS,
            "Search for flights by departure and arrival airport",
            object_schema(&[]),
            move |args, _| {
                let desk = desk.clone();
                async move {
                    let flights = desk.search_flights(
                        args["departure_airport"].as_str(),
                        args["arrival_airport"].as_str(),
                    );
                    serde_json::to_value(flights).map_err(|e| ToolError::failed(SEARCH_FLIGHTS, e))
                }
            },
        )
    };

    let update = {
        let desk = desk.clone();
        Tool::from_fn(
            UPDATE_TICKET_TO_NEW_FLIGHT,
            "Update the user's ticket to a new valid flight",
            object_schema(&["ticket_no", "new_flight_id"]),
            move |args, ctx| {
                let desk = desk.clone();
                async move {
                    let tool = UPDATE_TICKET_TO_NEW_FLIGHT;
                    let passenger = passenger_id(tool, &ctx)?;
                    let ticket_no = string_arg(tool, &args, "ticket_no")?;
                    let flight_id = int_arg(tool, &args, "new_flight_id")?;
                    desk.update_ticket(&passenger, &ticket_no, flight_id, Utc::now())
                        .await
                        .map(Value::String)
                        .map_err(|refusal| ToolError::failed(tool, refusal))
                }
            },
        )
    };

    let cancel = {
        let desk = desk.clone();
        Tool::from_fn(
            CANCEL_TICKET,
            "Cancel the user's ticket and remove it from the database",
            object_schema(&["ticket_no"]),
            move |args, ctx| {
                let desk = desk.clone();
                async move {
                    let passenger = passenger_id(CANCEL_TICKET, &ctx)?;
                    let ticket_no = string_arg(CANCEL_TICKET, &args, "ticket_no")?;
                    desk.cancel_ticket(&passenger, &ticket_no)
                        .await
                        .map(Value::String)
                        .map_err(|refusal| ToolError::failed(CANCEL_TICKET, refusal))
                }
            },
        )
    };

    vec![fetch, search, update, cancel]
}

fn lookup_policy() -> Tool {
    Tool::from_fn(
        LOOKUP_POLICY,
        "Consult the company policies to check whether certain options are permitted",
        object_schema(&["query"]),
        |args, _| async move {
            let query = string_arg(LOOKUP_POLICY, &args, "query")?.to_lowercase();
            let matches: Vec<&str> = POLICIES
                .iter()
                .filter(|(topic, _)| topic.split(' ').any(|word| query.contains(word)))
                .map(|(_, text)| *text)
                .collect();
            if matches.is_empty() {
                return Ok(json!("No policy covers this request."));
            }
            Ok(Value::String(matches.join("\n\n")))
        },
    )
}

fn listing_tools(desk: &Arc<TravelDesk>, tools: ListingTools) -> Vec<Tool> {
    let kind = tools.kind;
    let id_field = kind.id_field();

    let search = {
        let desk = desk.clone();
        Tool::from_fn(
            tools.search,
            format!("Search {} listings by location and name", kind.label().to_lowercase()),
            object_schema(&[]),
            move |args, _| {
                let desk = desk.clone();
                async move {
                    let found = desk
                        .search(kind, args["location"].as_str(), args["name"].as_str())
                        .await;
                    serde_json::to_value(found).map_err(|e| ToolError::failed(tools.search, e))
                }
            },
        )
    };

    let book = {
        let desk = desk.clone();
        Tool::from_fn(
            tools.book,
            format!("Book a {} by its ID", kind.label().to_lowercase()),
            object_schema(&[id_field]),
            move |args, _| {
                let desk = desk.clone();
                async move {
                    let id = int_arg(tools.book, &args, id_field)?;
                    Ok(Value::String(desk.book(kind, id).await))
                }
            },
        )
    };

    let update = {
        let desk = desk.clone();
        Tool::from_fn(
            tools.update,
            format!("Update the details of a {} booking", kind.label().to_lowercase()),
            object_schema(&[id_field]),
            move |args, _| {
                let desk = desk.clone();
                async move {
                    let id = int_arg(tools.update, &args, id_field)?;
                    let mut details = args.clone();
                    if let Some(object) = details.as_object_mut() {
                        object.remove(id_field);
                    }
                    Ok(Value::String(desk.update(kind, id, details).await))
                }
            },
        )
    };

    let cancel = {
        let desk = desk.clone();
        Tool::from_fn(
            tools.cancel,
            format!("Cancel a {} booking", kind.label().to_lowercase()),
            object_schema(&[id_field]),
            move |args, _| {
                let desk = desk.clone();
                async move {
                    let id = int_arg(tools.cancel, &args, id_field)?;
                    Ok(Value::String(desk.cancel(kind, id).await))
                }
            },
        )
    };

    vec![search, book, update, cancel]
}

/// Registry with every demo travel tool
pub fn travel_registry(desk: Arc<TravelDesk>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let tools = flight_tools(&desk)
        .into_iter()
        .chain(std::iter::once(lookup_policy()))
        .chain(listing_tools(&desk, HOTEL_TOOLS))
        .chain(listing_tools(&desk, CAR_RENTAL_TOOLS))
        .chain(listing_tools(&desk, EXCURSION_TOOLS));
    for tool in tools {
        registry.register(tool);
    }
    registry
}
