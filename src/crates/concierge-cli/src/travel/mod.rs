//! Travel customer-support demo
//!
//! A primary assistant and four specialized assistants over an in-memory [`TravelDesk`]:
//!
//! | Scope             | Delegation tool              | Safe tools                    | Sensitive tools                                  |
//! |-------------------|------------------------------|-------------------------------|--------------------------------------------------|
//! | `update_flight`   | `ToFlightBookingAssistant`   | `search_flights`              | `update_ticket_to_new_flight`, `cancel_ticket`   |
//! | `book_car_rental` | `ToBookCarRentalAssistant`   | `search_car_rentals`          | `book_car_rental`, `update_car_rental`, `cancel_car_rental` |
//! | `book_hotel`      | `ToHotelBookingAssistant`    | `search_hotels`               | `book_hotel`, `update_hotel`, `cancel_hotel`     |
//! | `book_excursion`  | `ToBookExcursionAssistant`   | `search_trip_recommendations` | `book_excursion`, `update_excursion`, `cancel_excursion` |

mod desk;
mod policy;
mod tools;

pub use desk::{Flight, Listing, ListingKind, Ticket, TravelDesk};
pub use policy::KeywordPolicy;
pub use tools::{travel_registry, ListingTools, CAR_RENTAL_TOOLS, EXCURSION_TOOLS, HOTEL_TOOLS};

use async_trait::async_trait;
use concierge_core::{DialogGraph, GraphBuilder, PrimaryScope, Result, Scope, UserContextFetcher};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub const UPDATE_FLIGHT: &str = "update_flight";
pub const BOOK_CAR_RENTAL: &str = "book_car_rental";
pub const BOOK_HOTEL: &str = "book_hotel";
pub const BOOK_EXCURSION: &str = "book_excursion";

pub const TO_FLIGHT_BOOKING: &str = "ToFlightBookingAssistant";
pub const TO_BOOK_CAR_RENTAL: &str = "ToBookCarRentalAssistant";
pub const TO_HOTEL_BOOKING: &str = "ToHotelBookingAssistant";
pub const TO_BOOK_EXCURSION: &str = "ToBookExcursionAssistant";

fn listing_scope(name: &str, delegation_tool: &str, display_name: &str, tools: ListingTools) -> Scope {
    Scope::new(name, delegation_tool)
        .with_display_name(display_name)
        .with_safe_tools([tools.search])
        .with_sensitive_tools([tools.book, tools.update, tools.cancel])
}

/// Build the travel support graph over `desk`
pub fn travel_graph(desk: Arc<TravelDesk>) -> Result<DialogGraph> {
    GraphBuilder::new(travel_registry(desk))
        .primary(PrimaryScope::new([
            tools::FETCH_USER_FLIGHT_INFORMATION,
            tools::SEARCH_FLIGHTS,
            tools::LOOKUP_POLICY,
        ]))
        .scope(
            Scope::new(UPDATE_FLIGHT, TO_FLIGHT_BOOKING)
                .with_display_name("Flight Updates & Booking Assistant")
                .with_safe_tools([tools::SEARCH_FLIGHTS])
                .with_sensitive_tools([tools::UPDATE_TICKET_TO_NEW_FLIGHT, tools::CANCEL_TICKET]),
        )
        .scope(listing_scope(
            BOOK_CAR_RENTAL,
            TO_BOOK_CAR_RENTAL,
            "Car Rental Assistant",
            CAR_RENTAL_TOOLS,
        ))
        .scope(listing_scope(
            BOOK_HOTEL,
            TO_HOTEL_BOOKING,
            "Hotel Booking Assistant",
            HOTEL_TOOLS,
        ))
        .scope(listing_scope(
            BOOK_EXCURSION,
            TO_BOOK_EXCURSION,
            "Trip Recommendation Assistant",
            EXCURSION_TOOLS,
        ))
        .build()
}

/// Seeds each new thread with the passenger and their booked flights
pub struct DeskContext {
    desk: Arc<TravelDesk>,
    passenger_id: String,
}

impl DeskContext {
    pub fn new(desk: Arc<TravelDesk>, passenger_id: impl Into<String>) -> Self {
        Self {
            desk,
            passenger_id: passenger_id.into(),
        }
    }
}

#[async_trait]
impl UserContextFetcher for DeskContext {
    async fn fetch_user_context(&self, thread_id: &str) -> Result<Value> {
        let flights = self.desk.flights_for(&self.passenger_id).await;
        debug!(thread_id, flights = flights.len(), "Fetched passenger context");
        Ok(json!({
            "passenger_id": self.passenger_id,
            "flights": flights,
        }))
    }
}
