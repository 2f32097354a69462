//! In-memory travel data behind the demo tools

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Minimum lead time before departure for rebooking
const REBOOK_LEAD_TIME_HOURS: i64 = 3;

/// A scheduled flight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flight {
    pub flight_id: i64,
    pub flight_no: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub scheduled_departure: DateTime<Utc>,
    pub status: String,
}

/// A passenger's ticket on a flight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub ticket_no: String,
    pub passenger_id: String,
    pub flight_id: i64,
    pub fare_conditions: String,
}

/// Bookable inventory kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingKind {
    Hotel,
    CarRental,
    Excursion,
}

impl ListingKind {
    /// Human label used in tool results
    pub fn label(&self) -> &'static str {
        match self {
            ListingKind::Hotel => "Hotel",
            ListingKind::CarRental => "Car rental",
            ListingKind::Excursion => "Trip recommendation",
        }
    }

    /// Argument carrying the listing id
    pub fn id_field(&self) -> &'static str {
        match self {
            ListingKind::Hotel => "hotel_id",
            ListingKind::CarRental => "rental_id",
            ListingKind::Excursion => "recommendation_id",
        }
    }
}

/// A hotel, car rental or excursion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub price_tier: String,
    pub booked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Listing {
    fn new(id: i64, name: &str, location: &str, price_tier: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            location: location.to_string(),
            price_tier: price_tier.to_string(),
            booked: false,
            details: None,
        }
    }
}

/// Why a ticket operation was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskRefusal {
    UnknownTicket(String),
    NotOwner { passenger_id: String, ticket_no: String },
    UnknownFlight(i64),
    TooLate(i64),
}

impl std::fmt::Display for DeskRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeskRefusal::UnknownTicket(ticket) => write!(f, "No existing ticket found for the given ticket number {ticket}."),
            DeskRefusal::NotOwner {
                passenger_id,
                ticket_no,
            } => write!(
                f,
                "Current signed-in passenger with ID {passenger_id} not the owner of ticket {ticket_no}"
            ),
            DeskRefusal::UnknownFlight(id) => write!(f, "Invalid new flight ID {id} provided."),
            DeskRefusal::TooLate(id) => write!(
                f,
                "Not permitted to reschedule to flight {id}: departure is less than {REBOOK_LEAD_TIME_HOURS} hours from now."
            ),
        }
    }
}

/// Travel inventory shared by all demo tools
#[derive(Debug, Default)]
pub struct TravelDesk {
    flights: Vec<Flight>,
    tickets: RwLock<Vec<Ticket>>,
    listings: RwLock<HashMap<ListingKind, Vec<Listing>>>,
}

impl TravelDesk {
    /// Create an empty desk
    pub fn new(flights: Vec<Flight>, tickets: Vec<Ticket>) -> Self {
        Self {
            flights,
            tickets: RwLock::new(tickets),
            listings: RwLock::new(HashMap::new()),
        }
    }

    /// Add listings of one kind
    pub fn with_listings(mut self, kind: ListingKind, listings: Vec<Listing>) -> Self {
        self.listings.get_mut().insert(kind, listings);
        self
    }

    /// Demo inventory for one passenger, relative to `now`
    pub fn sample(passenger_id: &str, now: DateTime<Utc>) -> Self {
        let flight = |id: i64, no: &str, from: &str, to: &str, hours: i64| Flight {
            flight_id: id,
            flight_no: no.to_string(),
            departure_airport: from.to_string(),
            arrival_airport: to.to_string(),
            scheduled_departure: now + Duration::hours(hours),
            status: "Scheduled".to_string(),
        };

        let flights = vec![
            flight(19250, "LX0112", "CDG", "BSL", 26),
            flight(19251, "LX0112", "CDG", "BSL", 50),
            flight(19252, "LX0112", "CDG", "BSL", 2),
            flight(20100, "LX0118", "BSL", "ZRH", 74),
        ];
        let tickets = vec![
            Ticket {
                ticket_no: "7240005432906569".to_string(),
                passenger_id: passenger_id.to_string(),
                flight_id: 19250,
                fare_conditions: "Economy".to_string(),
            },
            Ticket {
                ticket_no: "7240005432906570".to_string(),
                passenger_id: "8149 604011".to_string(),
                flight_id: 19250,
                fare_conditions: "Business".to_string(),
            },
        ];

        Self::new(flights, tickets)
            .with_listings(
                ListingKind::Hotel,
                vec![
                    Listing::new(1, "Hilton Basel", "Basel", "Luxury"),
                    Listing::new(2, "Marriott Zurich", "Zurich", "Upscale"),
                    Listing::new(3, "Hyatt Regency Basel", "Basel", "Upper Upscale"),
                    Listing::new(4, "Radisson Blu Lucerne", "Lucerne", "Midscale"),
                ],
            )
            .with_listings(
                ListingKind::CarRental,
                vec![
                    Listing::new(1, "Europcar", "Basel", "Economy"),
                    Listing::new(2, "Avis", "Basel", "Luxury"),
                    Listing::new(3, "Hertz", "Zurich", "Midsize"),
                ],
            )
            .with_listings(
                ListingKind::Excursion,
                vec![
                    Listing::new(1, "Basel Minster", "Basel", "Landmark"),
                    Listing::new(2, "Kunstmuseum Basel", "Basel", "Art"),
                    Listing::new(3, "Mount Pilatus", "Lucerne", "Outdoor"),
                ],
            )
    }

    /// Tickets of a passenger joined with their flights
    pub async fn flights_for(&self, passenger_id: &str) -> Vec<Value> {
        let tickets = self.tickets.read().await;
        tickets
            .iter()
            .filter(|t| t.passenger_id == passenger_id)
            .filter_map(|t| {
                let flight = self.flight(t.flight_id)?;
                Some(json!({
                    "ticket_no": t.ticket_no,
                    "fare_conditions": t.fare_conditions,
                    "flight_id": flight.flight_id,
                    "flight_no": flight.flight_no,
                    "departure_airport": flight.departure_airport,
                    "arrival_airport": flight.arrival_airport,
                    "scheduled_departure": flight.scheduled_departure,
                    "status": flight.status,
                }))
            })
            .collect()
    }

    /// Flights filtered by airports
    pub fn search_flights(&self, from: Option<&str>, to: Option<&str>) -> Vec<Flight> {
        self.flights
            .iter()
            .filter(|f| from.map_or(true, |a| f.departure_airport.eq_ignore_ascii_case(a)))
            .filter(|f| to.map_or(true, |a| f.arrival_airport.eq_ignore_ascii_case(a)))
            .cloned()
            .collect()
    }

    fn flight(&self, flight_id: i64) -> Option<&Flight> {
        self.flights.iter().find(|f| f.flight_id == flight_id)
    }

    /// Move a ticket to another flight
    pub async fn update_ticket(
        &self,
        passenger_id: &str,
        ticket_no: &str,
        new_flight_id: i64,
        now: DateTime<Utc>,
    ) -> Result<String, DeskRefusal> {
        let flight = self
            .flight(new_flight_id)
            .ok_or(DeskRefusal::UnknownFlight(new_flight_id))?;
        if flight.scheduled_departure - now < Duration::hours(REBOOK_LEAD_TIME_HOURS) {
            return Err(DeskRefusal::TooLate(new_flight_id));
        }

        let mut tickets = self.tickets.write().await;
        let ticket = owned_ticket(&mut tickets, passenger_id, ticket_no)?;
        ticket.flight_id = new_flight_id;
        Ok("Ticket successfully updated to new flight.".to_string())
    }

    /// Cancel a ticket
    pub async fn cancel_ticket(&self, passenger_id: &str, ticket_no: &str) -> Result<String, DeskRefusal> {
        let mut tickets = self.tickets.write().await;
        owned_ticket(&mut tickets, passenger_id, ticket_no)?;
        tickets.retain(|t| t.ticket_no != ticket_no);
        Ok("Ticket successfully cancelled.".to_string())
    }

    /// Listings matching a location and name fragment
    pub async fn search(&self, kind: ListingKind, location: Option<&str>, name: Option<&str>) -> Vec<Listing> {
        let listings = self.listings.read().await;
        listings
            .get(&kind)
            .map(|all| {
                all.iter()
                    .filter(|l| location.map_or(true, |loc| contains_ignore_case(&l.location, loc)))
                    .filter(|l| name.map_or(true, |n| contains_ignore_case(&l.name, n)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Book a listing
    pub async fn book(&self, kind: ListingKind, id: i64) -> String {
        self.modify(kind, id, "booked", |l| l.booked = true).await
    }

    /// Change booking details of a listing
    pub async fn update(&self, kind: ListingKind, id: i64, details: Value) -> String {
        self.modify(kind, id, "updated", |l| l.details = Some(details)).await
    }

    /// Cancel a listing booking
    pub async fn cancel(&self, kind: ListingKind, id: i64) -> String {
        self.modify(kind, id, "cancelled", |l| {
            l.booked = false;
            l.details = None;
        })
        .await
    }

    async fn modify(&self, kind: ListingKind, id: i64, verb: &str, f: impl FnOnce(&mut Listing)) -> String {
        let mut listings = self.listings.write().await;
        match listings
            .get_mut(&kind)
            .and_then(|all| all.iter_mut().find(|l| l.id == id))
        {
            Some(listing) => {
                f(listing);
                format!("{} {id} successfully {verb}.", kind.label())
            }
            None => format!("No {} found with ID {id}.", kind.label().to_lowercase()),
        }
    }
}

fn owned_ticket<'a>(
    tickets: &'a mut [Ticket],
    passenger_id: &str,
    ticket_no: &str,
) -> Result<&'a mut Ticket, DeskRefusal> {
    let ticket = tickets
        .iter_mut()
        .find(|t| t.ticket_no == ticket_no)
        .ok_or_else(|| DeskRefusal::UnknownTicket(ticket_no.to_string()))?;
    if ticket.passenger_id != passenger_id {
        return Err(DeskRefusal::NotOwner {
            passenger_id: passenger_id.to_string(),
            ticket_no: ticket_no.to_string(),
        });
    }
    Ok(ticket)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSENGER: &str = "3442 587242";

    fn desk() -> (TravelDesk, DateTime<Utc>) {
        let now = Utc::now();
        (TravelDesk::sample(PASSENGER, now), now)
    }

    #[tokio::test]
    async fn test_flights_for_passenger() {
        let (desk, _) = desk();
        let flights = desk.flights_for(PASSENGER).await;
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0]["flight_no"], "LX0112");
        assert!(desk.flights_for("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_update_ticket_rules() {
        let (desk, now) = desk();

        let too_late = desk.update_ticket(PASSENGER, "7240005432906569", 19252, now).await;
        assert_eq!(too_late, Err(DeskRefusal::TooLate(19252)));

        let not_owner = desk.update_ticket(PASSENGER, "7240005432906570", 19251, now).await;
        assert!(matches!(not_owner, Err(DeskRefusal::NotOwner { .. })));

        let moved = desk.update_ticket(PASSENGER, "7240005432906569", 19251, now).await.unwrap();
        assert!(moved.contains("successfully updated"));
        assert_eq!(desk.flights_for(PASSENGER).await[0]["flight_id"], 19251);
    }

    #[tokio::test]
    async fn test_cancel_ticket_removes_it() {
        let (desk, _) = desk();
        desk.cancel_ticket(PASSENGER, "7240005432906569").await.unwrap();
        assert!(desk.flights_for(PASSENGER).await.is_empty());
        assert_eq!(
            desk.cancel_ticket(PASSENGER, "7240005432906569").await,
            Err(DeskRefusal::UnknownTicket("7240005432906569".to_string()))
        );
    }

    #[tokio::test]
    async fn test_listing_lifecycle() {
        let (desk, _) = desk();
        let basel = desk.search(ListingKind::Hotel, Some("basel"), None).await;
        assert_eq!(basel.len(), 2);

        assert_eq!(desk.book(ListingKind::Hotel, 1).await, "Hotel 1 successfully booked.");
        let hilton = desk.search(ListingKind::Hotel, None, Some("hilton")).await;
        assert!(hilton[0].booked);

        assert_eq!(desk.cancel(ListingKind::Hotel, 1).await, "Hotel 1 successfully cancelled.");
        assert_eq!(
            desk.book(ListingKind::Excursion, 99).await,
            "No trip recommendation found with ID 99."
        );
    }
}
