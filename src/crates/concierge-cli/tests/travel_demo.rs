use chrono::Utc;
use concierge_checkpoint::InMemoryCheckpointSaver;
use concierge_cli::app;
use concierge_cli::config::{AppConfig, CheckpointBackend};
use concierge_cli::travel::{travel_graph, DeskContext, KeywordPolicy, TravelDesk, BOOK_HOTEL, UPDATE_FLIGHT};
use concierge_core::{ApprovalDecision, AutoApprove, GraphEngine, TurnOutcome};
use std::sync::Arc;

const PASSENGER: &str = "3442 587242";

fn engine() -> (GraphEngine, Arc<TravelDesk>) {
    let desk = Arc::new(TravelDesk::sample(PASSENGER, Utc::now()));
    let graph = Arc::new(travel_graph(desk.clone()).unwrap());
    let engine = GraphEngine::new(graph, Arc::new(KeywordPolicy), Arc::new(InMemoryCheckpointSaver::new()))
        .with_context_fetcher(Arc::new(DeskContext::new(desk.clone(), PASSENGER)));
    (engine, desk)
}

#[tokio::test]
async fn test_hotel_booking_round_trip() {
    let (engine, desk) = engine();

    let outcome = engine.send("trip", "I need a hotel in Basel").await.unwrap();
    match &outcome {
        TurnOutcome::Completed { reply, active_scope, .. } => {
            assert_eq!(active_scope.as_deref(), Some(BOOK_HOTEL));
            assert!(reply.as_deref().unwrap().contains("Hilton Basel"));
        }
        other => panic!("expected completion, got {other:?}"),
    }

    let outcome = engine.send("trip", "book 1 please").await.unwrap();
    let pending = outcome.pending().expect("booking needs approval");
    assert_eq!(pending.tool_calls[0].name, "book_hotel");

    let outcome = engine.resume("trip", ApprovalDecision::Approve).await.unwrap();
    assert_eq!(outcome.reply(), Some("Hotel 1 successfully booked."));
    assert!(desk.search(concierge_cli::travel::ListingKind::Hotel, None, Some("Hilton")).await[0].booked);

    let outcome = engine.send("trip", "never mind, that's all").await.unwrap();
    match outcome {
        TurnOutcome::Completed { reply, active_scope, .. } => {
            assert_eq!(active_scope, None);
            assert!(reply.unwrap().starts_with("Welcome back"));
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_denied_cancellation_keeps_ticket() {
    let (engine, desk) = engine();

    let outcome = engine.send("cancel", "Please cancel my ticket").await.unwrap();
    let pending = outcome.pending().expect("cancellation needs approval").clone();
    assert_eq!(pending.scope, UPDATE_FLIGHT);
    assert_eq!(pending.tool_calls[0].args["ticket_no"], "7240005432906569");

    let outcome = engine
        .resume("cancel", ApprovalDecision::deny("I changed my mind"))
        .await
        .unwrap();
    assert!(outcome.reply().unwrap().starts_with("That did not go through"));
    assert_eq!(desk.flights_for(PASSENGER).await.len(), 1);

    let outcome = engine
        .run_turn("cancel", "ok, cancel it after all", &AutoApprove)
        .await
        .unwrap();
    assert_eq!(outcome.reply(), Some("Ticket successfully cancelled."));
    assert!(desk.flights_for(PASSENGER).await.is_empty());
}

#[tokio::test]
async fn test_engine_from_config() {
    let mut config = AppConfig::default();
    config.checkpoint.backend = CheckpointBackend::Memory;
    config.engine.max_steps = 20;

    let engine = app::travel_engine(&config).unwrap();
    assert_eq!(engine.config().max_steps, 20);
    assert!(engine.graph().to_mermaid().contains("book_excursion_sensitive_tools"));

    let outcome = engine.send("t", "What is the baggage policy?").await.unwrap();
    assert!(outcome.reply().unwrap().contains("checked bag"));
}
