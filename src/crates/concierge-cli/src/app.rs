//! Wiring configuration into a running engine

use chrono::Utc;
use concierge_checkpoint::{
    BincodeSerializer, CheckpointSaver, FileCheckpointSaver, InMemoryCheckpointSaver, JsonSerializer,
};
use concierge_core::GraphEngine;
use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, CheckpointBackend, CheckpointConfig, CheckpointFormat};
use crate::travel::{travel_graph, DeskContext, KeywordPolicy, TravelDesk};

/// Open the checkpoint store selected by the config
pub fn checkpointer(config: &CheckpointConfig) -> Arc<dyn CheckpointSaver> {
    match (config.backend, config.format) {
        (CheckpointBackend::Memory, _) => Arc::new(InMemoryCheckpointSaver::new()),
        (CheckpointBackend::File, CheckpointFormat::Json) => Arc::new(
            FileCheckpointSaver::with_serializer(config.resolved_path(), JsonSerializer),
        ),
        (CheckpointBackend::File, CheckpointFormat::Bincode) => Arc::new(
            FileCheckpointSaver::with_serializer(config.resolved_path(), BincodeSerializer),
        ),
    }
}

/// Build the demo travel engine
pub fn travel_engine(config: &AppConfig) -> anyhow::Result<GraphEngine> {
    let desk = Arc::new(TravelDesk::sample(&config.demo.passenger_id, Utc::now()));
    let graph = Arc::new(travel_graph(desk.clone())?);

    info!(
        backend = ?config.checkpoint.backend,
        format = ?config.checkpoint.format,
        scopes = graph.scopes().len(),
        "Starting travel engine"
    );

    let engine = GraphEngine::new(graph, Arc::new(KeywordPolicy), checkpointer(&config.checkpoint))
        .with_context_fetcher(Arc::new(DeskContext::new(desk, config.demo.passenger_id.clone())))
        .with_config(config.engine.clone())?;
    Ok(engine)
}
