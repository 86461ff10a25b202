use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub generation: &'static str,
    pub memory: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let generation = match &state.probes.generation {
        Some(provider) => probe("generation", provider.health().await),
        None => "not_configured",
    };
    let memory = match &state.probes.memory {
        Some(retriever) => probe("memory", retriever.health().await),
        None => "not_configured",
    };

    Json(HealthResponse {
        status: if generation == "unavailable" {
            "degraded"
        } else {
            "healthy"
        },
        service: "ai",
        generation,
        memory,
    })
}

fn probe(name: &str, result: anyhow::Result<()>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("{name} health check failed: {e:#}");
            "unavailable"
        }
    }
}
