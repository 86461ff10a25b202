pub mod ask;
pub mod flashcards;
pub mod health;
pub mod plan;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new().nest("/ai", ai_router())
}

fn ai_router() -> Router<AppState> {
    Router::new()
        .merge(ask::router())
        .nest("/flashcards", flashcards::router())
        .nest("/plan", plan::router())
        .merge(health::router())
}
