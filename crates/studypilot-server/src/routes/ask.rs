use axum::{extract::State, routing::post, Json, Router};
use studypilot_schema::{AskRequest, AskResponse};

use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/intelligent-ask", post(intelligent_ask))
}

async fn intelligent_ask(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AskRequest>,
) -> ApiResult<AskResponse> {
    let response = state.orchestrator.ask(body).await?;
    Ok(Json(response))
}
