use axum::{extract::State, routing::post, Json, Router};
use studypilot_schema::{StudyPlanRequest, StudyPlanResponse};

use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/create", post(create_plan))
}

async fn create_plan(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<StudyPlanRequest>,
) -> ApiResult<StudyPlanResponse> {
    Ok(Json(state.orchestrator.create_study_plan(&body).await?))
}
