use axum::{extract::State, routing::post, Json, Router};
use studypilot_core::recommend_difficulty;
use studypilot_schema::{
    DifficultyAdjustRequest, DifficultyAdjustResponse, ExamFlashcardRequest,
    ExamSimulationRequest, FlashcardBatch, TrapCardRequest,
};

use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/exam-grade", post(exam_grade))
        .route("/trap", post(trap))
        .route("/exam-simulation", post(exam_simulation))
        .route("/adjust-difficulty", post(adjust_difficulty))
}

async fn exam_grade(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ExamFlashcardRequest>,
) -> ApiResult<FlashcardBatch> {
    Ok(Json(state.flashcards.generate_exam_grade(&body).await?))
}

async fn trap(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TrapCardRequest>,
) -> ApiResult<FlashcardBatch> {
    Ok(Json(state.flashcards.generate_trap_cards(&body).await?))
}

async fn exam_simulation(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ExamSimulationRequest>,
) -> ApiResult<FlashcardBatch> {
    Ok(Json(state.flashcards.generate_exam_simulation(&body).await?))
}

async fn adjust_difficulty(
    ApiJson(body): ApiJson<DifficultyAdjustRequest>,
) -> ApiResult<DifficultyAdjustResponse> {
    Ok(Json(DifficultyAdjustResponse {
        recommended: recommend_difficulty(&body.performance, body.current),
    }))
}
