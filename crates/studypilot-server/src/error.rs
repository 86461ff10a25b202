use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use studypilot_core::StudyError;

/// Maps core failures onto `{"detail": ...}` responses.
#[derive(Debug)]
pub struct ApiError(pub StudyError);

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        Self(err)
    }
}

/// Malformed or incomplete bodies are bad input, not unprocessable output.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(StudyError::invalid(rejection.body_text()))
    }
}

/// JSON body extractor whose rejections use the `{"detail"}` contract.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StudyError::InputValidation(_) => StatusCode::BAD_REQUEST,
            StudyError::Generation(_) => StatusCode::BAD_GATEWAY,
            StudyError::GenerationFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        } else {
            tracing::warn!("request rejected: {}", self.0);
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
