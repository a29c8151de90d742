use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{error::AppError, models::client::ProgressResponse, state::AppState};

/// Liveness probe used by the deployment.
pub async fn health() -> &'static str {
    "200"
}

/// Practice progress of one client.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let client_id = Uuid::parse_str(&client_id)
        .map_err(|_| AppError::BadRequest(format!("'{client_id}' is not a valid client id")))?;

    let profile = state
        .clients
        .get_client(client_id)
        .await?
        .ok_or(AppError::NotFound("Client not found".to_string()))?;

    Ok(Json(ProgressResponse {
        client_id: profile.client_id,
        practice_index: profile.practice_index,
        hard_questions: profile.practice_hard_questions.len(),
        total_questions: state.config.total_questions,
    }))
}
