use axum::extract::State;
use axum::Json;
use hyper::StatusCode;
use serde_json::json;
use tracing::debug;

use db::dtos::StatusUpdate;
use db::protocol::UpdateOutcome;

use crate::app_state::AppState;
use crate::utils::internal_error;

/// Single entry point for out-of-band status callbacks, for both stage and
/// whole-pipeline transitions.
pub async fn update(
    State(state): State<AppState>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    debug!(
        "Status update for pipeline {}: {:?} (stage: {:?})",
        payload.pipeline_id, payload.status, payload.stage_name
    );

    let outcome = state
        .protocol
        .apply(payload)
        .await
        .map_err(internal_error)?;

    match outcome {
        UpdateOutcome::Applied { .. } => Ok(Json(json!({ "success": true }))),
        UpdateOutcome::PipelineNotFound | UpdateOutcome::StageNotFound => {
            Err(StatusCode::NOT_FOUND)
        }
    }
}
