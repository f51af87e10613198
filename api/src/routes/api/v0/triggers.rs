use axum::extract::{Path, State};
use axum::Json;
use hyper::StatusCode;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use db::dtos::{PipelineRunPayload, StageStatus, StatusUpdate, RUN_SUBJECT};

use crate::app_state::{AppState, Nats};
use crate::utils::internal_error;

/// Marks the pipeline running and hands the run to the worker. Returns an
/// acknowledgement immediately, not the final result.
pub async fn trigger(
    State(state): State<AppState>,
    State(Nats(nats)): State<Nats>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    state
        .store
        .get_pipeline(id)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state
        .protocol
        .apply(StatusUpdate::for_pipeline(id, StageStatus::Running))
        .await
        .map_err(internal_error)?;

    let payload = PipelineRunPayload {
        pipeline_id: id,
        record_count: 1000,
    };
    let payload = serde_json::to_vec(&payload).map_err(internal_error)?;

    nats.publish(RUN_SUBJECT, payload.into())
        .await
        .map_err(internal_error)?;

    info!("Pipeline {id} triggered");

    Ok(Json(json!({
        "success": true,
        "message": format!("Pipeline {id} triggered"),
    })))
}
