use axum::extract::{Path, Query, State};
use axum::Json;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use db::entities::{Pipeline, Stage};
use db::store::NewPipeline;

use crate::app_state::AppState;
use crate::utils::internal_error;

#[derive(Debug, Serialize)]
pub struct PipelineDetails {
    #[serde(flatten)]
    pub pipeline: Pipeline,
    pub stages: Vec<Stage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineCreateParams {
    pub name: String,
    pub description: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(params): Json<PipelineCreateParams>,
) -> Result<(StatusCode, Json<PipelineDetails>), StatusCode> {
    let pipeline = state
        .store
        .create_pipeline(NewPipeline {
            name: params.name,
            description: params.description,
        })
        .await
        .map_err(internal_error)?;

    let stages = state
        .store
        .get_stages(pipeline.id)
        .await
        .map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(PipelineDetails { pipeline, stages }),
    ))
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Pipeline>>, StatusCode> {
    let pipelines = state
        .store
        .list_pipelines(params.skip, params.limit)
        .await
        .map_err(internal_error)?;

    Ok(Json(pipelines))
}

pub async fn details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PipelineDetails>, StatusCode> {
    let pipeline = state
        .store
        .get_pipeline(id)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let stages = state
        .store
        .get_stages(pipeline.id)
        .await
        .map_err(internal_error)?;

    Ok(Json(PipelineDetails { pipeline, stages }))
}

pub async fn stages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Stage>>, StatusCode> {
    state
        .store
        .get_pipeline(id)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let stages = state.store.get_stages(id).await.map_err(internal_error)?;

    Ok(Json(stages))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let deleted = state
        .store
        .delete_pipeline(id)
        .await
        .map_err(internal_error)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
