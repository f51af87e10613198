//! The status-update protocol: the single mutation path for stage and
//! pipeline status. Applies one transition, then derives the pipeline-level
//! status from the per-stage outcomes.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::dtos::{StageStatus, StatusUpdate};
use crate::entities::{Pipeline, Stage};
use crate::store::{PipelineStore, PipelineUpdate, StageUpdate, StoreError};

/// Result of applying a status update. Absence of the pipeline or stage is a
/// first-class outcome, distinguishable from a transport failure.
#[derive(Debug)]
pub enum UpdateOutcome {
    Applied {
        pipeline: Pipeline,
        stage: Option<Stage>,
    },
    PipelineNotFound,
    StageNotFound,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied { .. })
    }
}

#[derive(Clone)]
pub struct StatusProtocol {
    store: Arc<dyn PipelineStore>,
}

impl StatusProtocol {
    pub fn new(store: Arc<dyn PipelineStore>) -> Self {
        Self { store }
    }

    /// Applies a stage or whole-pipeline status transition.
    ///
    /// Stage updates are idempotent for repeated `running`/`completed`
    /// deliveries: the store keeps the first `started_at`/`completed_at`.
    /// A `failed` stage immediately fails the whole pipeline and copies the
    /// stage's error message onto it.
    pub async fn apply(&self, update: StatusUpdate) -> Result<UpdateOutcome, StoreError> {
        let Some(pipeline) = self.store.get_pipeline(update.pipeline_id).await? else {
            return Ok(UpdateOutcome::PipelineNotFound);
        };

        let Some(stage_name) = update.stage_name.as_deref() else {
            return self.apply_to_pipeline(pipeline, &update).await;
        };

        let Some(stage) = self
            .store
            .find_stage_by_name(pipeline.id, stage_name)
            .await?
        else {
            return Ok(UpdateOutcome::StageNotFound);
        };

        let now = Utc::now();
        let mut stage_update = StageUpdate {
            status: Some(update.status),
            error_message: update.error_message.clone(),
            ..Default::default()
        };

        match update.status {
            StageStatus::Running => {
                stage_update.started_at = Some(now);
            }
            StageStatus::Completed => {
                stage_update.completed_at = Some(now);
                stage_update.execution_time_seconds = stage
                    .started_at
                    .map(|started_at| (now - started_at).num_milliseconds() as f64 / 1000.0);
            }
            _ => {}
        }

        let stage = self.store.update_stage(stage.id, stage_update).await?;
        debug!(
            "Applied {:?} to stage '{stage_name}' of pipeline {}",
            update.status, pipeline.id
        );

        let pipeline = match update.status {
            StageStatus::Completed => self.promote_if_all_completed(pipeline).await?,
            StageStatus::Failed => {
                // Fail-fast: the first failed stage wins, regardless of what
                // the remaining stages do afterwards.
                warn!(
                    "Stage '{stage_name}' of pipeline {} failed: {:?}",
                    pipeline.id, update.error_message
                );
                self.store
                    .update_pipeline(
                        pipeline.id,
                        PipelineUpdate {
                            status: Some(StageStatus::Failed),
                            error_message: update.error_message.clone(),
                            ..Default::default()
                        },
                    )
                    .await?
                    .unwrap_or(pipeline)
            }
            _ => pipeline,
        };

        Ok(UpdateOutcome::Applied { pipeline, stage })
    }

    async fn apply_to_pipeline(
        &self,
        pipeline: Pipeline,
        update: &StatusUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let updated = self
            .store
            .update_pipeline(
                pipeline.id,
                PipelineUpdate {
                    status: Some(update.status),
                    error_message: update.error_message.clone(),
                    // Only assigned when explicitly provided; omission must
                    // not reset it.
                    records_processed: update.records_processed,
                    ..Default::default()
                },
            )
            .await?
            .unwrap_or(pipeline);

        Ok(UpdateOutcome::Applied {
            pipeline: updated,
            stage: None,
        })
    }

    async fn promote_if_all_completed(
        &self,
        pipeline: Pipeline,
    ) -> Result<Pipeline, StoreError> {
        // Failure is sticky; a failed pipeline is never promoted.
        if pipeline.status == StageStatus::Failed {
            return Ok(pipeline);
        }

        let stages = self.store.get_stages(pipeline.id).await?;
        if stages.is_empty() || !stages.iter().all(|s| s.status == StageStatus::Completed) {
            return Ok(pipeline);
        }

        let updated = self
            .store
            .update_pipeline(
                pipeline.id,
                PipelineUpdate {
                    status: Some(StageStatus::Completed),
                    ..Default::default()
                },
            )
            .await?
            .unwrap_or(pipeline);

        debug!("All stages of pipeline {} completed", updated.id);

        Ok(updated)
    }
}
