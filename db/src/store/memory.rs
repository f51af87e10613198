use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dtos::StageStatus;
use crate::entities::{stage_name_matches, Pipeline, Stage};
use crate::stages::default_stages;

use super::{NewPipeline, PipelineStore, PipelineUpdate, StageUpdate, StoreError};

/// In-memory store with the same contract as the Postgres one, including
/// creation ordering and the set-at-most-once timestamp guards. Backs tests
/// and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    pipelines: HashMap<Uuid, Pipeline>,
    // Creation order; list_pipelines walks it in reverse.
    pipeline_order: Vec<Uuid>,
    stages: HashMap<Uuid, Stage>,
    stage_order: HashMap<Uuid, Vec<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn create_pipeline(&self, new: NewPipeline) -> Result<Pipeline, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let pipeline = Pipeline {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            status: StageStatus::Pending,
            created_at: now,
            updated_at: now,
            input_file: None,
            output_file: None,
            flow_run_id: None,
            records_processed: 0,
            error_message: None,
        };

        let mut stage_ids = Vec::new();

        for (position, def) in default_stages().iter().enumerate() {
            let stage = Stage {
                id: Uuid::new_v4(),
                pipeline_id: pipeline.id,
                name: def.name.to_string(),
                description: Some(def.description.to_string()),
                status: StageStatus::Pending,
                position: position as i32,
                started_at: None,
                completed_at: None,
                execution_time_seconds: None,
                error_message: None,
            };
            stage_ids.push(stage.id);
            inner.stages.insert(stage.id, stage);
        }

        inner.stage_order.insert(pipeline.id, stage_ids);
        inner.pipeline_order.push(pipeline.id);
        inner.pipelines.insert(pipeline.id, pipeline.clone());

        Ok(pipeline)
    }

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.pipelines.get(&id).cloned())
    }

    async fn list_pipelines(&self, skip: i64, limit: i64) -> Result<Vec<Pipeline>, StoreError> {
        let inner = self.inner.read().await;

        Ok(inner
            .pipeline_order
            .iter()
            .rev()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .filter_map(|id| inner.pipelines.get(id).cloned())
            .collect())
    }

    async fn update_pipeline(
        &self,
        id: Uuid,
        update: PipelineUpdate,
    ) -> Result<Option<Pipeline>, StoreError> {
        let mut inner = self.inner.write().await;

        let Some(pipeline) = inner.pipelines.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            pipeline.name = name;
        }
        if let Some(description) = update.description {
            pipeline.description = Some(description);
        }
        if let Some(status) = update.status {
            pipeline.status = status;
        }
        if let Some(input_file) = update.input_file {
            pipeline.input_file = Some(input_file);
        }
        if let Some(output_file) = update.output_file {
            pipeline.output_file = Some(output_file);
        }
        if let Some(flow_run_id) = update.flow_run_id {
            pipeline.flow_run_id = Some(flow_run_id);
        }
        if let Some(records_processed) = update.records_processed {
            pipeline.records_processed = records_processed;
        }
        if let Some(error_message) = update.error_message {
            pipeline.error_message = Some(error_message);
        }
        pipeline.updated_at = Utc::now();

        Ok(Some(pipeline.clone()))
    }

    async fn get_stages(&self, pipeline_id: Uuid) -> Result<Vec<Stage>, StoreError> {
        let inner = self.inner.read().await;

        Ok(inner
            .stage_order
            .get(&pipeline_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.stages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_stage_by_name(
        &self,
        pipeline_id: Uuid,
        name: &str,
    ) -> Result<Option<Stage>, StoreError> {
        let stages = self.get_stages(pipeline_id).await?;

        Ok(stages
            .into_iter()
            .find(|stage| stage_name_matches(&stage.name, name)))
    }

    async fn update_stage(
        &self,
        id: Uuid,
        update: StageUpdate,
    ) -> Result<Option<Stage>, StoreError> {
        let mut inner = self.inner.write().await;

        let Some(stage) = inner.stages.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(status) = update.status {
            stage.status = status;
        }
        if let Some(started_at) = update.started_at {
            stage.started_at.get_or_insert(started_at);
        }
        if let Some(completed_at) = update.completed_at {
            stage.completed_at.get_or_insert(completed_at);
        }
        if let Some(execution_time) = update.execution_time_seconds {
            stage.execution_time_seconds.get_or_insert(execution_time);
        }
        if let Some(error_message) = update.error_message {
            stage.error_message = Some(error_message);
        }

        Ok(Some(stage.clone()))
    }

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.pipelines.remove(&id).is_none() {
            return Ok(false);
        }

        inner.pipeline_order.retain(|pipeline_id| *pipeline_id != id);

        if let Some(stage_ids) = inner.stage_order.remove(&id) {
            for stage_id in stage_ids {
                inner.stages.remove(&stage_id);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_pipeline(name: &str) -> NewPipeline {
        NewPipeline {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn creates_pipeline_with_all_registry_stages_pending() {
        let store = MemoryStore::new();
        let pipeline = store.create_pipeline(new_pipeline("demo")).await.unwrap();

        assert_eq!(pipeline.status, StageStatus::Pending);
        assert_eq!(pipeline.records_processed, 0);

        let stages = store.get_stages(pipeline.id).await.unwrap();
        assert_eq!(stages.len(), default_stages().len());
        assert!(stages.iter().all(|s| s.status == StageStatus::Pending));

        let names: Vec<_> = stages.iter().map(|s| s.name.as_str()).collect();
        let expected: Vec<_> = default_stages().iter().map(|s| s.name).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn lists_newest_first_with_pagination() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .create_pipeline(new_pipeline(&format!("p{i}")))
                .await
                .unwrap();
        }

        let page = store.list_pipelines(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "p3");
        assert_eq!(page[1].name, "p2");
    }

    #[tokio::test]
    async fn stage_timestamps_are_set_at_most_once() {
        let store = MemoryStore::new();
        let pipeline = store.create_pipeline(new_pipeline("demo")).await.unwrap();
        let stage = store
            .find_stage_by_name(pipeline.id, "Data Generation")
            .await
            .unwrap()
            .unwrap();

        let first = Utc::now();
        store
            .update_stage(
                stage.id,
                StageUpdate {
                    started_at: Some(first),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let later = first + chrono::Duration::seconds(30);
        let updated = store
            .update_stage(
                stage.id,
                StageUpdate {
                    started_at: Some(later),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.started_at, Some(first));
    }

    #[tokio::test]
    async fn update_without_records_processed_leaves_it_unchanged() {
        let store = MemoryStore::new();
        let pipeline = store.create_pipeline(new_pipeline("demo")).await.unwrap();

        store
            .update_pipeline(
                pipeline.id,
                PipelineUpdate {
                    records_processed: Some(42),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = store
            .update_pipeline(
                pipeline.id,
                PipelineUpdate {
                    status: Some(StageStatus::Running),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.records_processed, 42);
        assert_eq!(updated.status, StageStatus::Running);
    }

    #[tokio::test]
    async fn delete_cascades_to_stages() {
        let store = MemoryStore::new();
        let pipeline = store.create_pipeline(new_pipeline("demo")).await.unwrap();

        assert!(store.delete_pipeline(pipeline.id).await.unwrap());
        assert!(store.get_pipeline(pipeline.id).await.unwrap().is_none());
        assert!(store.get_stages(pipeline.id).await.unwrap().is_empty());

        // Second delete reports absence, not an error.
        assert!(!store.delete_pipeline(pipeline.id).await.unwrap());
    }
}
