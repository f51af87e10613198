use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::entities::{stage_name_matches, Pipeline, Stage};
use crate::stages::default_stages;

use super::{NewPipeline, PipelineStore, PipelineUpdate, StageUpdate, StoreConfig, StoreError};

/// Postgres-backed store. Queries are runtime-bound so the crate builds
/// without a live database; the schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgPipelineStore {
    pool: PgPool,
}

impl PgPipelineStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn create_pipeline(&self, new: NewPipeline) -> Result<Pipeline, StoreError> {
        let mut tx = self.pool.begin().await?;

        let pipeline = sqlx::query_as::<Postgres, Pipeline>(
            r"
            INSERT INTO pipelines (name, description)
            VALUES ($1, $2)
            RETURNING *
            ",
        )
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&mut *tx)
        .await?;

        for (position, stage) in default_stages().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO pipeline_stages (pipeline_id, name, description, position)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(pipeline.id)
            .bind(stage.name)
            .bind(stage.description)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(pipeline)
    }

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        let pipeline =
            sqlx::query_as::<Postgres, Pipeline>("SELECT * FROM pipelines WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(pipeline)
    }

    async fn list_pipelines(&self, skip: i64, limit: i64) -> Result<Vec<Pipeline>, StoreError> {
        let pipelines = sqlx::query_as::<Postgres, Pipeline>(
            r"
            SELECT * FROM pipelines
            ORDER BY created_at DESC
            OFFSET $1 LIMIT $2
            ",
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(pipelines)
    }

    async fn update_pipeline(
        &self,
        id: Uuid,
        update: PipelineUpdate,
    ) -> Result<Option<Pipeline>, StoreError> {
        let pipeline = sqlx::query_as::<Postgres, Pipeline>(
            r"
            UPDATE pipelines
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                input_file = COALESCE($5, input_file),
                output_file = COALESCE($6, output_file),
                flow_run_id = COALESCE($7, flow_run_id),
                records_processed = COALESCE($8, records_processed),
                error_message = COALESCE($9, error_message),
                updated_at = current_timestamp
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.status)
        .bind(update.input_file)
        .bind(update.output_file)
        .bind(update.flow_run_id)
        .bind(update.records_processed)
        .bind(update.error_message)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pipeline)
    }

    async fn get_stages(&self, pipeline_id: Uuid) -> Result<Vec<Stage>, StoreError> {
        let stages = sqlx::query_as::<Postgres, Stage>(
            r"
            SELECT * FROM pipeline_stages
            WHERE pipeline_id = $1
            ORDER BY position
            ",
        )
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stages)
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
        // started_at, completed_at and execution_time_seconds keep their
        // first value; status and error_message take the latest one.
        let stage = sqlx::query_as::<Postgres, Stage>(
            r"
            UPDATE pipeline_stages
            SET
                status = COALESCE($2, status),
                started_at = COALESCE(started_at, $3),
                completed_at = COALESCE(completed_at, $4),
                execution_time_seconds = COALESCE(execution_time_seconds, $5),
                error_message = COALESCE($6, error_message)
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(update.status)
        .bind(update.started_at)
        .bind(update.completed_at)
        .bind(update.execution_time_seconds)
        .bind(update.error_message)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stage)
    }

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pipelines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
