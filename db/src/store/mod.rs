//! The pipeline state store port: durable CRUD over pipelines and their
//! stages. Unknown ids come back as `None`/`false`; `StoreError` is reserved
//! for transport-level failures.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgPipelineStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dtos::StageStatus;
use crate::entities::{Pipeline, Stage};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Connection settings, read from the environment by the binaries and passed
/// in explicitly.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct NewPipeline {
    pub name: String,
    pub description: Option<String>,
}

/// Field-level pipeline update. `None` leaves the field untouched;
/// `updated_at` is always refreshed.
#[derive(Debug, Clone, Default)]
pub struct PipelineUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<StageStatus>,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub flow_run_id: Option<String>,
    pub records_processed: Option<i64>,
    pub error_message: Option<String>,
}

/// Field-level stage update. `started_at`, `completed_at` and
/// `execution_time_seconds` are applied only when the stored value is still
/// unset, so duplicate delivery of `running`/`completed` never moves a
/// timestamp.
#[derive(Debug, Clone, Default)]
pub struct StageUpdate {
    pub status: Option<StageStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_seconds: Option<f64>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Inserts a pipeline plus one pending stage per registry entry, as a
    /// single logical unit.
    async fn create_pipeline(&self, new: NewPipeline) -> Result<Pipeline, StoreError>;

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError>;

    /// Pipelines ordered by `created_at` descending.
    async fn list_pipelines(&self, skip: i64, limit: i64) -> Result<Vec<Pipeline>, StoreError>;

    async fn update_pipeline(
        &self,
        id: Uuid,
        update: PipelineUpdate,
    ) -> Result<Option<Pipeline>, StoreError>;

    /// Stages in creation (registry) order.
    async fn get_stages(&self, pipeline_id: Uuid) -> Result<Vec<Stage>, StoreError>;

    /// Case-insensitive lookup matching both the raw name and its
    /// underscores-to-spaces capitalized form.
    async fn find_stage_by_name(
        &self,
        pipeline_id: Uuid,
        name: &str,
    ) -> Result<Option<Stage>, StoreError>;

    async fn update_stage(
        &self,
        id: Uuid,
        update: StageUpdate,
    ) -> Result<Option<Stage>, StoreError>;

    /// Deletes the pipeline and, by cascade, its stages.
    async fn delete_pipeline(&self, id: Uuid) -> Result<bool, StoreError>;
}
