//! The seam between the flow runner and stage implementations. Artifacts
//! flow between stages as JSON values; a stage consumes the previous stage's
//! output and produces its own.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use db::store::{PipelineStore, StoreError};

/// Handed to every stage body. The store handle is for direct field updates
/// (input/output file names); status never goes through it directly.
#[derive(Clone)]
pub struct StageContext {
    pub pipeline_id: Uuid,
    pub record_count: i64,
    pub store: Arc<dyn PipelineStore>,
}

#[derive(Debug, Default)]
pub struct StageOutput {
    pub artifact: serde_json::Value,
    pub records_processed: Option<i64>,
    pub message: Option<String>,
}

impl StageOutput {
    pub fn new(artifact: serde_json::Value) -> Self {
        Self {
            artifact,
            records_processed: None,
            message: None,
        }
    }

    pub fn with_records(mut self, records: i64) -> Self {
        self.records_processed = Some(records);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A failed stage body. The message is what ends up verbatim on the stage
/// (and, through fail-fast propagation, on the pipeline).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct StageError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StageError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn wrap(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<std::io::Error> for StageError {
    fn from(error: std::io::Error) -> Self {
        let message = error.to_string();
        Self::wrap(message, error)
    }
}

impl From<serde_json::Error> for StageError {
    fn from(error: serde_json::Error) -> Self {
        let message = error.to_string();
        Self::wrap(message, error)
    }
}

impl From<StoreError> for StageError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        Self::wrap(message, error)
    }
}

#[async_trait]
pub trait StageBody: Send + Sync {
    /// Must match the registry name of the stage this body implements.
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        ctx: &StageContext,
        input: serde_json::Value,
    ) -> Result<StageOutput, StageError>;
}
