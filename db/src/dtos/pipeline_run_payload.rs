use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subject run requests are published on.
pub static RUN_SUBJECT: &str = "pipeline.run";

/// Message published on [`RUN_SUBJECT`] when a pipeline is triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunPayload {
    #[serde(alias = "pipeline_id")]
    pub pipeline_id: Uuid,
    #[serde(default = "default_record_count", alias = "record_count")]
    pub record_count: i64,
}

fn default_record_count() -> i64 {
    1000
}
