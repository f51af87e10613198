use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StageStatus;

/// Payload accepted by the status-update entry point, for both
/// single-stage and whole-pipeline transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(alias = "pipeline_id")]
    pub pipeline_id: Uuid,
    #[serde(default, alias = "stage_name")]
    pub stage_name: Option<String>,
    pub status: StageStatus,
    #[serde(default, alias = "error_message")]
    pub error_message: Option<String>,
    #[serde(default, alias = "records_processed")]
    pub records_processed: Option<i64>,
}

impl StatusUpdate {
    pub fn for_stage(pipeline_id: Uuid, stage_name: &str, status: StageStatus) -> Self {
        Self {
            pipeline_id,
            stage_name: Some(stage_name.to_string()),
            status,
            error_message: None,
            records_processed: None,
        }
    }

    pub fn for_pipeline(pipeline_id: Uuid, status: StageStatus) -> Self {
        Self {
            pipeline_id,
            stage_name: None,
            status,
            error_message: None,
            records_processed: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_records(mut self, records: i64) -> Self {
        self.records_processed = Some(records);
        self
    }
}
