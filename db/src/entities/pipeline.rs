use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dtos::StageStatus;

/// A tracked end-to-end run through a fixed ordered set of stages.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: StageStatus,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updated_at")]
    pub updated_at: DateTime<Utc>,
    #[serde(alias = "input_file")]
    pub input_file: Option<String>,
    #[serde(alias = "output_file")]
    pub output_file: Option<String>,
    #[serde(alias = "flow_run_id")]
    pub flow_run_id: Option<String>,
    #[serde(alias = "records_processed")]
    pub records_processed: i64,
    #[serde(alias = "error_message")]
    pub error_message: Option<String>,
}
