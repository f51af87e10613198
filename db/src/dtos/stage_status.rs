use serde::{Deserialize, Serialize};

#[derive(sqlx::Type, Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[sqlx(type_name = "stage_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Failed)
    }
}
