use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dtos::StageStatus;

/// One named unit of work within a pipeline, with its own status and timing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: Uuid,
    #[serde(alias = "pipeline_id")]
    pub pipeline_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: StageStatus,
    pub position: i32,
    #[serde(alias = "started_at")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(alias = "completed_at")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(alias = "execution_time_seconds")]
    pub execution_time_seconds: Option<f64>,
    #[serde(alias = "error_message")]
    pub error_message: Option<String>,
}

/// Rewrites a requested stage name into its display form: underscores become
/// spaces and each word is capitalized, so `"data_generation"` matches the
/// stored `"Data Generation"`.
pub fn normalize_stage_name(requested: &str) -> String {
    requested
        .split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lookup predicate for stage names. Callers pass raw and normalized forms
/// interchangeably; normalization happens here, at read time, never when the
/// stage is written.
pub fn stage_name_matches(stored: &str, requested: &str) -> bool {
    stored.eq_ignore_ascii_case(requested)
        || stored.eq_ignore_ascii_case(&normalize_stage_name(requested))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_underscores_and_casing() {
        assert_eq!(normalize_stage_name("data_generation"), "Data Generation");
        assert_eq!(normalize_stage_name("SPARK processing"), "Spark Processing");
        assert_eq!(normalize_stage_name("export"), "Export");
    }

    #[test]
    fn matches_raw_and_normalized_forms() {
        assert!(stage_name_matches("Data Generation", "Data Generation"));
        assert!(stage_name_matches("Data Generation", "data generation"));
        assert!(stage_name_matches("Data Generation", "data_generation"));
        assert!(stage_name_matches("DBT Transformation", "dbt_transformation"));
        assert!(!stage_name_matches("Data Generation", "data_ingestion"));
    }
}
