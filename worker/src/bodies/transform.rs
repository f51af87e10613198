use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use orchestrator::{StageBody, StageContext, StageError, StageOutput};

use crate::record::Record;

const TRANSFORM_DELAY: Duration = Duration::from_millis(500);

const HIGH_VALUE_THRESHOLD: f64 = 5000.0;
const STANDARD_THRESHOLD: f64 = 1000.0;

/// Stand-in for the dbt models: tiers each record by total value and adds
/// per-category averages.
pub struct DbtTransform;

#[async_trait]
impl StageBody for DbtTransform {
    fn name(&self) -> &'static str {
        "DBT Transformation"
    }

    async fn run(
        &self,
        _ctx: &StageContext,
        input: serde_json::Value,
    ) -> Result<StageOutput, StageError> {
        let mut records: Vec<Record> = serde_json::from_value(input)?;

        tokio::time::sleep(TRANSFORM_DELAY).await;

        let mut totals: HashMap<String, (f64, u64)> = HashMap::new();
        for record in &records {
            let entry = totals.entry(record.category.clone()).or_default();
            entry.0 += record.total_value.unwrap_or(0.0);
            entry.1 += 1;
        }

        let now = Utc::now();
        for record in &mut records {
            let total_value = record.total_value.unwrap_or(0.0);

            record.is_high_value = Some(total_value > HIGH_VALUE_THRESHOLD);
            record.tier = Some(
                if total_value > HIGH_VALUE_THRESHOLD {
                    "premium"
                } else if total_value > STANDARD_THRESHOLD {
                    "standard"
                } else {
                    "basic"
                }
                .to_string(),
            );
            record.category_avg_value = totals
                .get(&record.category)
                .map(|(sum, count)| sum / *count as f64);
            record.transformed_by = Some("dbt".to_string());
            record.transformed_at = Some(now);
        }

        let count = records.len();
        let categories = totals.len();
        info!("Transformed {count} records across {categories} categories");

        Ok(StageOutput::new(serde_json::to_value(records)?).with_message(format!(
            "Successfully transformed {count} records across {categories} categories"
        )))
    }
}
