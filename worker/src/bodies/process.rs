use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use orchestrator::{StageBody, StageContext, StageError, StageOutput};

use crate::record::Record;

/// Stand-in for the Spark job: derives `total_value` per record, with a
/// latency that scales with the batch size.
pub struct SparkProcess;

#[async_trait]
impl StageBody for SparkProcess {
    fn name(&self) -> &'static str {
        "Spark Processing"
    }

    async fn run(
        &self,
        _ctx: &StageContext,
        input: serde_json::Value,
    ) -> Result<StageOutput, StageError> {
        let mut records: Vec<Record> = serde_json::from_value(input)?;

        let delay = (records.len() as f64 * 0.01).min(5.0);
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;

        let now = Utc::now();
        for record in &mut records {
            record.total_value = Some(record.value * record.quantity as f64);
            record.processed_by = Some("spark".to_string());
            record.processed_at = Some(now);
        }

        let count = records.len();
        let avg = if count > 0 {
            records.iter().filter_map(|r| r.total_value).sum::<f64>() / count as f64
        } else {
            0.0
        };
        info!("Processed {count} records with average value {avg:.2}");

        Ok(StageOutput::new(serde_json::to_value(records)?)
            .with_message(format!("Successfully processed {count} records")))
    }
}
