use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use orchestrator::{StageBody, StageContext, StageError, StageOutput};

use crate::record::Record;

const INGEST_DELAY: Duration = Duration::from_millis(200);

/// Reads the generated dataset back in and hands the records downstream.
pub struct IngestData;

#[async_trait]
impl StageBody for IngestData {
    fn name(&self) -> &'static str {
        "Data Ingestion"
    }

    async fn run(
        &self,
        _ctx: &StageContext,
        input: serde_json::Value,
    ) -> Result<StageOutput, StageError> {
        let Some(path) = input.as_str() else {
            return Err(StageError::msg("no input file to ingest"));
        };

        let raw = tokio::fs::read(path)
            .await
            .map_err(|err| StageError::wrap(format!("failed to read {path}: {err}"), err))?;
        let records: Vec<Record> = serde_json::from_slice(&raw)?;

        tokio::time::sleep(INGEST_DELAY).await;

        info!("Ingested {} records from {path}", records.len());

        let count = records.len();
        Ok(StageOutput::new(serde_json::to_value(records)?)
            .with_message(format!("Successfully ingested {count} records")))
    }
}
