use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use db::store::PipelineUpdate;
use orchestrator::{StageBody, StageContext, StageError, StageOutput};

use crate::config::DataConfig;
use crate::record::Record;

/// Envelope written to the output directory.
#[derive(Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub pipeline_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub record_count: usize,
    pub data: Vec<Record>,
}

/// Writes the transformed records out and reports how many were processed.
pub struct ExportData {
    config: DataConfig,
}

impl ExportData {
    pub fn new(config: DataConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StageBody for ExportData {
    fn name(&self) -> &'static str {
        "Data Export"
    }

    async fn run(
        &self,
        ctx: &StageContext,
        input: serde_json::Value,
    ) -> Result<StageOutput, StageError> {
        let records: Vec<Record> = serde_json::from_value(input)?;

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("pipeline_{}_results_{timestamp}.json", ctx.pipeline_id);
        let filepath = self.config.output_dir.join(&filename);

        let envelope = ExportEnvelope {
            pipeline_id: ctx.pipeline_id,
            generated_at: Utc::now(),
            record_count: records.len(),
            data: records,
        };
        tokio::fs::write(&filepath, serde_json::to_vec_pretty(&envelope)?).await?;

        info!("Data exported to {}", filepath.display());

        ctx.store
            .update_pipeline(
                ctx.pipeline_id,
                PipelineUpdate {
                    output_file: Some(filename.clone()),
                    ..Default::default()
                },
            )
            .await?;

        Ok(
            StageOutput::new(serde_json::Value::String(
                filepath.to_string_lossy().into_owned(),
            ))
            .with_records(envelope.record_count as i64)
            .with_message(format!("Data exported to {filename}")),
        )
    }
}
