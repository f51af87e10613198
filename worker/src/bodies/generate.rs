use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;

use db::store::PipelineUpdate;
use orchestrator::{StageBody, StageContext, StageError, StageOutput};

use crate::config::DataConfig;
use crate::record::Record;

/// Writes a fresh sample dataset into the input directory and records its
/// file name on the pipeline.
pub struct GenerateData {
    config: DataConfig,
}

impl GenerateData {
    pub fn new(config: DataConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StageBody for GenerateData {
    fn name(&self) -> &'static str {
        "Data Generation"
    }

    async fn run(
        &self,
        ctx: &StageContext,
        _input: serde_json::Value,
    ) -> Result<StageOutput, StageError> {
        tokio::fs::create_dir_all(&self.config.input_dir).await?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("sample_data_{timestamp}.json");
        let filepath = self.config.input_dir.join(&filename);

        let records = generate_records(ctx.record_count);
        tokio::fs::write(&filepath, serde_json::to_vec_pretty(&records)?).await?;

        ctx.store
            .update_pipeline(
                ctx.pipeline_id,
                PipelineUpdate {
                    input_file: Some(filename.clone()),
                    ..Default::default()
                },
            )
            .await?;

        Ok(
            StageOutput::new(serde_json::Value::String(
                filepath.to_string_lossy().into_owned(),
            ))
            .with_message(format!(
                "Generated {} records to {filename}",
                ctx.record_count
            )),
        )
    }
}

fn generate_records(count: i64) -> Vec<Record> {
    let mut rng = rand::rng();

    (0..count)
        .map(|i| {
            let value = (rng.random_range(10.0..1000.0) * 100.0f64).round() / 100.0;
            let category = ["A", "B", "C", "D"][rng.random_range(0..4)];

            Record::base(
                i,
                format!("Item {i}"),
                category.to_string(),
                value,
                rng.random_range(1..=100),
                rng.random_bool(0.5),
                Utc::now() - Duration::days(rng.random_range(0..=30)),
            )
        })
        .collect()
}
