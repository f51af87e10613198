//! The five simulated stage bodies. Each consumes the previous stage's
//! artifact and produces its own; failures are returned to the runner, which
//! reports them and halts the flow.

mod export;
mod generate;
mod ingest;
mod process;
mod transform;

pub use export::ExportData;
pub use generate::GenerateData;
pub use ingest::IngestData;
pub use process::SparkProcess;
pub use transform::DbtTransform;

use std::sync::Arc;

use orchestrator::StageBody;

use crate::config::DataConfig;

/// Bodies in registry order.
pub fn default_bodies(config: &DataConfig) -> Vec<Arc<dyn StageBody>> {
    vec![
        Arc::new(GenerateData::new(config.clone())),
        Arc::new(IngestData),
        Arc::new(SparkProcess),
        Arc::new(DbtTransform),
        Arc::new(ExportData::new(config.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use db::dtos::StageStatus;
    use db::protocol::StatusProtocol;
    use db::store::{MemoryStore, NewPipeline, PipelineStore};
    use orchestrator::{
        FlowError, FlowRunner, ProtocolReporter, StageContext, StageError, StageOutput,
    };

    use super::*;
    use crate::record::Record;

    async fn setup(config: &DataConfig) -> (FlowRunner, Arc<MemoryStore>, uuid::Uuid) {
        let store = Arc::new(MemoryStore::new());
        let pipeline = store
            .create_pipeline(NewPipeline {
                name: "demo".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let reporter = Arc::new(ProtocolReporter::new(StatusProtocol::new(store.clone())));
        let runner = FlowRunner::new(store.clone(), reporter, default_bodies(config));

        (runner, store, pipeline.id)
    }

    #[tokio::test]
    async fn full_flow_completes_and_exports_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig {
            input_dir: dir.path().join("input"),
            output_dir: dir.path().join("output"),
        };
        let (runner, store, pipeline_id) = setup(&config).await;

        let outcome = runner.run(pipeline_id, 25).await.unwrap();
        assert_eq!(outcome.records_processed, Some(25));

        let pipeline = store.get_pipeline(pipeline_id).await.unwrap().unwrap();
        assert_eq!(pipeline.status, StageStatus::Completed);
        assert_eq!(pipeline.records_processed, 25);

        let input_file = pipeline.input_file.expect("input file recorded");
        assert!(config.input_dir.join(&input_file).exists());

        let output_file = pipeline.output_file.expect("output file recorded");
        let raw = std::fs::read(config.output_dir.join(&output_file)).unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(envelope["record_count"], 25);

        let records: Vec<Record> =
            serde_json::from_value(envelope["data"].clone()).unwrap();
        assert_eq!(records.len(), 25);
        for record in &records {
            assert!(record.total_value.is_some());
            assert!(record.tier.is_some());
            assert!(record.category_avg_value.is_some());
        }
    }

    /// Hands the ingestion stage a path that does not exist.
    struct GhostFile;

    #[async_trait]
    impl orchestrator::StageBody for GhostFile {
        fn name(&self) -> &'static str {
            "Data Generation"
        }

        async fn run(
            &self,
            _ctx: &StageContext,
            _input: serde_json::Value,
        ) -> Result<StageOutput, StageError> {
            Ok(StageOutput::new(serde_json::Value::String(
                "/nonexistent/sample_data.json".to_string(),
            )))
        }
    }

    #[tokio::test]
    async fn ingestion_failure_fails_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig {
            input_dir: dir.path().join("input"),
            output_dir: dir.path().join("output"),
        };

        let store = Arc::new(MemoryStore::new());
        let pipeline = store
            .create_pipeline(NewPipeline {
                name: "demo".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let mut bodies = default_bodies(&config);
        bodies[0] = Arc::new(GhostFile);

        let reporter = Arc::new(ProtocolReporter::new(StatusProtocol::new(store.clone())));
        let runner = FlowRunner::new(store.clone(), reporter, bodies);

        let err = runner.run(pipeline.id, 10).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Stage {
                stage: "Data Ingestion",
                ..
            }
        ));

        let failed = store.get_pipeline(pipeline.id).await.unwrap().unwrap();
        assert_eq!(failed.status, StageStatus::Failed);
        assert!(failed.error_message.is_some());

        let stages = store.get_stages(pipeline.id).await.unwrap();
        assert_eq!(stages[2].status, StageStatus::Pending);
    }
}
