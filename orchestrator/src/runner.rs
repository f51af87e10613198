//! The flow runner: executes a pipeline's stages in registry order and
//! reports every transition through the status-update protocol. Pipeline
//! status is never mutated outside that protocol.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use db::dtos::{StageStatus, StatusUpdate};
use db::store::{PipelineStore, PipelineUpdate, StoreError};

use crate::reporter::{ReportError, StatusReporter};
use crate::stage::{StageBody, StageContext, StageError};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("pipeline {0} not found")]
    PipelineNotFound(Uuid),
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: StageError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running(usize),
    Completed,
    Failed,
}

/// Tracks one run through the ordered stage sequence. Stages are strictly
/// ordered, so "next to execute" is a cursor rather than a graph walk.
pub struct FlowRun {
    stages: Vec<&'static str>,
    state: RunState,
}

impl FlowRun {
    pub fn new(stages: Vec<&'static str>) -> Self {
        Self {
            stages,
            state: RunState::NotStarted,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RunState::Completed | RunState::Failed)
    }

    /// Index of the next stage to execute, entering `Running` on first call.
    pub fn next_stage(&mut self) -> Option<usize> {
        match self.state {
            RunState::NotStarted => {
                if self.stages.is_empty() {
                    self.state = RunState::Completed;
                    None
                } else {
                    self.state = RunState::Running(0);
                    Some(0)
                }
            }
            RunState::Running(index) => Some(index),
            RunState::Completed | RunState::Failed => None,
        }
    }

    pub fn advance(&mut self) {
        if let RunState::Running(index) = self.state {
            if index + 1 < self.stages.len() {
                self.state = RunState::Running(index + 1);
            } else {
                self.state = RunState::Completed;
            }
        }
    }

    /// Terminal; there is no resumption after a failure.
    pub fn fail(&mut self) {
        self.state = RunState::Failed;
    }
}

/// Bounded retry for transport failures while reporting status.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug)]
pub struct FlowOutcome {
    pub pipeline_id: Uuid,
    pub flow_run_id: Uuid,
    pub records_processed: Option<i64>,
}

pub struct FlowRunner {
    store: Arc<dyn PipelineStore>,
    reporter: Arc<dyn StatusReporter>,
    bodies: Vec<Arc<dyn StageBody>>,
    retry: RetryPolicy,
}

impl FlowRunner {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        reporter: Arc<dyn StatusReporter>,
        bodies: Vec<Arc<dyn StageBody>>,
    ) -> Self {
        Self {
            store,
            reporter,
            bodies,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs every stage in order. The first stage failure is reported and
    /// halts the sequence; remaining stages are not executed.
    pub async fn run(&self, pipeline_id: Uuid, record_count: i64) -> Result<FlowOutcome, FlowError> {
        if self.store.get_pipeline(pipeline_id).await?.is_none() {
            return Err(FlowError::PipelineNotFound(pipeline_id));
        }

        let flow_run_id = Uuid::new_v4();
        self.store
            .update_pipeline(
                pipeline_id,
                PipelineUpdate {
                    flow_run_id: Some(flow_run_id.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        info!("Starting flow {flow_run_id} for pipeline {pipeline_id} ({record_count} records)");

        let mut run = FlowRun::new(self.bodies.iter().map(|body| body.name()).collect());
        let mut artifact = serde_json::Value::Null;
        let mut records_processed = None;

        let ctx = StageContext {
            pipeline_id,
            record_count,
            store: self.store.clone(),
        };

        while let Some(index) = run.next_stage() {
            let body = &self.bodies[index];
            let stage = body.name();

            self.emit(StatusUpdate::for_stage(pipeline_id, stage, StageStatus::Running))
                .await?;

            match body.run(&ctx, artifact).await {
                Ok(output) => {
                    if let Some(message) = &output.message {
                        info!("Stage '{stage}' of pipeline {pipeline_id}: {message}");
                    }
                    if output.records_processed.is_some() {
                        records_processed = output.records_processed;
                    }

                    let mut update =
                        StatusUpdate::for_stage(pipeline_id, stage, StageStatus::Completed);
                    if let Some(records) = output.records_processed {
                        update = update.with_records(records);
                    }
                    self.emit(update).await?;

                    artifact = output.artifact;
                    run.advance();
                }
                Err(source) => {
                    error!("Stage '{stage}' of pipeline {pipeline_id} failed: {source}");
                    self.emit(
                        StatusUpdate::for_stage(pipeline_id, stage, StageStatus::Failed)
                            .with_error(source.to_string()),
                    )
                    .await?;

                    run.fail();
                    return Err(FlowError::Stage { stage, source });
                }
            }
        }

        let mut update = StatusUpdate::for_pipeline(pipeline_id, StageStatus::Completed);
        if let Some(records) = records_processed {
            update = update.with_records(records);
        }
        self.emit(update).await?;

        info!("Flow {flow_run_id} for pipeline {pipeline_id} completed");

        Ok(FlowOutcome {
            pipeline_id,
            flow_run_id,
            records_processed,
        })
    }

    /// Reports one transition, retrying transport failures a bounded number
    /// of times. An exhausted retry budget is logged and the run continues;
    /// reporting failure never aborts an otherwise-successful stage.
    async fn emit(&self, update: StatusUpdate) -> Result<(), FlowError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.reporter.report(update.clone()).await {
                Ok(()) => return Ok(()),
                Err(ReportError::PipelineNotFound(id)) => {
                    return Err(FlowError::PipelineNotFound(id));
                }
                Err(ReportError::StageNotFound(name)) => {
                    warn!("Status update rejected, stage '{name}' not found");
                    return Ok(());
                }
                Err(ReportError::Transport(err)) if attempt < self.retry.attempts => {
                    warn!("Status report attempt {attempt} failed, retrying: {err}");
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(ReportError::Transport(err)) => {
                    error!(
                        "Dropping status update for pipeline {} after {attempt} attempts: {err}",
                        update.pipeline_id
                    );
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use db::protocol::StatusProtocol;
    use db::store::{MemoryStore, NewPipeline};

    use crate::reporter::ProtocolReporter;
    use crate::stage::StageOutput;

    use super::*;

    struct FixedBody {
        name: &'static str,
        records: Option<i64>,
    }

    #[async_trait]
    impl StageBody for FixedBody {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(
            &self,
            _ctx: &StageContext,
            input: serde_json::Value,
        ) -> Result<StageOutput, StageError> {
            let mut output = StageOutput::new(input);
            if let Some(records) = self.records {
                output = output.with_records(records);
            }
            Ok(output)
        }
    }

    struct FailingBody {
        name: &'static str,
        message: &'static str,
    }

    #[async_trait]
    impl StageBody for FailingBody {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(
            &self,
            _ctx: &StageContext,
            _input: serde_json::Value,
        ) -> Result<StageOutput, StageError> {
            Err(StageError::msg(self.message))
        }
    }

    fn default_bodies() -> Vec<Arc<dyn StageBody>> {
        vec![
            Arc::new(FixedBody {
                name: "Data Generation",
                records: None,
            }),
            Arc::new(FixedBody {
                name: "Data Ingestion",
                records: None,
            }),
            Arc::new(FixedBody {
                name: "Spark Processing",
                records: None,
            }),
            Arc::new(FixedBody {
                name: "DBT Transformation",
                records: None,
            }),
            Arc::new(FixedBody {
                name: "Data Export",
                records: Some(1000),
            }),
        ]
    }

    async fn setup(bodies: Vec<Arc<dyn StageBody>>) -> (FlowRunner, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let pipeline = store
            .create_pipeline(NewPipeline {
                name: "demo".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let reporter = Arc::new(ProtocolReporter::new(StatusProtocol::new(store.clone())));
        let runner = FlowRunner::new(store.clone(), reporter, bodies).with_retry(RetryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        });

        (runner, store, pipeline.id)
    }

    #[tokio::test]
    async fn successful_run_completes_every_stage_and_the_pipeline() {
        let (runner, store, pipeline_id) = setup(default_bodies()).await;

        let outcome = runner.run(pipeline_id, 1000).await.unwrap();
        assert_eq!(outcome.records_processed, Some(1000));

        let pipeline = store.get_pipeline(pipeline_id).await.unwrap().unwrap();
        assert_eq!(pipeline.status, StageStatus::Completed);
        assert_eq!(pipeline.records_processed, 1000);
        assert!(pipeline.flow_run_id.is_some());

        let stages = store.get_stages(pipeline_id).await.unwrap();
        for stage in stages {
            assert_eq!(stage.status, StageStatus::Completed);
            assert!(stage.started_at.is_some());
            assert!(stage.completed_at.is_some());
            assert!(stage.execution_time_seconds.is_some());
        }
    }

    #[tokio::test]
    async fn failure_halts_the_sequence_and_fails_the_pipeline() {
        let bodies: Vec<Arc<dyn StageBody>> = vec![
            Arc::new(FixedBody {
                name: "Data Generation",
                records: None,
            }),
            Arc::new(FailingBody {
                name: "Data Ingestion",
                message: "file not found",
            }),
            Arc::new(FixedBody {
                name: "Spark Processing",
                records: None,
            }),
            Arc::new(FixedBody {
                name: "DBT Transformation",
                records: None,
            }),
            Arc::new(FixedBody {
                name: "Data Export",
                records: Some(1000),
            }),
        ];
        let (runner, store, pipeline_id) = setup(bodies).await;

        let err = runner.run(pipeline_id, 1000).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Stage {
                stage: "Data Ingestion",
                ..
            }
        ));

        let pipeline = store.get_pipeline(pipeline_id).await.unwrap().unwrap();
        assert_eq!(pipeline.status, StageStatus::Failed);
        assert_eq!(pipeline.error_message.as_deref(), Some("file not found"));

        let stages = store.get_stages(pipeline_id).await.unwrap();
        assert_eq!(stages[0].status, StageStatus::Completed);
        assert_eq!(stages[1].status, StageStatus::Failed);
        assert_eq!(
            stages[1].error_message.as_deref(),
            Some("file not found")
        );
        // Nothing after the failed stage was touched.
        for stage in &stages[2..] {
            assert_eq!(stage.status, StageStatus::Pending);
            assert!(stage.started_at.is_none());
        }
    }

    #[tokio::test]
    async fn unknown_pipeline_is_rejected_before_any_stage_runs() {
        let (runner, _, _) = setup(default_bodies()).await;

        let err = runner.run(Uuid::new_v4(), 10).await.unwrap_err();
        assert!(matches!(err, FlowError::PipelineNotFound(_)));
    }

    /// Fails the first `failures` reports with a transport error, then
    /// delegates to the real reporter.
    struct FlakyReporter {
        inner: ProtocolReporter,
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl StatusReporter for FlakyReporter {
        async fn report(&self, update: StatusUpdate) -> Result<(), ReportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ReportError::Transport(StoreError::Unavailable(
                    "connection refused".to_string(),
                )));
            }
            self.inner.report(update).await
        }
    }

    #[tokio::test]
    async fn transport_failures_are_retried_within_the_budget() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = store
            .create_pipeline(NewPipeline {
                name: "demo".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let reporter = Arc::new(FlakyReporter {
            inner: ProtocolReporter::new(StatusProtocol::new(store.clone())),
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let runner = FlowRunner::new(store.clone(), reporter, default_bodies())
            .with_retry(RetryPolicy {
                attempts: 3,
                delay: Duration::ZERO,
            });

        runner.run(pipeline.id, 1000).await.unwrap();

        let updated = store.get_pipeline(pipeline.id).await.unwrap().unwrap();
        assert_eq!(updated.status, StageStatus::Completed);
    }

    struct DeadReporter;

    #[async_trait]
    impl StatusReporter for DeadReporter {
        async fn report(&self, _update: StatusUpdate) -> Result<(), ReportError> {
            Err(ReportError::Transport(StoreError::Unavailable(
                "connection refused".to_string(),
            )))
        }
    }

    #[tokio::test]
    async fn reporting_outage_never_aborts_a_successful_run() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = store
            .create_pipeline(NewPipeline {
                name: "demo".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let runner = FlowRunner::new(store.clone(), Arc::new(DeadReporter), default_bodies())
            .with_retry(RetryPolicy {
                attempts: 2,
                delay: Duration::ZERO,
            });

        let outcome = runner.run(pipeline.id, 1000).await.unwrap();
        assert_eq!(outcome.records_processed, Some(1000));

        // Every update was dropped; the stored state simply lags behind.
        let stored = store.get_pipeline(pipeline.id).await.unwrap().unwrap();
        assert_eq!(stored.status, StageStatus::Pending);
    }

    #[test]
    fn run_state_walks_the_sequence_and_failure_is_terminal() {
        let mut run = FlowRun::new(vec!["a", "b"]);
        assert_eq!(run.state(), RunState::NotStarted);

        assert_eq!(run.next_stage(), Some(0));
        run.advance();
        assert_eq!(run.state(), RunState::Running(1));
        assert_eq!(run.next_stage(), Some(1));
        run.advance();
        assert_eq!(run.state(), RunState::Completed);
        assert!(run.is_finished());
        assert_eq!(run.next_stage(), None);

        let mut failed = FlowRun::new(vec!["a", "b"]);
        failed.next_stage();
        failed.fail();
        assert_eq!(failed.state(), RunState::Failed);
        assert!(failed.is_finished());
        assert_eq!(failed.next_stage(), None);
    }

    #[test]
    fn empty_run_is_immediately_finished() {
        let mut run = FlowRun::new(Vec::new());
        assert_eq!(run.next_stage(), None);
        assert!(run.is_finished());
    }
}
