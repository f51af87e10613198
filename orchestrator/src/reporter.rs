//! Status reporting seam. The store update (through the protocol) is the
//! source of truth; the NATS event notification is best-effort and may be
//! dropped without affecting correctness.

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

use db::dtos::{PipelineEvent, StatusUpdate};
use db::protocol::{StatusProtocol, UpdateOutcome};
use db::store::StoreError;

pub static EVENTS_SUBJECT: &str = "pipeline.events";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("pipeline {0} not found")]
    PipelineNotFound(Uuid),
    #[error("stage '{0}' not found")]
    StageNotFound(String),
    #[error(transparent)]
    Transport(#[from] StoreError),
}

#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, update: StatusUpdate) -> Result<(), ReportError>;
}

/// Applies updates through the status-update protocol, then publishes the
/// resulting snapshots on `pipeline.events` when a NATS client is attached.
pub struct ProtocolReporter {
    protocol: StatusProtocol,
    events: Option<async_nats::Client>,
}

impl ProtocolReporter {
    pub fn new(protocol: StatusProtocol) -> Self {
        Self {
            protocol,
            events: None,
        }
    }

    pub fn with_events(mut self, client: async_nats::Client) -> Self {
        self.events = Some(client);
        self
    }

    async fn publish(&self, event: &PipelineEvent) {
        let Some(client) = &self.events else {
            return;
        };

        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(err) => {
                error!("Failed to serialize pipeline event: {err:?}");
                return;
            }
        };

        if let Err(err) = client.publish(EVENTS_SUBJECT, payload.into()).await {
            error!("Failed to publish pipeline event: {err:?}");
        }
    }
}

#[async_trait]
impl StatusReporter for ProtocolReporter {
    async fn report(&self, update: StatusUpdate) -> Result<(), ReportError> {
        let pipeline_id = update.pipeline_id;
        let stage_name = update.stage_name.clone();

        match self.protocol.apply(update).await? {
            UpdateOutcome::Applied { pipeline, stage } => {
                let pipeline_terminal = pipeline.status.is_terminal();

                if let Some(stage) = stage {
                    self.publish(&PipelineEvent::Stage(stage)).await;
                }
                if stage_name.is_none() || pipeline_terminal {
                    self.publish(&PipelineEvent::Pipeline(pipeline)).await;
                }

                Ok(())
            }
            UpdateOutcome::PipelineNotFound => Err(ReportError::PipelineNotFound(pipeline_id)),
            UpdateOutcome::StageNotFound => {
                Err(ReportError::StageNotFound(stage_name.unwrap_or_default()))
            }
        }
    }
}
