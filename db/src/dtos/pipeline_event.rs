use serde::{Deserialize, Serialize};

use crate::entities::{Pipeline, Stage};

/// Best-effort status event published on `pipeline.events` after a state
/// change has been persisted. Consumers must treat delivery as lossy; the
/// store is the source of truth.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum PipelineEvent {
    Pipeline(Pipeline),
    Stage(Stage),
}
