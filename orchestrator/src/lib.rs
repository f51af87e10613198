pub mod reporter;
pub mod runner;
pub mod stage;

pub use reporter::{ProtocolReporter, ReportError, StatusReporter};
pub use runner::{FlowError, FlowOutcome, FlowRun, FlowRunner, RetryPolicy, RunState};
pub use stage::{StageBody, StageContext, StageError, StageOutput};
