mod pipeline_event;
mod pipeline_run_payload;
mod stage_status;
mod status_update;

pub use pipeline_event::*;
pub use pipeline_run_payload::*;
pub use stage_status::*;
pub use status_update::*;
