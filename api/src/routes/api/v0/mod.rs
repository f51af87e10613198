pub mod pipelines;
pub mod status_updates;
pub mod triggers;
