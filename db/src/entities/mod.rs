mod pipeline;
mod stage;

pub use pipeline::*;
pub use stage::*;
