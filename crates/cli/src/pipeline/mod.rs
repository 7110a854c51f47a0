//! Pipeline orchestration: task wiring, shutdown ordering and run statistics.

mod orchestrator;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
