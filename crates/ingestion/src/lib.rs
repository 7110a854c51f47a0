//! # Ingestion Pipeline
//!
//! Radar byte stream ingestion.
//!
//! Responsibilities:
//! - Pull bytes from a TCP link, a replay file or the synthetic generator
//! - Deframe on the magic marker and decode the target-list TLV
//! - Transform radar-frame tracks into the world frame and apply limits
//! - Publish one `SensorFrame` per radar frame to a bounded per-radar queue
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::IngestionPipeline;
//! use contracts::PipelineClock;
//!
//! let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//! let mut pipeline = IngestionPipeline::new(PipelineClock::start(), stop_rx);
//! pipeline.spawn_all(&blueprint.radars)?;
//!
//! for (sensor, rx) in pipeline.take_receivers() {
//!     // hand each queue to the fusion scheduler
//! }
//! ```

mod config;
mod deframer;
mod error;
mod ingest;
mod parser;
mod pipeline;
mod queue;
pub mod sources;
mod transform;

// Re-exports
pub use config::{BackpressureConfig, IngestionMetrics, MetricsSnapshot};
pub use contracts::{DropPolicy, SensorFrame};
pub use deframer::{find_marker, DeframerStats, FrameDeframer, DEFAULT_MAX_BUFFER_BYTES};
pub use error::{IngestionError, ParseError, Result};
pub use ingest::SensorIngestSource;
pub use parser::{parse_frame, parse_header, ParsedFrame};
pub use pipeline::IngestionPipeline;
pub use queue::{frame_queue, FrameSender, SendOutcome};
pub use transform::{RadarTransform, VectorKind, WorldLimits};
