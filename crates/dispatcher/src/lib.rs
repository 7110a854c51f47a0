//! # Dispatcher
//!
//! Fused output distribution.
//!
//! Responsibilities:
//! - Consume `FusedFrame` from the fusion scheduler
//! - Fan out to every configured sink
//! - Isolate slow sinks so they never stall fusion

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, FusedFrame};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, NetworkFormat, NetworkSink};
