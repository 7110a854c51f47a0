//! DataSink - where fused frames leave the pipeline
//!
//! Each sink runs behind its own queue and worker, so a slow sink only ever
//! loses its own frames.

use crate::{ContractError, FusedFrame};

/// Consumer of fused frames (log, JSON lines file, UDP stream)
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Stable name, used as the `sink` label on metrics
    fn name(&self) -> &str;

    /// Deliver one fused frame. Errors are counted by the worker, the frame is not retried.
    async fn write(&mut self, frame: &FusedFrame) -> Result<(), ContractError>;

    /// Push buffered output to its destination
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Release the destination, called once after the queue drained
    async fn close(&mut self) -> Result<(), ContractError>;
}
