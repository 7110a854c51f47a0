//! LogSink - logs fused frame summaries via tracing

use std::collections::HashMap;

use contracts::{ContractError, DataSink, FusedFrame};
use tracing::{debug, info, instrument};

/// Sink that logs one summary line every `every` frames
pub struct LogSink {
    name: String,
    every: u64,
    seen: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            every: 1,
            seen: 0,
        }
    }

    /// Reads the optional `every` param (defaults to 1)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        let every = params
            .get("every")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1)
            .max(1);
        Self {
            every,
            ..Self::new(name)
        }
    }

    fn log_frame_summary(&self, frame: &FusedFrame) {
        let ids: Vec<u32> = frame.tracks.iter().map(|t| t.global_id).collect();
        info!(
            sink = %self.name,
            cycle = frame.cycle,
            t = frame.timestamp,
            sensors = frame.sensors_fused.len(),
            tracks = frame.tracks.len(),
            merged = frame.merged_count(),
            ids = ?ids,
            "FusedFrame received"
        );
        for track in &frame.tracks {
            debug!(
                sink = %self.name,
                global_id = track.global_id,
                x = track.position.x,
                y = track.position.y,
                z = track.position.z,
                confidence = track.confidence,
                sensors = track.num_sensors(),
                "fused track"
            );
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, frame),
        fields(sink = %self.name, cycle = frame.cycle)
    )]
    async fn write(&mut self, frame: &FusedFrame) -> Result<(), ContractError> {
        if self.seen % self.every == 0 {
            self.log_frame_summary(frame);
        }
        self.seen += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, frames = self.seen, "LogSink closed");
        Ok(())
    }
}
