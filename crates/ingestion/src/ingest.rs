//! Per-radar ingest loop
//!
//! byte source -> deframer -> parser -> transform -> frame queue.
//! Only the shutdown signal ends the loop; parse and stream errors are
//! counted, logged and survived.

use std::sync::Arc;
use std::time::Duration;

use contracts::{ByteSource, IngestConfig, PipelineClock, RadarConfig, SensorFrame, SensorId};
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::IngestionMetrics;
use crate::deframer::FrameDeframer;
use crate::error::IngestionError;
use crate::parser::ParsedFrame;
use crate::queue::{FrameSender, SendOutcome};
use crate::transform::{RadarTransform, WorldLimits};

/// One radar's ingest context
pub struct SensorIngestSource<S> {
    sensor: SensorId,
    source: S,
    transform: RadarTransform,
    limits: WorldLimits,
    config: IngestConfig,
    clock: PipelineClock,
    metrics: Arc<IngestionMetrics>,
}

impl<S: ByteSource> SensorIngestSource<S> {
    pub fn new(radar: &RadarConfig, source: S, clock: PipelineClock) -> Self {
        Self {
            sensor: SensorId::from(radar.name.as_str()),
            source,
            transform: RadarTransform::from_radar(radar),
            limits: WorldLimits::from_radar(radar),
            config: radar.ingest.clone(),
            clock,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    pub fn sensor(&self) -> &SensorId {
        &self.sensor
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Run until the shutdown signal flips to `true` (or its sender is dropped)
    #[instrument(name = "ingest_loop", skip_all, fields(sensor = %self.sensor))]
    pub async fn run(mut self, tx: FrameSender, mut shutdown: watch::Receiver<bool>) {
        let read_timeout = Duration::from_millis(self.config.read_timeout_ms);
        let backoff = Duration::from_millis(self.config.io_backoff_ms);
        let mut deframer = FrameDeframer::new(self.config.max_buffer_bytes);

        info!(source = %self.source.describe(), "ingest loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let read = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                r = self.source.read(deframer.buffer_mut(), read_timeout) => r,
            };

            match read {
                Ok(0) => continue,
                Ok(n) => {
                    self.metrics.record_bytes(n);
                    trace!(bytes = n, buffered = deframer.buffered(), "bytes received");
                    if let Err(e) = self.drain_frames(&mut deframer, &tx) {
                        warn!(error = %e, "frame consumer gone, stopping");
                        break;
                    }
                }
                Err(source) => {
                    self.metrics.record_io_error();
                    let err = IngestionError::StreamIo {
                        sensor: self.sensor.to_string(),
                        source,
                    };
                    warn!(error = %err, backoff_ms = backoff.as_millis() as u64, "stream read failed");
                    metrics::counter!("radar_stream_errors_total", "sensor" => self.sensor.to_string())
                        .increment(1);

                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        if let Err(e) = self.source.close().await {
            debug!(error = %e, "error closing byte source");
        }
        let snapshot = self.metrics.snapshot();
        info!(
            frames = snapshot.frames_parsed,
            parse_errors = snapshot.parse_errors,
            dropped = snapshot.frames_dropped,
            overflows = snapshot.buffer_overflows,
            "ingest loop stopped"
        );
    }

    /// Parse every complete frame in the buffer, then apply the overflow valve
    fn drain_frames(
        &self,
        deframer: &mut FrameDeframer,
        tx: &FrameSender,
    ) -> Result<(), IngestionError> {
        while let Some(result) = deframer.next_frame() {
            match result {
                Ok(parsed) => self.publish(parsed, tx)?,
                Err(source) => {
                    self.metrics.record_parse_error();
                    metrics::counter!("radar_parse_errors_total", "sensor" => self.sensor.to_string())
                        .increment(1);
                    let err = IngestionError::Parse {
                        sensor: self.sensor.to_string(),
                        source,
                    };
                    debug!(error = %err, "resyncing on next marker");
                }
            }
        }

        if let Some(size) = deframer.check_overflow() {
            self.metrics.record_overflow();
            metrics::counter!("radar_buffer_overflows_total", "sensor" => self.sensor.to_string())
                .increment(1);
            let err = IngestionError::BufferOverflow {
                sensor: self.sensor.to_string(),
                size,
                max: self.config.max_buffer_bytes,
            };
            warn!(error = %err, "receive buffer cleared");
        }
        Ok(())
    }

    fn publish(&self, parsed: ParsedFrame, tx: &FrameSender) -> Result<(), IngestionError> {
        let timestamp = self.clock.now();
        let skipped = parsed.malformed_tlvs + parsed.skipped_targets;
        if skipped > 0 {
            self.metrics.record_skipped(skipped);
            debug!(
                frame_number = parsed.frame_number(),
                malformed_tlvs = parsed.malformed_tlvs,
                skipped_targets = parsed.skipped_targets,
                "partially decoded frame"
            );
        }

        let decoded = parsed.tracks.len();
        let tracks: Vec<_> = parsed
            .tracks
            .iter()
            .map(|raw| self.transform.to_world(raw, &self.sensor, timestamp))
            .filter(|t| self.limits.contains(&t.position))
            .collect();
        if tracks.len() < decoded {
            self.metrics.record_out_of_bounds(decoded - tracks.len());
        }

        let frame = SensorFrame {
            sensor: self.sensor.clone(),
            frame_number: parsed.frame_number(),
            timestamp,
            tracks,
        };
        let track_count = frame.tracks.len();

        let outcome = tx.send(frame);
        self.metrics.update_queue_len(tx.len());
        match outcome {
            SendOutcome::Closed => {
                return Err(IngestionError::ChannelClosed {
                    sensor: self.sensor.to_string(),
                })
            }
            o if o.dropped_frame() => {
                self.metrics.record_dropped();
                metrics::counter!("radar_frames_dropped_total", "sensor" => self.sensor.to_string())
                    .increment(1);
            }
            _ => {}
        }

        let count = self.metrics.record_frame(track_count);
        metrics::counter!("radar_frames_parsed_total", "sensor" => self.sensor.to_string())
            .increment(1);
        if self.config.stats_interval_frames > 0 && count % self.config.stats_interval_frames == 0 {
            let s = self.metrics.snapshot();
            info!(
                frames = s.frames_parsed,
                tracks = track_count,
                parse_errors = s.parse_errors,
                dropped = s.frames_dropped,
                "ingest stats"
            );
        }
        Ok(())
    }
}
