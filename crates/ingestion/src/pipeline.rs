//! Ingestion Pipeline main entry
//!
//! Spawns one ingest task per radar and hands the per-radar frame queues to
//! the fusion side.

use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use contracts::{ByteSource, ByteSourceConfig, PipelineClock, RadarConfig, SensorFrame, SensorId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::{BackpressureConfig, IngestionMetrics};
use crate::error::{IngestionError, Result};
use crate::ingest::SensorIngestSource;
use crate::queue::frame_queue;
use crate::sources::{ReplayByteSource, ReplayConfig, SyntheticByteSource, TcpByteSource};
use crate::transform::RadarTransform;

/// Running radar
struct RadarTask {
    sensor: SensorId,
    metrics: Arc<IngestionMetrics>,
    handle: JoinHandle<()>,
}

/// Ingestion Pipeline
pub struct IngestionPipeline {
    clock: PipelineClock,
    shutdown: watch::Receiver<bool>,
    tasks: Vec<RadarTask>,
    receivers: Vec<(SensorId, Receiver<SensorFrame>)>,
}

impl IngestionPipeline {
    /// Create an empty pipeline; every task observes `shutdown`
    pub fn new(clock: PipelineClock, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            clock,
            shutdown,
            tasks: Vec::new(),
            receivers: Vec::new(),
        }
    }

    /// Spawn ingest tasks for every configured radar, in config order
    pub fn spawn_all(&mut self, radars: &[RadarConfig]) -> Result<()> {
        for radar in radars {
            self.spawn_from_config(radar)?;
        }
        info!(count = self.tasks.len(), "all radar sources started");
        Ok(())
    }

    /// Build the byte source described by the radar config and spawn it
    pub fn spawn_from_config(&mut self, radar: &RadarConfig) -> Result<()> {
        match &radar.source {
            ByteSourceConfig::Tcp {
                address,
                reconnect_backoff_ms,
            } => self.spawn_source(
                radar,
                TcpByteSource::new(address.clone(), Duration::from_millis(*reconnect_backoff_ms)),
            ),
            ByteSourceConfig::Replay {
                path,
                chunk_size,
                chunk_interval_ms,
                loop_playback,
            } => self.spawn_source(
                radar,
                ReplayByteSource::new(ReplayConfig {
                    path: path.into(),
                    chunk_size: *chunk_size,
                    chunk_interval: Duration::from_millis(*chunk_interval_ms),
                    loop_playback: *loop_playback,
                }),
            ),
            ByteSourceConfig::Synthetic(cfg) => {
                let pose = RadarTransform::from_radar(radar);
                self.spawn_source(radar, SyntheticByteSource::new(cfg.clone(), &pose, self.clock))
            }
        }
    }

    /// Spawn the ingest loop for an arbitrary byte source
    #[instrument(
        name = "ingestion_spawn_source",
        skip(self, radar, source),
        fields(sensor = %radar.name)
    )]
    pub fn spawn_source<S: ByteSource + 'static>(
        &mut self,
        radar: &RadarConfig,
        source: S,
    ) -> Result<()> {
        if self.tasks.iter().any(|t| t.sensor == radar.name.as_str()) {
            return Err(IngestionError::Config {
                sensor: radar.name.clone(),
                message: "radar already registered".into(),
            });
        }

        let ingest = SensorIngestSource::new(radar, source, self.clock);
        let sensor = ingest.sensor().clone();
        let metrics = ingest.metrics();
        let (tx, rx) = frame_queue(&BackpressureConfig::new(
            radar.ingest.queue_capacity,
            radar.ingest.drop_policy,
        ));

        debug!(kind = radar.source.kind(), "spawning ingest task");
        let handle = tokio::spawn(ingest.run(tx, self.shutdown.clone()));

        self.receivers.push((sensor.clone(), rx));
        self.tasks.push(RadarTask {
            sensor,
            metrics,
            handle,
        });
        Ok(())
    }

    /// Frame queues in registration order
    ///
    /// Note: the queues move out, subsequent calls only return radars spawned since
    pub fn take_receivers(&mut self) -> Vec<(SensorId, Receiver<SensorFrame>)> {
        std::mem::take(&mut self.receivers)
    }

    pub fn metrics(&self) -> Vec<(SensorId, Arc<IngestionMetrics>)> {
        self.tasks
            .iter()
            .map(|t| (t.sensor.clone(), t.metrics.clone()))
            .collect()
    }

    pub fn sensor_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn clock(&self) -> PipelineClock {
        self.clock
    }

    /// Wait up to `grace` for all tasks to exit, then abort the rest.
    ///
    /// Returns the number of aborted tasks.
    #[instrument(name = "ingestion_join", skip(self))]
    pub async fn join(self, grace: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = 0;
        for mut task in self.tasks {
            match tokio::time::timeout_at(deadline, &mut task.handle).await {
                Ok(Ok(())) => debug!(sensor = %task.sensor, "ingest task exited"),
                Ok(Err(e)) => warn!(sensor = %task.sensor, error = %e, "ingest task failed"),
                Err(_) => {
                    warn!(sensor = %task.sensor, "ingest task did not stop in time, aborting");
                    task.handle.abort();
                    aborted += 1;
                }
            }
        }
        aborted
    }
}
