//! Pipeline orchestrator - coordinates all components.
//!
//! Task layout:
//!
//! ```text
//! radar ingest tasks ──(per-radar queues)──► fusion scheduler
//!        ──(fused frames)──► forwarder (metrics) ──► dispatcher ──► sinks
//! ```
//!
//! Shutdown runs front to back: the stop signal halts ingest and the
//! scheduler, closing the fused channel lets the forwarder and dispatcher
//! drain what is already queued.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{FusedFrame, FusionBlueprint, PipelineClock};
use fusion_engine::{FusionScheduler, SchedulerStats};
use observability::{record_fused_frame, FusionMetricsAggregator};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::PipelineStats;

/// Upper bound on how long the dispatcher gets to flush its sinks
const DISPATCHER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The fusion blueprint, CLI overrides already applied
    pub blueprint: FusionBlueprint,

    /// Stop after this long (None = until the shutdown signal)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// How long stopped tasks get to exit before being aborted
    pub shutdown_grace: Duration,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves or the configured duration elapses
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let grace = self.config.shutdown_grace;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let clock = PipelineClock::start();
        let (stop_tx, stop_rx) = watch::channel(false);

        // Setup Dispatcher
        info!("Setting up dispatcher...");
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - fused frames will only be counted");
        }

        let capacity = blueprint.fusion.output_queue_capacity.max(1);
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<FusedFrame>(capacity);
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), dispatch_rx)
            .await
            .context("Failed to create dispatcher")?;
        let active_sinks = dispatcher.sink_count();
        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, "Dispatcher started");

        // Setup Ingestion
        info!("Starting radar ingestion...");
        let mut ingestion = ingestion::IngestionPipeline::new(clock, stop_rx.clone());
        ingestion
            .spawn_all(&blueprint.radars)
            .context("Failed to start radar sources")?;
        let ingest_metrics = ingestion.metrics();
        let receivers = ingestion.take_receivers();

        // Setup Fusion Scheduler
        let (fused_tx, mut fused_rx) = mpsc::channel::<FusedFrame>(capacity);
        let scheduler = FusionScheduler::new(blueprint.fusion.clone(), receivers, clock);
        info!(
            radars = ingestion.sensor_count(),
            period_ms = scheduler.period().as_millis() as u64,
            threshold_m = blueprint.fusion.distance_threshold,
            "Fusion scheduler configured"
        );
        let mut scheduler_handle = tokio::spawn(scheduler.run(fused_tx, stop_rx));

        // Forwarder: metrics + hand-off to the dispatcher
        let forwarder = tokio::spawn(async move {
            let mut aggregator = FusionMetricsAggregator::new();
            while let Some(frame) = fused_rx.recv().await {
                record_fused_frame(&frame);
                aggregator.update(&frame);

                debug!(
                    cycle = frame.cycle,
                    t = format!("{:.3}", frame.timestamp),
                    tracks = frame.tracks.len(),
                    merged = frame.merged_count(),
                    "Fused frame produced"
                );

                if dispatch_tx.send(frame).await.is_err() {
                    warn!("Dispatcher channel closed");
                    break;
                }
            }
            aggregator
        });

        info!(duration = ?self.config.duration, "Pipeline running");

        // Wait for the stop condition
        let run_for = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = shutdown => info!("Shutdown requested"),
            _ = run_for => info!("Configured run duration reached"),
        }

        // Shutdown
        info!("Shutting down pipeline...");
        let _ = stop_tx.send(true);

        let mut aborted_tasks = ingestion.join(grace).await;

        let scheduler_stats = match tokio::time::timeout(grace, &mut scheduler_handle).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                warn!(error = %e, "Fusion scheduler task failed");
                SchedulerStats::default()
            }
            Err(_) => {
                warn!("Fusion scheduler did not stop in time, aborting");
                scheduler_handle.abort();
                aborted_tasks += 1;
                SchedulerStats::default()
            }
        };

        let fusion_metrics = match forwarder.await {
            Ok(aggregator) => aggregator,
            Err(e) => {
                warn!(error = %e, "Forwarder task failed");
                FusionMetricsAggregator::default()
            }
        };

        // Wait for dispatcher to flush
        let sinks = match tokio::time::timeout(DISPATCHER_FLUSH_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(snapshots)) => snapshots,
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    timeout_secs = DISPATCHER_FLUSH_TIMEOUT.as_secs(),
                    "Dispatcher did not flush in time"
                );
                aborted_tasks += 1;
                Vec::new()
            }
        };

        let sensors: Vec<_> = ingest_metrics
            .into_iter()
            .map(|(sensor, metrics)| (sensor.to_string(), metrics.snapshot()))
            .collect();

        for (sensor, snapshot) in &sensors {
            observability::record_ingest_totals(
                sensor,
                snapshot.frames_parsed,
                snapshot.frames_dropped,
                snapshot.parse_errors,
            );
        }
        for (sink, snapshot) in &sinks {
            observability::record_sink_snapshot(
                sink,
                snapshot.write_count,
                snapshot.failure_count,
                snapshot.dropped_count,
            );
        }

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            sensors,
            scheduler: scheduler_stats,
            fusion_metrics,
            sinks,
            aborted_tasks,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            aborted_tasks,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint(dir: &std::path::Path) -> FusionBlueprint {
        let content = format!(
            r#"
[[radars]]
name = "radar1"
source = {{ type = "synthetic", frame_rate_hz = 40.0 }}

[[radars]]
name = "radar2"
source = {{ type = "synthetic", frame_rate_hz = 40.0, id_offset = 1000 }}

[[sinks]]
name = "file"
sink_type = "file"
params = {{ path = "{}" }}
"#,
            dir.join("fused.jsonl").display()
        );
        config_loader::ConfigLoader::load_from_str(&content, config_loader::ConfigFormat::Toml)
            .unwrap()
    }

    #[tokio::test]
    async fn runs_for_duration_and_flushes_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(dir.path()),
            duration: Some(Duration::from_millis(600)),
            metrics_port: None,
            shutdown_grace: Duration::from_secs(2),
        });

        let stats = pipeline.run(std::future::pending()).await.unwrap();

        assert_eq!(stats.sensors.len(), 2);
        assert_eq!(stats.aborted_tasks, 0);
        assert!(stats.scheduler.published > 0);
        assert_eq!(stats.fusion_metrics.total_frames, stats.scheduler.published);

        let (name, sink) = &stats.sinks[0];
        assert_eq!(name, "file");
        assert_eq!(sink.write_count, stats.scheduler.published);

        let written = std::fs::read_to_string(dir.path().join("fused.jsonl")).unwrap();
        assert_eq!(written.lines().count() as u64, sink.write_count);
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(dir.path()),
            duration: None,
            metrics_port: None,
            shutdown_grace: Duration::from_secs(2),
        });

        let signal = tokio::time::sleep(Duration::from_millis(300));
        let stats = tokio::time::timeout(Duration::from_secs(10), pipeline.run(signal))
            .await
            .expect("pipeline should stop on signal")
            .unwrap();
        assert!(stats.duration < Duration::from_secs(5));
    }
}
