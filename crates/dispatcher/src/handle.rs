//! SinkHandle - one sink behind its own bounded queue and worker task

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DataSink, FusedFrame};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Arc<FusedFrame>>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task for `sink`
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_handle = tokio::spawn(sink_worker(
            sink,
            rx,
            Arc::clone(&metrics),
            name.clone(),
        ));

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a frame without waiting
    ///
    /// Returns false if the queue was full (frame dropped) or the worker is gone.
    pub fn try_send(&self, frame: Arc<FusedFrame>) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(f)) => {
                self.metrics.record_dropped();
                metrics::counter!("dispatcher_frames_dropped_total", "sink" => self.name.clone())
                    .increment(1);
                warn!(sink = %self.name, cycle = f.cycle, "Queue full, frame dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Close the queue and wait for the worker to drain it
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Writes queued frames until the handle drops its sender.
///
/// Buffered sinks are flushed whenever the queue runs dry, so consumers
/// tailing a file see each burst as soon as it is written.
#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<FusedFrame>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");
    let write_latency = metrics::histogram!("dispatcher_write_duration_seconds", "sink" => name.clone());

    while let Some(frame) = rx.recv().await {
        let started = Instant::now();
        match sink.write(&frame).await {
            Ok(()) => metrics.record_write(frame.tracks.len()),
            Err(e) => {
                metrics.record_failure();
                metrics::counter!("dispatcher_write_failures_total", "sink" => name.clone())
                    .increment(1);
                error!(cycle = frame.cycle, error = %e, "Write failed");
            }
        }
        write_latency.record(started.elapsed().as_secs_f64());

        let backlog = rx.len();
        metrics.set_queue_len(backlog);
        if backlog == 0 {
            if let Err(e) = sink.flush().await {
                warn!(error = %e, "Flush failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }

    debug!(
        written = metrics.write_count(),
        failed = metrics.failure_count(),
        "Sink worker stopped"
    );
}
