//! Fixed-rate fusion scheduler
//!
//! Decouples radar frame rates from the output cadence: each tick drains the
//! per-radar queues without waiting, fuses the latest slots and publishes.

use std::time::{Duration, Instant};

use async_channel::{Receiver, TryRecvError};
use contracts::{FusedFrame, FusionConfig, PipelineClock, SensorFrame, SensorId};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::engine::{FusionStats, TrackFusionEngine};
use crate::slots::LatestFrameSlots;

/// Scheduler counters, engine counters included
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    /// Ticks that fused at least one slot
    pub cycles: u64,
    /// Ticks with no populated slot
    pub idle_ticks: u64,
    pub frames_received: u64,
    /// Frames replaced in their slot before being fused
    pub frames_superseded: u64,
    pub published: u64,
    /// Fused frames dropped on a full output queue
    pub dropped: u64,
    pub tracks_published: u64,
    pub fusion: FusionStats,
}

impl SchedulerStats {
    pub fn mean_tracks(&self) -> f64 {
        if self.published == 0 {
            0.0
        } else {
            self.tracks_published as f64 / self.published as f64
        }
    }
}

/// Outcome of publishing one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Publish {
    Sent,
    Dropped,
    Closed,
}

/// Drives a [`TrackFusionEngine`] at `output_rate_hz`
pub struct FusionScheduler {
    engine: TrackFusionEngine,
    inputs: Vec<Receiver<SensorFrame>>,
    slots: LatestFrameSlots,
    clock: PipelineClock,
    stats: SchedulerStats,
}

impl FusionScheduler {
    pub fn new(
        config: FusionConfig,
        inputs: Vec<(SensorId, Receiver<SensorFrame>)>,
        clock: PipelineClock,
    ) -> Self {
        let (sensors, inputs): (Vec<_>, Vec<_>) = inputs.into_iter().unzip();
        let slots = LatestFrameSlots::new(sensors, config.slot_retention, config.slot_max_age_s);
        Self {
            engine: TrackFusionEngine::new(config),
            inputs,
            slots,
            clock,
            stats: SchedulerStats::default(),
        }
    }

    pub fn engine(&self) -> &TrackFusionEngine {
        &self.engine
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            frames_superseded: self.slots.superseded(),
            fusion: self.engine.stats().clone(),
            ..self.stats.clone()
        }
    }

    /// Tick period for the configured output rate
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.engine.config().output_rate_hz)
    }

    /// Run one cycle now
    ///
    /// Returns `None` when no slot is populated or fusion produced no tracks.
    pub fn tick(&mut self) -> Option<FusedFrame> {
        self.drain_inputs();

        let now = self.clock.now();
        let frames = self.slots.take_for_fusion(now);
        if frames.is_empty() {
            self.stats.idle_ticks += 1;
            return None;
        }

        let started = Instant::now();
        let tracks = self.engine.fuse(&frames, now);
        metrics::histogram!("fusion_cycle_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        self.stats.cycles += 1;
        if tracks.is_empty() {
            return None;
        }

        Some(FusedFrame {
            cycle: self.stats.cycles,
            timestamp: now,
            sensors_fused: frames.into_iter().map(|f| f.sensor).collect(),
            tracks,
        })
    }

    /// Run until shutdown or until the output side goes away
    #[instrument(name = "fusion_scheduler", skip_all, fields(sensors = self.slots.len()))]
    pub async fn run(
        mut self,
        tx: mpsc::Sender<FusedFrame>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerStats {
        let period = self.period();
        let stats_every = self.engine.config().stats_interval_cycles.max(1);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_ms = period.as_millis() as u64, "fusion scheduler started");

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("fusion scheduler received shutdown");
                        break;
                    }
                }
                _ = interval.tick() => {
                    let cycles_before = self.stats.cycles;
                    if let Some(frame) = self.tick() {
                        if self.publish(&tx, frame) == Publish::Closed {
                            warn!("fused output channel closed, stopping scheduler");
                            break;
                        }
                    }
                    if self.stats.cycles != cycles_before && self.stats.cycles % stats_every == 0 {
                        self.log_stats();
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            cycles = stats.cycles,
            published = stats.published,
            dropped = stats.dropped,
            "fusion scheduler stopped"
        );
        stats
    }

    fn drain_inputs(&mut self) {
        for (index, rx) in self.inputs.iter().enumerate() {
            loop {
                match rx.try_recv() {
                    Ok(frame) => {
                        self.stats.frames_received += 1;
                        self.slots.offer(index, frame);
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
        }
    }

    fn publish(&mut self, tx: &mpsc::Sender<FusedFrame>, frame: FusedFrame) -> Publish {
        let tracks = frame.tracks.len() as u64;
        match tx.try_send(frame) {
            Ok(()) => {
                self.stats.published += 1;
                self.stats.tracks_published += tracks;
                Publish::Sent
            }
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.stats.dropped += 1;
                metrics::counter!("fusion_frames_dropped_total").increment(1);
                debug!(cycle = frame.cycle, "fused output queue full, frame dropped");
                Publish::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Publish::Closed,
        }
    }

    fn log_stats(&self) {
        info!(
            cycles = self.stats.cycles,
            published = self.stats.published,
            dropped = self.stats.dropped,
            mean_tracks = self.stats.mean_tracks(),
            identities = self.engine.identities().len(),
            "fusion stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SlotRetention, Vector3, WorldTrack};

    fn frame(sensor: &str, n: u32, pos: [f32; 3], timestamp: f64) -> SensorFrame {
        SensorFrame {
            sensor: sensor.into(),
            frame_number: n,
            timestamp,
            tracks: vec![WorldTrack {
                sensor: sensor.into(),
                timestamp,
                local_id: 1,
                position: pos.into(),
                velocity: Vector3::ZERO,
                acceleration: Vector3::ZERO,
                gating_gain: 1.0,
                confidence: 0.9,
            }],
        }
    }

    fn scheduler(
        config: FusionConfig,
    ) -> (FusionScheduler, async_channel::Sender<SensorFrame>, async_channel::Sender<SensorFrame>) {
        let (tx1, rx1) = async_channel::bounded(8);
        let (tx2, rx2) = async_channel::bounded(8);
        let sched = FusionScheduler::new(
            config,
            vec![("r1".into(), rx1), ("r2".into(), rx2)],
            PipelineClock::start(),
        );
        (sched, tx1, tx2)
    }

    #[test]
    fn idle_tick_fuses_nothing() {
        let (mut sched, _tx1, _tx2) = scheduler(FusionConfig::default());
        assert!(sched.tick().is_none());
        assert_eq!(sched.stats().idle_ticks, 1);
        assert_eq!(sched.stats().cycles, 0);
    }

    #[test]
    fn tick_uses_latest_frame_per_sensor() {
        let (mut sched, tx1, tx2) = scheduler(FusionConfig::default());
        tx1.try_send(frame("r1", 1, [0.0, 1.0, 0.0], 0.0)).unwrap();
        tx1.try_send(frame("r1", 2, [0.0, 3.0, 0.0], 0.0)).unwrap();
        tx2.try_send(frame("r2", 1, [0.1, 3.0, 0.0], 0.0)).unwrap();

        let fused = sched.tick().unwrap();
        assert_eq!(fused.cycle, 1);
        assert_eq!(fused.sensors_fused, vec![SensorId::from("r1"), SensorId::from("r2")]);
        assert_eq!(fused.tracks.len(), 1);
        assert!(fused.tracks[0].is_merged());

        let stats = sched.stats();
        assert_eq!(stats.frames_received, 3);
        assert_eq!(stats.frames_superseded, 1);
    }

    #[test]
    fn clear_after_fuse_does_not_refuse() {
        let config = FusionConfig {
            slot_retention: SlotRetention::ClearAfterFuse,
            ..FusionConfig::default()
        };
        let (mut sched, tx1, _tx2) = scheduler(config);
        tx1.try_send(frame("r1", 1, [0.0, 1.0, 0.0], 0.0)).unwrap();
        assert!(sched.tick().is_some());
        assert!(sched.tick().is_none());
        assert_eq!(sched.stats().fusion.cycles, 1);
    }

    #[test]
    fn retain_fuses_silent_radar_again() {
        let (mut sched, tx1, _tx2) = scheduler(FusionConfig::default());
        tx1.try_send(frame("r1", 1, [0.0, 1.0, 0.0], 0.0)).unwrap();
        let a = sched.tick().unwrap();
        let b = sched.tick().unwrap();
        assert_eq!(a.tracks[0].global_id, b.tracks[0].global_id);
        assert_eq!(b.cycle, 2);
    }

    #[tokio::test]
    async fn output_rate_is_bounded_by_cadence() {
        let config = FusionConfig {
            output_rate_hz: 20.0,
            output_queue_capacity: 64,
            ..FusionConfig::default()
        };
        let (sched, tx1, _tx2) = scheduler(config);
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(sched.run(out_tx, stop_rx));

        // ~500 Hz input against a 20 Hz cadence
        let producer = tokio::spawn(async move {
            for n in 0..250u32 {
                let _ = tx1.try_send(frame("r1", n, [0.0, 1.0, 0.0], 0.0));
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        stop_tx.send(true).unwrap();
        let stats = handle.await.unwrap();
        producer.abort();

        let mut received = 0;
        while out_rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, stats.published);
        assert!(stats.published >= 3, "published {}", stats.published);
        assert!(stats.published <= 12, "published {}", stats.published);
        assert!(stats.frames_received > stats.published);
    }

    #[tokio::test]
    async fn slow_input_does_not_stall_ticks() {
        let config = FusionConfig {
            output_rate_hz: 20.0,
            ..FusionConfig::default()
        };
        let (sched, tx1, _tx2) = scheduler(config);
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = watch::channel(false);

        tx1.try_send(frame("r1", 1, [0.0, 1.0, 0.0], 0.0)).unwrap();
        let handle = tokio::spawn(sched.run(out_tx, stop_rx));

        tokio::time::sleep(Duration::from_millis(400)).await;
        stop_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        // one input frame, retained and re-fused every tick
        assert_eq!(stats.frames_received, 1);
        assert!(stats.published >= 4, "published {}", stats.published);
        assert!(out_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn full_output_queue_drops() {
        let (mut sched, tx1, _tx2) = scheduler(FusionConfig::default());
        let (out_tx, _out_rx) = mpsc::channel(1);
        tx1.try_send(frame("r1", 1, [0.0, 1.0, 0.0], 0.0)).unwrap();

        let first = sched.tick().unwrap();
        assert_eq!(sched.publish(&out_tx, first), Publish::Sent);
        let second = sched.tick().unwrap();
        assert_eq!(sched.publish(&out_tx, second), Publish::Dropped);
        assert_eq!(sched.stats().dropped, 1);
    }
}
