//! # Fusion Engine
//!
//! Multi-radar track fusion.
//!
//! Responsibilities:
//! - Greedy spatial association of world-frame tracks across radars
//! - Confidence-weighted merging of associated tracks
//! - Global identities that survive across cycles and expire when idle
//! - Fixed-rate scheduling over latest-frame slots, output `FusedFrame`
//!
//! ## Usage Example
//!
//! ```ignore
//! use fusion_engine::{FusionScheduler, TrackFusionEngine};
//!
//! // one-shot
//! let mut engine = TrackFusionEngine::new(blueprint.fusion.clone());
//! let tracks = engine.fuse(&frames, clock.now());
//!
//! // continuous
//! let scheduler = FusionScheduler::new(blueprint.fusion.clone(), receivers, clock);
//! let (tx, rx) = tokio::sync::mpsc::channel(blueprint.fusion.output_queue_capacity);
//! tokio::spawn(scheduler.run(tx, shutdown_rx));
//! ```

mod cluster;
mod engine;
mod identity;
mod scheduler;
mod slots;

// Re-exports
pub use cluster::{greedy_clusters, ClusterState};
pub use engine::{FusionStats, TrackFusionEngine};
pub use identity::GlobalIdentityTable;
pub use scheduler::{FusionScheduler, SchedulerStats};
pub use slots::LatestFrameSlots;

pub use contracts::{FusedFrame, FusedTrack, FusionConfig, SlotRetention};
