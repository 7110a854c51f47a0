//! FusedTrack / FusedFrame - Fusion engine output
//!
//! One FusedFrame is published per fusion cycle and fanned out to every sink.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{SensorId, Vector3};

/// Key of one sensor-local track: (radar name, local id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackKey {
    pub sensor: SensorId,
    pub local_id: u32,
}

impl TrackKey {
    pub fn new(sensor: SensorId, local_id: u32) -> Self {
        Self { sensor, local_id }
    }
}

/// World-frame track with a fusion-assigned global identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedTrack {
    /// Global id, stable across cycles while the identity stays live
    pub global_id: u32,

    pub position: Vector3,
    pub velocity: Vector3,
    pub acceleration: Vector3,

    /// Max confidence of the contributing tracks
    pub confidence: f32,

    /// Mean gating gain of the contributing tracks
    pub gating_gain: f32,

    /// Mean capture time of the contributing tracks
    pub timestamp: f64,

    /// Radars that saw this object in the cycle
    pub contributing_sensors: BTreeSet<SensorId>,

    /// Every sensor-local track merged into this one
    pub contributing_local_ids: BTreeSet<TrackKey>,
}

impl FusedTrack {
    /// Number of distinct radars that contributed
    pub fn num_sensors(&self) -> usize {
        self.contributing_sensors.len()
    }

    /// True if more than one sensor-local track was merged
    pub fn is_merged(&self) -> bool {
        self.contributing_local_ids.len() > 1
    }
}

/// Result of one fusion cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedFrame {
    /// Fusion cycle counter (monotonically increasing)
    pub cycle: u64,

    /// Monotonic time of the cycle (seconds)
    pub timestamp: f64,

    /// Radars whose latest frame took part in this cycle
    pub sensors_fused: Vec<SensorId>,

    /// Fused tracks in cluster order
    pub tracks: Vec<FusedTrack>,
}

impl FusedFrame {
    pub fn merged_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_merged()).count()
    }
}
