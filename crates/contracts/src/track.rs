//! Track data model - Ingestion output
//!
//! RawTrack is what the radar reports in its own axes, WorldTrack is the same
//! detection after the per-radar pose has been applied.

use serde::{Deserialize, Serialize};

use crate::SensorId;

/// Number of floats in the per-target error covariance block (4x4)
pub const ERROR_COVARIANCE_LEN: usize = 16;

/// 3D vector in meters (or m/s, m/s²)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Euclidean distance, computed in f64
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Vector magnitude
    pub fn norm(&self) -> f64 {
        self.distance(&Self::ZERO)
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// One sensor-local target as decoded from a type 1010 TLV record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrack {
    /// Sensor-local track id (reassigned freely by the radar)
    pub local_id: u32,

    /// Position (m)
    pub position: Vector3,

    /// Velocity (m/s)
    pub velocity: Vector3,

    /// Acceleration (m/s²)
    pub acceleration: Vector3,

    /// 4x4 error covariance, row-major. Carried through, not used by fusion.
    pub error_covariance: [f32; ERROR_COVARIANCE_LEN],

    /// Tracker gating gain
    pub gating_gain: f32,

    /// Track confidence (0-1)
    pub confidence: f32,
}

impl RawTrack {
    /// Track with zero covariance, used by encoders and tests
    pub fn new(
        local_id: u32,
        position: Vector3,
        velocity: Vector3,
        acceleration: Vector3,
        gating_gain: f32,
        confidence: f32,
    ) -> Self {
        Self {
            local_id,
            position,
            velocity,
            acceleration,
            error_covariance: [0.0; ERROR_COVARIANCE_LEN],
            gating_gain,
            confidence,
        }
    }
}

/// RawTrack expressed in the shared world frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldTrack {
    /// Radar that produced the track
    pub sensor: SensorId,

    /// Monotonic capture time (seconds)
    pub timestamp: f64,

    pub local_id: u32,
    pub position: Vector3,
    pub velocity: Vector3,
    pub acceleration: Vector3,
    pub gating_gain: f32,
    pub confidence: f32,
}

/// One parsed radar frame in world coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Radar name
    pub sensor: SensorId,

    /// Frame number from the radar header
    pub frame_number: u32,

    /// Monotonic capture time (seconds)
    pub timestamp: f64,

    /// Tracks in wire order
    pub tracks: Vec<WorldTrack>,
}

impl SensorFrame {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-9);
        assert!((b.norm() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn raw_track_defaults_covariance_to_zero() {
        let t = RawTrack::new(7, Vector3::ZERO, Vector3::ZERO, Vector3::ZERO, 1.0, 0.5);
        assert!(t.error_covariance.iter().all(|v| *v == 0.0));
        assert_eq!(t.local_id, 7);
    }
}
