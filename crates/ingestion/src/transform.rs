//! Per-radar rigid-body transform
//!
//! Radar axes: x right, y boresight, z up. The facing angle
//! `(pitch, yaw, roll)` rotates about x, z and y respectively; the per-axis
//! rotations are applied in the configured sequence (first letter first).
//! Points are rotated then translated by the mounting offset, free vectors
//! (velocity, acceleration) are only rotated.

use contracts::{Axis, FacingAngle, RadarConfig, RawTrack, SensorId, Vector3, WorldTrack};
use nalgebra as na;

/// How a vector responds to translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    /// Absolute point, rotated and translated
    Position,
    /// Free vector, rotated only
    Vector,
}

/// Precomputed pose of one radar, pure and shareable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarTransform {
    rotation: na::Rotation3<f64>,
    translation: na::Vector3<f64>,
}

impl Default for RadarTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RadarTransform {
    pub fn identity() -> Self {
        Self {
            rotation: na::Rotation3::identity(),
            translation: na::Vector3::zeros(),
        }
    }

    /// Build from mounting offset (m) and facing angle (degrees)
    pub fn from_pose(position_offset: [f64; 3], facing: &FacingAngle) -> Self {
        let [pitch, yaw, roll] = facing.angle;
        let rotation = facing
            .sequence
            .0
            .iter()
            .fold(na::Rotation3::identity(), |acc, axis| {
                let step = match axis {
                    Axis::X => na::Rotation3::from_axis_angle(&na::Vector3::x_axis(), pitch.to_radians()),
                    Axis::Y => na::Rotation3::from_axis_angle(&na::Vector3::y_axis(), roll.to_radians()),
                    Axis::Z => na::Rotation3::from_axis_angle(&na::Vector3::z_axis(), yaw.to_radians()),
                };
                // Later axes act on the already rotated vector
                step * acc
            });

        Self {
            rotation,
            translation: na::Vector3::from(position_offset),
        }
    }

    pub fn from_radar(radar: &RadarConfig) -> Self {
        Self::from_pose(radar.position_offset, &radar.facing_angle)
    }

    /// Transform mapping world coordinates back into radar coordinates
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    pub fn apply(&self, v: Vector3, kind: VectorKind) -> Vector3 {
        let input = na::Vector3::new(f64::from(v.x), f64::from(v.y), f64::from(v.z));
        let rotated = self.rotation * input;
        let out = match kind {
            VectorKind::Position => rotated + self.translation,
            VectorKind::Vector => rotated,
        };
        Vector3::new(out.x as f32, out.y as f32, out.z as f32)
    }

    pub fn transform(&self, points: &[Vector3], kind: VectorKind) -> Vec<Vector3> {
        points.iter().map(|p| self.apply(*p, kind)).collect()
    }

    /// Raw radar track to world track; confidence and gating gain pass through
    pub fn to_world(&self, track: &RawTrack, sensor: &SensorId, timestamp: f64) -> WorldTrack {
        WorldTrack {
            sensor: sensor.clone(),
            timestamp,
            local_id: track.local_id,
            position: self.apply(track.position, VectorKind::Position),
            velocity: self.apply(track.velocity, VectorKind::Vector),
            acceleration: self.apply(track.acceleration, VectorKind::Vector),
            gating_gain: track.gating_gain,
            confidence: track.confidence,
        }
    }

    /// World track back to radar coordinates
    pub fn to_radar(&self, track: &WorldTrack) -> RawTrack {
        let inv = self.inverse();
        RawTrack::new(
            track.local_id,
            inv.apply(track.position, VectorKind::Position),
            inv.apply(track.velocity, VectorKind::Vector),
            inv.apply(track.acceleration, VectorKind::Vector),
            track.gating_gain,
            track.confidence,
        )
    }
}

/// Optional world-frame box a radar's tracks must fall in
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldLimits {
    pub x: Option<[f64; 2]>,
    pub y: Option<[f64; 2]>,
    pub z: Option<[f64; 2]>,
}

impl WorldLimits {
    pub fn from_radar(radar: &RadarConfig) -> Self {
        Self {
            x: radar.xlim,
            y: radar.ylim,
            z: radar.zlim,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    /// Inclusive on both ends
    pub fn contains(&self, p: &Vector3) -> bool {
        let within = |lim: Option<[f64; 2]>, v: f32| match lim {
            Some([min, max]) => (min..=max).contains(&f64::from(v)),
            None => true,
        };
        within(self.x, p.x) && within(self.y, p.y) && within(self.z, p.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::AxisSequence;

    fn approx(a: Vector3, b: Vector3, tol: f32) -> bool {
        (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol && (a.z - b.z).abs() < tol
    }

    fn facing(pitch: f64, yaw: f64, roll: f64, seq: &str) -> FacingAngle {
        FacingAngle {
            angle: [pitch, yaw, roll],
            sequence: seq.parse::<AxisSequence>().unwrap(),
        }
    }

    #[test]
    fn null_pose_is_identity() {
        let t = RadarTransform::from_pose([0.0; 3], &FacingAngle::default());
        let samples = [
            Vector3::new(1.25, -3.5, 0.125),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(-100.0, 42.5, 7.75),
        ];
        for kind in [VectorKind::Position, VectorKind::Vector] {
            assert_eq!(t.transform(&samples, kind), samples.to_vec());
        }
    }

    #[test]
    fn translation_only_moves_points() {
        let t = RadarTransform::from_pose([1.0, -2.0, 2.5], &FacingAngle::default());
        let v = Vector3::new(0.5, 3.0, 0.0);
        assert_eq!(t.apply(v, VectorKind::Position), Vector3::new(1.5, 1.0, 2.5));
        assert_eq!(t.apply(v, VectorKind::Vector), v);
    }

    #[test]
    fn yaw_rotates_about_z() {
        let t = RadarTransform::from_pose([0.0; 3], &facing(0.0, 90.0, 0.0, "zyx"));
        let out = t.apply(Vector3::new(0.0, 1.0, 0.0), VectorKind::Vector);
        assert!(approx(out, Vector3::new(-1.0, 0.0, 0.0), 1e-6), "{out:?}");
    }

    #[test]
    fn downward_pitch_lowers_boresight() {
        let t = RadarTransform::from_pose([0.0, 0.0, 2.5], &facing(-20.0, 0.0, 0.0, "zyx"));
        let out = t.apply(Vector3::new(0.0, 3.0, 0.0), VectorKind::Position);
        let rad = 20f64.to_radians();
        let expected = Vector3::new(0.0, (3.0 * rad.cos()) as f32, (2.5 - 3.0 * rad.sin()) as f32);
        assert!(approx(out, expected, 1e-5), "{out:?}");
    }

    #[test]
    fn sequence_order_matters() {
        let zyx = RadarTransform::from_pose([0.0; 3], &facing(30.0, 45.0, 10.0, "zyx"));
        let xyz = RadarTransform::from_pose([0.0; 3], &facing(30.0, 45.0, 10.0, "xyz"));
        let v = Vector3::new(0.3, 1.0, -0.2);
        assert!(!approx(
            zyx.apply(v, VectorKind::Vector),
            xyz.apply(v, VectorKind::Vector),
            1e-4
        ));
    }

    #[test]
    fn inverse_reconstructs_points() {
        let t = RadarTransform::from_pose([-1.2, 0.4, 2.5], &facing(-20.0, 35.0, 5.0, "zyx"));
        let inv = t.inverse();
        for p in [
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(-3.0, 5.5, 1.2),
            Vector3::new(4.0, 0.1, -0.7),
        ] {
            let back = inv.apply(t.apply(p, VectorKind::Position), VectorKind::Position);
            assert!(approx(back, p, 1e-5), "{p:?} -> {back:?}");
            let back = inv.apply(t.apply(p, VectorKind::Vector), VectorKind::Vector);
            assert!(approx(back, p, 1e-5));
        }
    }

    #[test]
    fn world_track_round_trip_keeps_metadata() {
        let t = RadarTransform::from_pose([2.0, 0.0, 2.5], &facing(-10.0, -30.0, 0.0, "zyx"));
        let mut raw = RawTrack::new(
            12,
            Vector3::new(0.4, 3.1, -0.2),
            Vector3::new(0.1, -0.5, 0.0),
            Vector3::new(0.0, 0.0, -0.1),
            2.5,
            0.83,
        );
        raw.error_covariance[0] = 1.0;
        let sensor: SensorId = "radar2".into();
        let world = t.to_world(&raw, &sensor, 4.5);
        assert_eq!(world.sensor, "radar2");
        assert_eq!(world.gating_gain, 2.5);
        assert_eq!(world.confidence, 0.83);
        assert_eq!(world.timestamp, 4.5);

        let back = t.to_radar(&world);
        assert!(approx(back.position, raw.position, 1e-5));
        assert!(approx(back.velocity, raw.velocity, 1e-5));
    }

    #[test]
    fn limits_filter_points() {
        let limits = WorldLimits {
            x: None,
            y: Some([0.0, 6.0]),
            z: Some([0.0, 3.0]),
        };
        assert!(limits.contains(&Vector3::new(-9.0, 3.0, 1.0)));
        assert!(limits.contains(&Vector3::new(0.0, 6.0, 3.0)));
        assert!(!limits.contains(&Vector3::new(0.0, -0.1, 1.0)));
        assert!(!limits.contains(&Vector3::new(0.0, 1.0, 3.5)));
        assert!(WorldLimits::default().is_unbounded());
    }
}
