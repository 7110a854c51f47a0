//! Synthetic radar byte source
//!
//! Simulates a radar watching objects that circle around fixed centres in the
//! world frame. Each object is seen through the radar's own pose, so two
//! radars sharing a seed report the same objects in different local
//! coordinates. Output is real wire-format frames.

use std::f64::consts::TAU;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use contracts::wire::encode_target_frame;
use contracts::{ByteSource, PipelineClock, RawTrack, SyntheticConfig, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::transform::{RadarTransform, VectorKind};

/// One simulated object on a horizontal circle
#[derive(Debug, Clone, PartialEq)]
struct SimObject {
    center: [f64; 3],
    radius: f64,
    omega: f64,
    phase: f64,
}

impl SimObject {
    /// (position, velocity, acceleration) in world coordinates at time `t`
    fn state(&self, t: f64) -> ([f64; 3], [f64; 3], [f64; 3]) {
        let angle = self.omega * t + self.phase;
        let (sin, cos) = angle.sin_cos();
        let r = self.radius;
        let w = self.omega;
        (
            [self.center[0] + r * cos, self.center[1] + r * sin, self.center[2]],
            [-r * w * sin, r * w * cos, 0.0],
            [-r * w * w * cos, -r * w * w * sin, 0.0],
        )
    }
}

/// Objects derived from the seed only, identical for every radar sharing it
fn spawn_objects(seed: u64, count: usize) -> Vec<SimObject> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| SimObject {
            center: [
                rng.random_range(-1.0..1.0) + i as f64,
                rng.random_range(1.5..4.0),
                rng.random_range(0.5..1.5),
            ],
            radius: rng.random_range(0.2..0.8),
            omega: rng.random_range(0.1..0.5),
            phase: rng.random_range(0.0..TAU),
        })
        .collect()
}

fn vec3(v: [f64; 3]) -> Vector3 {
    Vector3::new(v[0] as f32, v[1] as f32, v[2] as f32)
}

/// Byte source emitting synthetic target-list frames at a fixed rate
pub struct SyntheticByteSource {
    config: SyntheticConfig,
    /// World to radar coordinates
    to_radar: RadarTransform,
    clock: PipelineClock,
    objects: Vec<SimObject>,
    rng: StdRng,
    /// Position noise, `None` when `noise_std` is not positive
    noise: Option<Normal<f64>>,
    period: Duration,
    next_emit: Instant,
    frame_number: u32,
}

impl SyntheticByteSource {
    /// `pose` is the radar's radar-to-world transform
    pub fn new(config: SyntheticConfig, pose: &RadarTransform, clock: PipelineClock) -> Self {
        let objects = spawn_objects(config.seed, config.num_objects);
        let noise_seed = config.seed ^ (u64::from(config.id_offset) << 16) ^ 0x5eed;
        let period = Duration::from_secs_f64(1.0 / config.frame_rate_hz.max(0.1));
        let noise = (config.noise_std > 0.0)
            .then(|| Normal::new(0.0, config.noise_std).ok())
            .flatten();
        Self {
            to_radar: pose.inverse(),
            clock,
            objects,
            rng: StdRng::seed_from_u64(noise_seed),
            noise,
            period,
            next_emit: Instant::now(),
            frame_number: 0,
            config,
        }
    }

    /// Tracks of the next frame, in radar coordinates
    fn generate_tracks(&mut self, t: f64) -> Vec<RawTrack> {
        let mut tracks = Vec::with_capacity(self.objects.len());
        for (i, obj) in self.objects.iter().enumerate() {
            if self.rng.random::<f64>() < self.config.dropout {
                continue;
            }
            let (mut noisy, vel, acc) = obj.state(t);
            if let Some(noise) = &self.noise {
                for axis in noisy.iter_mut() {
                    *axis += noise.sample(&mut self.rng);
                }
            }
            let confidence = self.rng.random_range(0.6f32..0.95);

            tracks.push(RawTrack::new(
                self.config.id_offset + i as u32 + 1,
                self.to_radar.apply(vec3(noisy), VectorKind::Position),
                self.to_radar.apply(vec3(vel), VectorKind::Vector),
                self.to_radar.apply(vec3(acc), VectorKind::Vector),
                1.0,
                confidence,
            ));
        }
        tracks
    }
}

impl ByteSource for SyntheticByteSource {
    fn describe(&self) -> String {
        format!(
            "synthetic({} objects @ {:.1} Hz, seed {})",
            self.config.num_objects, self.config.frame_rate_hz, self.config.seed
        )
    }

    async fn read(&mut self, buf: &mut BytesMut, timeout: Duration) -> io::Result<usize> {
        let now = Instant::now();
        if self.next_emit > now {
            let wait = self.next_emit - now;
            if wait > timeout {
                sleep(timeout).await;
                return Ok(0);
            }
            sleep(wait).await;
        }

        // Skip missed periods instead of bursting
        self.next_emit += self.period;
        if self.next_emit < Instant::now() {
            self.next_emit = Instant::now() + self.period;
        }

        let tracks = self.generate_tracks(self.clock.now());
        let frame = encode_target_frame(self.frame_number, &tracks);
        trace!(frame_number = self.frame_number, tracks = tracks.len(), "synthetic frame");
        self.frame_number = self.frame_number.wrapping_add(1);
        buf.extend_from_slice(&frame);
        Ok(frame.len())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_frame;
    use contracts::FacingAngle;

    fn config(seed: u64, id_offset: u32) -> SyntheticConfig {
        SyntheticConfig {
            frame_rate_hz: 200.0,
            num_objects: 3,
            noise_std: 0.0,
            dropout: 0.0,
            id_offset,
            seed,
        }
    }

    #[test]
    fn objects_depend_only_on_seed() {
        assert_eq!(spawn_objects(3, 2), spawn_objects(3, 2));
        assert_ne!(spawn_objects(3, 2), spawn_objects(4, 2));
    }

    #[test]
    fn circular_motion_derivatives() {
        let obj = SimObject {
            center: [0.0, 2.0, 1.0],
            radius: 0.5,
            omega: 0.4,
            phase: 0.0,
        };
        let (p, v, a) = obj.state(0.0);
        assert_eq!(p, [0.5, 2.0, 1.0]);
        assert!((v[1] - 0.2).abs() < 1e-12);
        assert!((a[0] + 0.08).abs() < 1e-12);
    }

    #[tokio::test]
    async fn emits_parseable_frames_with_offset_ids() {
        let pose = RadarTransform::from_pose([1.0, 0.0, 2.5], &FacingAngle::default());
        let mut source = SyntheticByteSource::new(config(5, 1000), &pose, PipelineClock::start());
        let mut buf = BytesMut::new();

        let n = source.read(&mut buf, Duration::from_millis(100)).await.unwrap();
        assert_eq!(n, buf.len());
        let parsed = parse_frame(&buf).unwrap();
        assert_eq!(parsed.frame_number(), 0);
        let ids: Vec<u32> = parsed.tracks.iter().map(|t| t.local_id).collect();
        assert_eq!(ids, vec![1001, 1002, 1003]);
    }

    #[tokio::test]
    async fn radars_sharing_a_seed_agree_in_world_frame() {
        let clock = PipelineClock::start();
        let left = RadarTransform::from_pose([-1.0, 0.0, 2.5], &FacingAngle::default());
        let right = RadarTransform::from_pose(
            [1.0, 0.0, 2.5],
            &FacingAngle {
                angle: [-15.0, 30.0, 0.0],
                ..FacingAngle::default()
            },
        );
        let mut a = SyntheticByteSource::new(config(9, 0), &left, clock);
        let mut b = SyntheticByteSource::new(config(9, 1000), &right, clock);

        let t = 1.5;
        let ta = a.generate_tracks(t);
        let tb = b.generate_tracks(t);
        for (ra, rb) in ta.iter().zip(&tb) {
            let wa = left.apply(ra.position, VectorKind::Position);
            let wb = right.apply(rb.position, VectorKind::Position);
            assert!(wa.distance(&wb) < 1e-4, "{wa:?} vs {wb:?}");
        }
    }

    #[test]
    fn noise_scatters_positions_around_the_true_state() {
        let mut cfg = config(11, 0);
        cfg.num_objects = 1;
        cfg.noise_std = 0.05;
        let pose = RadarTransform::identity();
        let mut noisy = SyntheticByteSource::new(cfg.clone(), &pose, PipelineClock::start());
        assert!(noisy.noise.is_some());

        let (truth, _, _) = noisy.objects[0].state(2.0);
        let truth = vec3(truth);
        let offsets: Vec<f64> = (0..200)
            .map(|_| noisy.generate_tracks(2.0)[0].position.distance(&truth))
            .collect();
        assert!(offsets.iter().any(|d| *d > 1e-6));
        let mean = offsets.iter().sum::<f64>() / offsets.len() as f64;
        assert!(mean < 0.3, "mean offset {mean}");

        cfg.noise_std = 0.0;
        let mut exact = SyntheticByteSource::new(cfg, &pose, PipelineClock::start());
        assert!(exact.noise.is_none());
        assert!(exact.generate_tracks(2.0)[0].position.distance(&truth) < 1e-6);
    }

    #[tokio::test]
    async fn idle_read_returns_zero_within_timeout() {
        let mut cfg = config(1, 0);
        cfg.frame_rate_hz = 1.0;
        let mut source =
            SyntheticByteSource::new(cfg, &RadarTransform::identity(), PipelineClock::start());
        let mut buf = BytesMut::new();
        assert!(source.read(&mut buf, Duration::from_millis(10)).await.unwrap() > 0);
        let n = source.read(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(n, 0);
    }
}
