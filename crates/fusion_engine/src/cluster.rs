//! Greedy spatial association and cluster merging

use std::collections::BTreeSet;

use contracts::{SensorId, TrackKey, Vector3, WorldTrack};

/// Partition candidates into clusters, in candidate order.
///
/// Each unclaimed seed takes every unclaimed candidate strictly closer than
/// `threshold`. Order dependent, not an optimal assignment.
pub fn greedy_clusters(candidates: &[&WorldTrack], threshold: f64) -> Vec<Vec<usize>> {
    let mut claimed = vec![false; candidates.len()];
    let mut clusters = Vec::new();

    for seed in 0..candidates.len() {
        if claimed[seed] {
            continue;
        }
        claimed[seed] = true;
        let mut members = vec![seed];

        for other in (seed + 1)..candidates.len() {
            if claimed[other] {
                continue;
            }
            let d = candidates[seed].position.distance(&candidates[other].position);
            if d < threshold {
                claimed[other] = true;
                members.push(other);
            }
        }
        clusters.push(members);
    }
    clusters
}

/// Kinematic state of one cluster, before identity assignment
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterState {
    pub position: Vector3,
    pub velocity: Vector3,
    pub acceleration: Vector3,
    pub confidence: f32,
    pub gating_gain: f32,
    pub timestamp: f64,
    pub sensors: BTreeSet<SensorId>,
    pub keys: Vec<TrackKey>,
}

impl ClusterState {
    /// Combine members with confidence weights `c_i / Σc`
    ///
    /// Uniform weights when `Σc <= 0`. Confidence is the max, gating gain and
    /// timestamp are plain means. A single member passes through unchanged.
    pub fn merge(members: &[&WorldTrack]) -> Self {
        let keys: Vec<TrackKey> = members
            .iter()
            .map(|t| TrackKey::new(t.sensor.clone(), t.local_id))
            .collect();
        let sensors = members.iter().map(|t| t.sensor.clone()).collect();

        if let [only] = members {
            return Self {
                position: only.position,
                velocity: only.velocity,
                acceleration: only.acceleration,
                confidence: only.confidence,
                gating_gain: only.gating_gain,
                timestamp: only.timestamp,
                sensors,
                keys,
            };
        }

        let n = members.len() as f64;
        let total: f64 = members.iter().map(|t| f64::from(t.confidence)).sum();
        let weights: Vec<f64> = if total > 0.0 {
            members
                .iter()
                .map(|t| f64::from(t.confidence) / total)
                .collect()
        } else {
            vec![1.0 / n; members.len()]
        };

        let confidence = members
            .iter()
            .map(|t| t.confidence)
            .fold(f32::NEG_INFINITY, f32::max);
        let gating_gain = members.iter().map(|t| f64::from(t.gating_gain)).sum::<f64>() / n;
        let timestamp = members.iter().map(|t| t.timestamp).sum::<f64>() / n;

        Self {
            position: weighted(members, &weights, |t| t.position),
            velocity: weighted(members, &weights, |t| t.velocity),
            acceleration: weighted(members, &weights, |t| t.acceleration),
            confidence,
            gating_gain: gating_gain as f32,
            timestamp,
            sensors,
            keys,
        }
    }
}

fn weighted(
    members: &[&WorldTrack],
    weights: &[f64],
    field: impl Fn(&WorldTrack) -> Vector3,
) -> Vector3 {
    let mut acc = [0.0f64; 3];
    for (track, w) in members.iter().zip(weights) {
        let v = field(track);
        acc[0] += f64::from(v.x) * w;
        acc[1] += f64::from(v.y) * w;
        acc[2] += f64::from(v.z) * w;
    }
    Vector3::new(acc[0] as f32, acc[1] as f32, acc[2] as f32)
}
