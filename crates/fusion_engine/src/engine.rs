//! Track fusion engine

use contracts::{FusedTrack, FusionConfig, FusionMethod, SensorFrame, WorldTrack};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::cluster::{greedy_clusters, ClusterState};
use crate::identity::GlobalIdentityTable;

/// Cumulative engine counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionStats {
    pub cycles: u64,
    pub input_tracks: u64,
    pub output_tracks: u64,
    pub merged_clusters: u64,
    pub identities_allocated: u64,
    pub identities_purged: u64,
}

/// Greedy multi-radar track fusion with persistent global ids
#[derive(Debug)]
pub struct TrackFusionEngine {
    config: FusionConfig,
    identities: GlobalIdentityTable,
    stats: FusionStats,
}

impl TrackFusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            identities: GlobalIdentityTable::new(),
            stats: FusionStats::default(),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn identities(&self) -> &GlobalIdentityTable {
        &self.identities
    }

    pub fn stats(&self) -> &FusionStats {
        &self.stats
    }

    /// Fuse the given frames into one track list.
    ///
    /// Stale identities are purged first. Candidates keep frame order then
    /// track order, and the output follows cluster order.
    #[instrument(
        name = "fusion_cycle",
        level = "debug",
        skip(self, frames),
        fields(frames = frames.len())
    )]
    pub fn fuse(&mut self, frames: &[SensorFrame], now: f64) -> Vec<FusedTrack> {
        self.stats.cycles += 1;
        metrics::counter!("fusion_cycles_total").increment(1);

        let purged = self.identities.purge(now, self.config.identity_timeout_s);
        self.stats.identities_purged += purged as u64;

        let candidates: Vec<&WorldTrack> = frames.iter().flat_map(|f| f.tracks.iter()).collect();
        self.stats.input_tracks += candidates.len() as u64;

        let allocated_before = self.identities.allocated();
        let mut merged = 0u64;
        let tracks: Vec<FusedTrack> = greedy_clusters(&candidates, self.config.distance_threshold)
            .into_iter()
            .map(|indices| {
                let members: Vec<&WorldTrack> = indices.iter().map(|&i| candidates[i]).collect();
                if members.len() > 1 {
                    merged += 1;
                }
                self.emit(&members, now)
            })
            .collect();

        self.stats.output_tracks += tracks.len() as u64;
        self.stats.merged_clusters += merged;
        self.stats.identities_allocated += self.identities.allocated() - allocated_before;

        metrics::histogram!("fusion_output_tracks").record(tracks.len() as f64);
        metrics::counter!("fusion_merged_clusters_total").increment(merged);
        metrics::gauge!("fusion_identity_table_size").set(self.identities.len() as f64);

        debug!(
            input = candidates.len(),
            output = tracks.len(),
            merged,
            purged,
            identities = self.identities.len(),
            "fusion cycle done"
        );
        tracks
    }

    fn emit(&mut self, members: &[&WorldTrack], now: f64) -> FusedTrack {
        let state = match self.config.method {
            FusionMethod::WeightedAverage => ClusterState::merge(members),
        };

        let global_id = match state.keys.as_slice() {
            [key] => self.identities.resolve_single(key, now),
            keys => self.identities.resolve_cluster(keys, now),
        };

        FusedTrack {
            global_id,
            position: state.position,
            velocity: state.velocity,
            acceleration: state.acceleration,
            confidence: state.confidence,
            gating_gain: state.gating_gain,
            timestamp: state.timestamp,
            contributing_sensors: state.sensors,
            contributing_local_ids: state.keys.into_iter().collect(),
        }
    }
}
