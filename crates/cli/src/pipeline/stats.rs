//! Pipeline statistics and metrics.

use std::time::Duration;

use fusion_engine::SchedulerStats;
use observability::FusionMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Final ingest counters per radar, config order
    pub sensors: Vec<(String, ingestion::MetricsSnapshot)>,

    /// Fusion scheduler counters (engine counters included)
    pub scheduler: SchedulerStats,

    /// Aggregated view of every published fused frame
    pub fusion_metrics: FusionMetricsAggregator,

    /// Final sink counters
    pub sinks: Vec<(String, dispatcher::MetricsSnapshot)>,

    /// Tasks that had to be aborted during shutdown
    pub aborted_tasks: usize,
}

impl PipelineStats {
    /// Published fused frames per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.scheduler.published as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn frames_parsed(&self) -> u64 {
        self.sensors.iter().map(|(_, s)| s.frames_parsed).sum()
    }

    /// Radar frames lost to backpressure, across all radars
    pub fn frames_dropped(&self) -> u64 {
        self.sensors.iter().map(|(_, s)| s.frames_dropped).sum()
    }

    /// Share of fusion cycles whose output was dropped, in percent
    pub fn drop_rate(&self) -> f64 {
        let total = self.scheduler.published + self.scheduler.dropped;
        if total > 0 {
            (self.scheduler.dropped as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let scheduler = &self.scheduler;
        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Fused frames published: {}", scheduler.published);
        println!("   ├─ Output rate: {:.2} Hz", self.fps());
        println!(
            "   ├─ Output dropped: {} ({:.2}%)",
            scheduler.dropped,
            self.drop_rate()
        );
        println!("   └─ Aborted tasks: {}", self.aborted_tasks);

        println!("\n📡 Radars ({})", self.sensors.len());
        for (i, (name, s)) in self.sensors.iter().enumerate() {
            let prefix = if i == self.sensors.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {}: {} frames, {} tracks, {} dropped, {} parse errors, {} io errors, {} out of bounds",
                prefix,
                name,
                s.frames_parsed,
                s.tracks_published,
                s.frames_dropped,
                s.parse_errors,
                s.io_errors,
                s.tracks_out_of_bounds
            );
        }

        let fusion = &scheduler.fusion;
        println!("\n🔗 Fusion Engine");
        println!("   ├─ Cycles: {} ({} idle ticks)", scheduler.cycles, scheduler.idle_ticks);
        println!("   ├─ Frames received: {}", scheduler.frames_received);
        println!("   ├─ Frames superseded: {}", scheduler.frames_superseded);
        println!(
            "   ├─ Tracks in/out: {}/{}",
            fusion.input_tracks, fusion.output_tracks
        );
        println!("   ├─ Merged clusters: {}", fusion.merged_clusters);
        println!(
            "   ├─ Global ids allocated/purged: {}/{}",
            fusion.identities_allocated, fusion.identities_purged
        );
        println!("   └─ Mean tracks per frame: {:.2}", scheduler.mean_tracks());

        let summary = self.fusion_metrics.summary();
        println!("\n📈 Output Metrics");
        println!(
            "   ├─ Merged tracks: {} ({:.2}%)",
            summary.merged_tracks, summary.merged_rate
        );
        println!("   ├─ Highest global id: {}", summary.max_global_id);
        println!("   ├─ Tracks per frame: {}", summary.tracks_per_frame);
        println!("   └─ Track age (ms): {}", summary.track_age_ms);

        if !self.sinks.is_empty() {
            println!("\n📤 Sinks");
            for (i, (name, s)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} written ({} tracks), {} failed, {} dropped",
                    prefix, name, s.write_count, s.tracks_written, s.failure_count, s.dropped_count
                );
            }
        }

        println!();
    }
}
