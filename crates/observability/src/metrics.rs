//! 融合输出指标收集模块
//!
//! 基于 FusedFrame 收集和统计融合管道的运行指标。

use std::collections::BTreeMap;

use contracts::FusedFrame;
use metrics::{counter, gauge, histogram};

/// 从 FusedFrame 记录指标
///
/// 每个发布的 FusedFrame 调用一次。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_fused_frame;
///
/// while let Some(frame) = fused_rx.recv().await {
///     record_fused_frame(&frame);
///     // ...
/// }
/// ```
pub fn record_fused_frame(frame: &FusedFrame) {
    counter!("fusion_frames_published_total").increment(1);
    gauge!("fusion_last_cycle").set(frame.cycle as f64);
    gauge!("fusion_sensors_fused").set(frame.sensors_fused.len() as f64);

    // 多雷达关联的航迹
    let multi_sensor = frame.tracks.iter().filter(|t| t.num_sensors() > 1).count();
    gauge!("fusion_multi_sensor_tracks").set(multi_sensor as f64);

    // 航迹年龄：周期时间 - 成员平均采集时间
    for track in &frame.tracks {
        histogram!("fusion_track_age_seconds")
            .record((frame.timestamp - track.timestamp).max(0.0));
    }

    for sensor in &frame.sensors_fused {
        counter!("fusion_sensor_participation_total", "sensor" => sensor.to_string())
            .increment(1);
    }
}

/// 记录单个雷达的接入累计值（运行结束时调用）
pub fn record_ingest_totals(
    sensor: &str,
    frames_parsed: u64,
    frames_dropped: u64,
    parse_errors: u64,
) {
    let sensor = sensor.to_string();
    gauge!("radar_frames_parsed_final", "sensor" => sensor.clone()).set(frames_parsed as f64);
    gauge!("radar_frames_dropped_final", "sensor" => sensor.clone()).set(frames_dropped as f64);
    gauge!("radar_parse_errors_final", "sensor" => sensor).set(parse_errors as f64);
}

/// 记录 sink 写入结果（运行结束时调用）
pub fn record_sink_snapshot(sink: &str, written: u64, failed: u64, dropped: u64) {
    let sink = sink.to_string();
    gauge!("dispatcher_frames_written_final", "sink" => sink.clone()).set(written as f64);
    gauge!("dispatcher_write_failures_final", "sink" => sink.clone()).set(failed as f64);
    gauge!("dispatcher_frames_dropped_final", "sink" => sink).set(dropped as f64);
}

/// 融合指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct FusionMetricsAggregator {
    /// 总帧数
    pub total_frames: u64,

    /// 总航迹数
    pub total_tracks: u64,

    /// 合并产生的航迹数
    pub merged_tracks: u64,

    /// 每帧航迹数统计
    pub tracks_per_frame: RunningStats,

    /// 每帧合并比例统计
    pub merge_ratio: RunningStats,

    /// 航迹年龄统计 (毫秒)
    pub track_age_ms: RunningStats,

    /// 各雷达参与融合的帧数
    pub sensor_participation: BTreeMap<String, u64>,

    /// 出现过的最大全局 ID (ID 单调分配且不复用, 即已分配 ID 数的下界)
    pub max_global_id: u32,
}

impl FusionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, frame: &FusedFrame) {
        let merged = frame.merged_count();

        self.total_frames += 1;
        self.total_tracks += frame.tracks.len() as u64;
        self.merged_tracks += merged as u64;
        self.tracks_per_frame.push(frame.tracks.len() as f64);

        if !frame.tracks.is_empty() {
            self.merge_ratio
                .push(merged as f64 / frame.tracks.len() as f64);
        }

        for track in &frame.tracks {
            self.track_age_ms
                .push((frame.timestamp - track.timestamp).max(0.0) * 1000.0);
            self.max_global_id = self.max_global_id.max(track.global_id);
        }

        for sensor in &frame.sensors_fused {
            *self
                .sensor_participation
                .entry(sensor.to_string())
                .or_insert(0) += 1;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> FusionSummary {
        FusionSummary {
            total_frames: self.total_frames,
            total_tracks: self.total_tracks,
            merged_tracks: self.merged_tracks,
            max_global_id: self.max_global_id,
            merged_rate: if self.total_tracks > 0 {
                self.merged_tracks as f64 / self.total_tracks as f64 * 100.0
            } else {
                0.0
            },
            tracks_per_frame: StatsSummary::from(&self.tracks_per_frame),
            merge_ratio: StatsSummary::from(&self.merge_ratio),
            track_age_ms: StatsSummary::from(&self.track_age_ms),
            sensor_participation: self.sensor_participation.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct FusionSummary {
    pub total_frames: u64,
    pub total_tracks: u64,
    pub merged_tracks: u64,
    pub max_global_id: u32,
    pub merged_rate: f64,
    pub tracks_per_frame: StatsSummary,
    pub merge_ratio: StatsSummary,
    pub track_age_ms: StatsSummary,
    pub sensor_participation: BTreeMap<String, u64>,
}

impl std::fmt::Display for FusionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Fusion Metrics Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(f, "Total tracks: {}", self.total_tracks)?;
        writeln!(
            f,
            "Merged tracks: {} ({:.2}%)",
            self.merged_tracks, self.merged_rate
        )?;
        writeln!(f, "Highest global id: {}", self.max_global_id)?;
        writeln!(f, "Tracks per frame: {}", self.tracks_per_frame)?;
        writeln!(f, "Merge ratio: {}", self.merge_ratio)?;
        writeln!(f, "Track age (ms): {}", self.track_age_ms)?;

        if !self.sensor_participation.is_empty() {
            writeln!(f, "Sensor participation:")?;
            for (sensor, count) in &self.sensor_participation {
                writeln!(f, "  {}: {}", sensor, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FusedTrack, TrackKey, Vector3};
    use std::collections::BTreeSet;

    fn track(global_id: u32, keys: &[(&str, u32)]) -> FusedTrack {
        FusedTrack {
            global_id,
            position: Vector3::ZERO,
            velocity: Vector3::ZERO,
            acceleration: Vector3::ZERO,
            confidence: 0.9,
            gating_gain: 1.0,
            timestamp: 0.98,
            contributing_sensors: keys.iter().map(|(s, _)| (*s).into()).collect(),
            contributing_local_ids: keys
                .iter()
                .map(|(s, id)| TrackKey::new((*s).into(), *id))
                .collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = FusionMetricsAggregator::new();
        let frame = FusedFrame {
            cycle: 1,
            timestamp: 1.0,
            sensors_fused: vec!["radar1".into(), "radar2".into()],
            tracks: vec![
                track(1, &[("radar1", 4), ("radar2", 9)]),
                track(2, &[("radar1", 5)]),
            ],
        };

        aggregator.update(&frame);
        aggregator.update(&frame);

        assert_eq!(aggregator.total_frames, 2);
        assert_eq!(aggregator.total_tracks, 4);
        assert_eq!(aggregator.merged_tracks, 2);
        assert_eq!(aggregator.max_global_id, 2);
        assert_eq!(aggregator.sensor_participation.get("radar2"), Some(&2));

        let summary = aggregator.summary();
        assert!((summary.merged_rate - 50.0).abs() < 1e-9);
        assert!((summary.merge_ratio.mean - 0.5).abs() < 1e-9);
        assert!((summary.track_age_ms.mean - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_max_global_id_ignores_repeats() {
        let mut aggregator = FusionMetricsAggregator::new();
        for (cycle, ids) in [(1, [7, 3]), (2, [3, 7]), (3, [12, 3])] {
            aggregator.update(&FusedFrame {
                cycle,
                timestamp: cycle as f64,
                sensors_fused: vec!["radar1".into()],
                tracks: ids.iter().map(|id| track(*id, &[("radar1", *id)])).collect(),
            });
        }
        assert_eq!(aggregator.max_global_id, 12);
        assert_eq!(aggregator.summary().max_global_id, 12);
    }

    #[test]
    fn test_summary_display() {
        let summary = FusionSummary {
            total_frames: 100,
            total_tracks: 300,
            merged_tracks: 30,
            max_global_id: 4,
            merged_rate: 10.0,
            tracks_per_frame: StatsSummary {
                count: 100,
                min: 2.0,
                max: 4.0,
                mean: 3.0,
                std_dev: 0.5,
            },
            ..Default::default()
        };

        let output = format!("{}", summary);
        assert!(output.contains("Total frames: 100"));
        assert!(output.contains("Merged tracks: 30 (10.00%)"));
        assert!(output.contains("Highest global id: 4"));
        assert!(output.contains("Track age (ms): N/A"));
    }
}
