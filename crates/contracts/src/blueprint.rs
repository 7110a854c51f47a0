//! FusionBlueprint - Config Loader output
//!
//! Describes the whole deployment: radar poses and byte sources, fusion tuning, output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Radar definitions, fusion order follows this list
    pub radars: Vec<RadarConfig>,

    /// Fusion tuning
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl FusionBlueprint {
    pub fn radar(&self, name: &str) -> Option<&RadarConfig> {
        self.radars.iter().find(|r| r.name == name)
    }
}

/// One radar: static pose, world limits and where its bytes come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarConfig {
    /// Unique radar name, tags every track it produces
    pub name: String,

    /// Mounting position in the world frame (m)
    #[serde(default)]
    pub position_offset: [f64; 3],

    /// Mounting orientation
    #[serde(default)]
    pub facing_angle: FacingAngle,

    /// World-frame x limits (min, max), tracks outside are dropped
    #[serde(default)]
    pub xlim: Option<[f64; 2]>,

    #[serde(default)]
    pub ylim: Option<[f64; 2]>,

    #[serde(default)]
    pub zlim: Option<[f64; 2]>,

    /// Byte stream feeding this radar
    pub source: ByteSourceConfig,

    /// Ingest loop tuning
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Mounting orientation: (pitch, yaw, roll) in degrees plus rotation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacingAngle {
    /// (pitch, yaw, roll) in degrees
    #[serde(default)]
    pub angle: [f64; 3],

    /// Order in which the per-axis rotations are applied
    #[serde(default)]
    pub sequence: AxisSequence,
}

/// Rotation axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Permutation of x, y, z, written as a string such as `"zyx"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AxisSequence(pub [Axis; 3]);

impl Default for AxisSequence {
    fn default() -> Self {
        Self([Axis::Z, Axis::Y, Axis::X])
    }
}

impl TryFrom<String> for AxisSequence {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for AxisSequence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let axes: Vec<Axis> = s
            .chars()
            .map(|c| match c.to_ascii_lowercase() {
                'x' => Ok(Axis::X),
                'y' => Ok(Axis::Y),
                'z' => Ok(Axis::Z),
                other => Err(format!("invalid axis '{other}' in sequence '{s}'")),
            })
            .collect::<Result<_, _>>()?;

        match axes.as_slice() {
            [a, b, c] if a != b && b != c && a != c => Ok(Self([*a, *b, *c])),
            _ => Err(format!(
                "axis sequence '{s}' must be a permutation of \"xyz\""
            )),
        }
    }
}

impl From<AxisSequence> for String {
    fn from(seq: AxisSequence) -> Self {
        seq.to_string()
    }
}

impl fmt::Display for AxisSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.0 {
            let c = match axis {
                Axis::X => 'x',
                Axis::Y => 'y',
                Axis::Z => 'z',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Byte source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ByteSourceConfig {
    /// Serial-over-TCP bridge (e.g. ser2net in raw mode)
    Tcp {
        address: String,
        #[serde(default = "default_reconnect_backoff_ms")]
        reconnect_backoff_ms: u64,
    },

    /// Recorded raw capture played back in paced chunks
    Replay {
        path: String,
        #[serde(default = "default_chunk_size")]
        chunk_size: usize,
        #[serde(default = "default_chunk_interval_ms")]
        chunk_interval_ms: u64,
        #[serde(default)]
        loop_playback: bool,
    },

    /// Generated moving targets, encoded on the fly
    Synthetic(SyntheticConfig),
}

impl ByteSourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::Replay { .. } => "replay",
            Self::Synthetic(_) => "synthetic",
        }
    }
}

fn default_reconnect_backoff_ms() -> u64 {
    1000
}

fn default_chunk_size() -> usize {
    4096
}

fn default_chunk_interval_ms() -> u64 {
    10
}

/// Synthetic target generator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Frames per second emitted by the simulated radar
    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: f64,

    /// Number of simulated objects
    #[serde(default = "default_num_objects")]
    pub num_objects: usize,

    /// Position noise std-dev (m)
    #[serde(default = "default_noise_std")]
    pub noise_std: f64,

    /// Probability that an object is missed in a frame
    #[serde(default = "default_dropout")]
    pub dropout: f64,

    /// Added to every local track id, keeps ids distinct between radars
    #[serde(default)]
    pub id_offset: u32,

    /// Trajectory seed, radars sharing a seed observe the same objects
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: default_frame_rate_hz(),
            num_objects: default_num_objects(),
            noise_std: default_noise_std(),
            dropout: default_dropout(),
            id_offset: 0,
            seed: default_seed(),
        }
    }
}

fn default_frame_rate_hz() -> f64 {
    50.0
}

fn default_num_objects() -> usize {
    2
}

fn default_noise_std() -> f64 {
    0.02
}

fn default_dropout() -> f64 {
    0.05
}

fn default_seed() -> u64 {
    7
}

/// Per-radar ingest loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Capacity of the radar's frame queue
    #[serde(default = "default_radar_queue_capacity")]
    pub queue_capacity: usize,

    /// What to drop when the queue is full
    #[serde(default)]
    pub drop_policy: DropPolicy,

    /// Upper bound on one byte-source read (ms)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Sleep after a stream error before retrying (ms)
    #[serde(default = "default_io_backoff_ms")]
    pub io_backoff_ms: u64,

    /// Receive buffer size that triggers a full clear
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,

    /// Log a stats line every N parsed frames
    #[serde(default = "default_stats_interval_frames")]
    pub stats_interval_frames: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_radar_queue_capacity(),
            drop_policy: DropPolicy::default(),
            read_timeout_ms: default_read_timeout_ms(),
            io_backoff_ms: default_io_backoff_ms(),
            max_buffer_bytes: default_max_buffer_bytes(),
            stats_interval_frames: default_stats_interval_frames(),
        }
    }
}

fn default_radar_queue_capacity() -> usize {
    8
}

fn default_read_timeout_ms() -> u64 {
    50
}

fn default_io_backoff_ms() -> u64 {
    100
}

fn default_max_buffer_bytes() -> usize {
    100_000
}

fn default_stats_interval_frames() -> u64 {
    100
}

/// Drop policy (when the queue is full)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Evict the oldest queued frame, newest always gets in
    #[default]
    DropOldest,
    /// Discard the frame being published
    DropNewest,
}

/// Fusion tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Association radius (m), strict `<`
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,

    /// Idle time before a global identity is purged (s)
    #[serde(default = "default_identity_timeout_s")]
    pub identity_timeout_s: f64,

    /// Fusion/output cadence (Hz)
    #[serde(default = "default_output_rate_hz")]
    pub output_rate_hz: f64,

    /// Reserved association score weight for confidence
    #[serde(default = "default_confidence_weight")]
    pub confidence_weight: f64,

    /// Reserved association score weight for velocity agreement
    #[serde(default = "default_velocity_weight")]
    pub velocity_weight: f64,

    #[serde(default)]
    pub method: FusionMethod,

    /// What happens to a radar's latest frame after it has been fused
    #[serde(default)]
    pub slot_retention: SlotRetention,

    /// Max frame age for `SlotRetention::Expire` (s)
    #[serde(default = "default_slot_max_age_s")]
    pub slot_max_age_s: f64,

    /// Capacity of the fused output queue
    #[serde(default = "default_output_queue_capacity")]
    pub output_queue_capacity: usize,

    /// Log a stats line every N fusion cycles
    #[serde(default = "default_stats_interval_cycles")]
    pub stats_interval_cycles: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
            identity_timeout_s: default_identity_timeout_s(),
            output_rate_hz: default_output_rate_hz(),
            confidence_weight: default_confidence_weight(),
            velocity_weight: default_velocity_weight(),
            method: FusionMethod::default(),
            slot_retention: SlotRetention::default(),
            slot_max_age_s: default_slot_max_age_s(),
            output_queue_capacity: default_output_queue_capacity(),
            stats_interval_cycles: default_stats_interval_cycles(),
        }
    }
}

fn default_distance_threshold() -> f64 {
    0.5
}

fn default_identity_timeout_s() -> f64 {
    2.0
}

fn default_output_rate_hz() -> f64 {
    20.0
}

fn default_confidence_weight() -> f64 {
    0.7
}

fn default_velocity_weight() -> f64 {
    0.3
}

fn default_slot_max_age_s() -> f64 {
    0.5
}

fn default_output_queue_capacity() -> usize {
    32
}

fn default_stats_interval_cycles() -> u64 {
    100
}

/// How associated tracks are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    /// Confidence-weighted mean of position, velocity and acceleration
    #[default]
    WeightedAverage,
}

/// Latest-frame slot policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRetention {
    /// Keep the frame until a newer one replaces it (a silent radar is re-fused)
    #[default]
    Retain,
    /// Empty every slot after each cycle
    ClearAfterFuse,
    /// Drop a slot once its frame is older than `slot_max_age_s`
    Expire,
}

/// Sink output config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON lines file
    File,
    /// UDP datagrams
    Network,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_sequence_parses_permutations() {
        let seq: AxisSequence = "xzy".parse().unwrap();
        assert_eq!(seq.0, [Axis::X, Axis::Z, Axis::Y]);
        assert_eq!(seq.to_string(), "xzy");
        assert_eq!(AxisSequence::default().to_string(), "zyx");
    }

    #[test]
    fn axis_sequence_rejects_repeats_and_junk() {
        assert!("xxy".parse::<AxisSequence>().is_err());
        assert!("xy".parse::<AxisSequence>().is_err());
        assert!("abc".parse::<AxisSequence>().is_err());
    }

    #[test]
    fn source_config_is_internally_tagged() {
        let json = r#"{"type":"tcp","address":"127.0.0.1:7000"}"#;
        let source: ByteSourceConfig = serde_json::from_str(json).unwrap();
        match source {
            ByteSourceConfig::Tcp {
                address,
                reconnect_backoff_ms,
            } => {
                assert_eq!(address, "127.0.0.1:7000");
                assert_eq!(reconnect_backoff_ms, 1000);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn fusion_defaults() {
        let fusion: FusionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(fusion.distance_threshold, 0.5);
        assert_eq!(fusion.identity_timeout_s, 2.0);
        assert_eq!(fusion.output_rate_hz, 20.0);
        assert_eq!(fusion.slot_retention, SlotRetention::Retain);
        assert_eq!(fusion.method, FusionMethod::WeightedAverage);
    }
}
