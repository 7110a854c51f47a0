//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{ByteSourceConfig, FusionBlueprint, RadarConfig};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::{InfoArgs, InfoFormat};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    radars: Vec<RadarInfo>,
    fusion: FusionInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct RadarInfo {
    name: String,
    position_offset: [f64; 3],
    facing_angle_deg: [f64; 3],
    rotation_sequence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    xlim: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ylim: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zlim: Option<[f64; 2]>,
    source: String,
    queue_capacity: usize,
    drop_policy: String,
}

#[derive(Serialize)]
struct FusionInfo {
    method: String,
    output_rate_hz: f64,
    distance_threshold_m: f64,
    identity_timeout_s: f64,
    slot_retention: String,
    output_queue_capacity: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;

    match args.format {
        InfoFormat::Json => {
            let info = build_config_info(&blueprint);
            let json =
                serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
            println!("{}", json);
        }
        InfoFormat::Text => print_config_info(&blueprint),
    }

    Ok(())
}

fn describe_source(source: &ByteSourceConfig) -> String {
    match source {
        ByteSourceConfig::Tcp { address, .. } => format!("tcp://{}", address),
        ByteSourceConfig::Replay {
            path,
            loop_playback,
            ..
        } => {
            if *loop_playback {
                format!("replay {} (looped)", path)
            } else {
                format!("replay {}", path)
            }
        }
        ByteSourceConfig::Synthetic(cfg) => format!(
            "synthetic {} objects @ {} Hz, id offset {}",
            cfg.num_objects, cfg.frame_rate_hz, cfg.id_offset
        ),
    }
}

fn radar_info(radar: &RadarConfig) -> RadarInfo {
    RadarInfo {
        name: radar.name.clone(),
        position_offset: radar.position_offset,
        facing_angle_deg: radar.facing_angle.angle,
        rotation_sequence: radar.facing_angle.sequence.to_string(),
        xlim: radar.xlim,
        ylim: radar.ylim,
        zlim: radar.zlim,
        source: describe_source(&radar.source),
        queue_capacity: radar.ingest.queue_capacity,
        drop_policy: format!("{:?}", radar.ingest.drop_policy),
    }
}

fn build_config_info(blueprint: &FusionBlueprint) -> ConfigInfo {
    let fusion = &blueprint.fusion;
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        radars: blueprint.radars.iter().map(radar_info).collect(),
        fusion: FusionInfo {
            method: format!("{:?}", fusion.method),
            output_rate_hz: fusion.output_rate_hz,
            distance_threshold_m: fusion.distance_threshold,
            identity_timeout_s: fusion.identity_timeout_s,
            slot_retention: format!("{:?}", fusion.slot_retention),
            output_queue_capacity: fusion.output_queue_capacity,
        },
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                params: s.params.clone(),
            })
            .collect(),
    }
}

fn format_limit(limit: Option<[f64; 2]>) -> String {
    match limit {
        Some([min, max]) => format!("[{}, {}]", min, max),
        None => "unbounded".to_string(),
    }
}

fn print_config_info(blueprint: &FusionBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Radar Fusion Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Radars ({})", blueprint.radars.len());
    for (i, radar) in blueprint.radars.iter().enumerate() {
        let is_last = i == blueprint.radars.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, radar.name, describe_source(&radar.source));
        println!("   {}  ├─ Offset: {:?} m", child, radar.position_offset);
        println!(
            "   {}  ├─ Facing: {:?} deg, sequence {}",
            child, radar.facing_angle.angle, radar.facing_angle.sequence
        );
        println!(
            "   {}  └─ Limits: x {} y {} z {}",
            child,
            format_limit(radar.xlim),
            format_limit(radar.ylim),
            format_limit(radar.zlim)
        );
    }

    let fusion = &blueprint.fusion;
    println!("\n⚙️  Fusion");
    println!("   ├─ Method: {:?}", fusion.method);
    println!("   ├─ Output rate: {} Hz", fusion.output_rate_hz);
    println!("   ├─ Distance threshold: {} m", fusion.distance_threshold);
    println!("   ├─ Identity timeout: {} s", fusion.identity_timeout_s);
    println!("   └─ Slot retention: {:?}", fusion.slot_retention);

    println!("\n📤 Sinks ({})", blueprint.sinks.len());
    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let prefix = if i == blueprint.sinks.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {} ({:?}, queue {})",
            prefix, sink.name, sink.sink_type, sink.queue_capacity
        );
    }
    println!();
}
