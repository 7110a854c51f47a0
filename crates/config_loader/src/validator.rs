//! Config validation
//!
//! Rules:
//! - at least one radar, radar names unique and non-empty
//! - pose offsets and angles finite, limits ordered (min < max)
//! - byte source parameters usable
//! - fusion threshold / timeout / rate > 0, association weights in [0, 1] summing to <= 1
//! - sink names unique, queue_capacity > 0, required params present

use std::collections::HashSet;

use contracts::{
    ByteSourceConfig, ContractError, FusionBlueprint, FusionConfig, RadarConfig, SinkType,
    SlotRetention,
};

/// Validate a FusionBlueprint
///
/// Returns the first error found, or Ok(()).
pub fn validate(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    validate_radar_names(blueprint)?;
    for radar in &blueprint.radars {
        validate_pose(radar)?;
        validate_limits(radar)?;
        validate_source(radar)?;
        validate_ingest(radar)?;
    }
    validate_fusion(&blueprint.fusion)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_radar_names(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    if blueprint.radars.is_empty() {
        return Err(ContractError::config_validation(
            "radars",
            "at least one radar must be configured",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, radar) in blueprint.radars.iter().enumerate() {
        if radar.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("radars[{idx}].name"),
                "radar name cannot be empty",
            ));
        }
        if !seen.insert(radar.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("radars[name={}]", radar.name),
                "duplicate radar name",
            ));
        }
    }
    Ok(())
}

fn validate_pose(radar: &RadarConfig) -> Result<(), ContractError> {
    if radar.position_offset.iter().any(|v| !v.is_finite()) {
        return Err(ContractError::config_validation(
            format!("radars[{}].position_offset", radar.name),
            format!("offset must be finite, got {:?}", radar.position_offset),
        ));
    }
    if radar.facing_angle.angle.iter().any(|v| !v.is_finite()) {
        return Err(ContractError::config_validation(
            format!("radars[{}].facing_angle.angle", radar.name),
            format!("angles must be finite, got {:?}", radar.facing_angle.angle),
        ));
    }
    Ok(())
}

fn validate_limits(radar: &RadarConfig) -> Result<(), ContractError> {
    for (axis, limit) in [("xlim", radar.xlim), ("ylim", radar.ylim), ("zlim", radar.zlim)] {
        if let Some([min, max]) = limit {
            if !(min < max) {
                return Err(ContractError::config_validation(
                    format!("radars[{}].{axis}", radar.name),
                    format!("min ({min}) must be < max ({max})"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_source(radar: &RadarConfig) -> Result<(), ContractError> {
    let field = format!("radars[{}].source", radar.name);
    match &radar.source {
        ByteSourceConfig::Tcp { address, .. } => {
            if address.trim().is_empty() {
                return Err(ContractError::config_validation(
                    format!("{field}.address"),
                    "tcp address cannot be empty",
                ));
            }
        }
        ByteSourceConfig::Replay {
            path, chunk_size, ..
        } => {
            if path.trim().is_empty() {
                return Err(ContractError::config_validation(
                    format!("{field}.path"),
                    "replay path cannot be empty",
                ));
            }
            if *chunk_size == 0 {
                return Err(ContractError::config_validation(
                    format!("{field}.chunk_size"),
                    "chunk_size must be > 0",
                ));
            }
        }
        ByteSourceConfig::Synthetic(cfg) => {
            if !(cfg.frame_rate_hz > 0.0) {
                return Err(ContractError::config_validation(
                    format!("{field}.frame_rate_hz"),
                    format!("frame_rate_hz must be > 0, got {}", cfg.frame_rate_hz),
                ));
            }
            if !(0.0..=1.0).contains(&cfg.dropout) {
                return Err(ContractError::config_validation(
                    format!("{field}.dropout"),
                    format!("dropout must be within [0, 1], got {}", cfg.dropout),
                ));
            }
            if !(cfg.noise_std >= 0.0) {
                return Err(ContractError::config_validation(
                    format!("{field}.noise_std"),
                    format!("noise_std must be >= 0, got {}", cfg.noise_std),
                ));
            }
        }
    }
    Ok(())
}

fn validate_ingest(radar: &RadarConfig) -> Result<(), ContractError> {
    let ingest = &radar.ingest;
    if ingest.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            format!("radars[{}].ingest.queue_capacity", radar.name),
            "queue_capacity must be > 0",
        ));
    }
    if ingest.read_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            format!("radars[{}].ingest.read_timeout_ms", radar.name),
            "read_timeout_ms must be > 0",
        ));
    }
    if ingest.max_buffer_bytes < contracts::wire::FRAME_HEADER_LEN * 2 {
        return Err(ContractError::config_validation(
            format!("radars[{}].ingest.max_buffer_bytes", radar.name),
            format!(
                "max_buffer_bytes must hold at least two frame headers, got {}",
                ingest.max_buffer_bytes
            ),
        ));
    }
    Ok(())
}

fn validate_fusion(fusion: &FusionConfig) -> Result<(), ContractError> {
    let positive = [
        ("fusion.distance_threshold", fusion.distance_threshold),
        ("fusion.identity_timeout_s", fusion.identity_timeout_s),
        ("fusion.output_rate_hz", fusion.output_rate_hz),
    ];
    for (field, value) in positive {
        if !(value > 0.0 && value.is_finite()) {
            return Err(ContractError::config_validation(
                field,
                format!("must be a finite value > 0, got {value}"),
            ));
        }
    }

    for (field, value) in [
        ("fusion.confidence_weight", fusion.confidence_weight),
        ("fusion.velocity_weight", fusion.velocity_weight),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ContractError::config_validation(
                field,
                format!("weight must be within [0, 1], got {value}"),
            ));
        }
    }
    let sum = fusion.confidence_weight + fusion.velocity_weight;
    if sum > 1.0 + 1e-9 {
        return Err(ContractError::config_validation(
            "fusion.confidence_weight / fusion.velocity_weight",
            format!("weights must sum to <= 1, got {sum}"),
        ));
    }

    if fusion.slot_retention == SlotRetention::Expire && !(fusion.slot_max_age_s > 0.0) {
        return Err(ContractError::config_validation(
            "fusion.slot_max_age_s",
            format!(
                "slot_max_age_s must be > 0 with slot_retention = expire, got {}",
                fusion.slot_max_age_s
            ),
        ));
    }

    if fusion.output_queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "fusion.output_queue_capacity",
            "output_queue_capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_sinks(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }

        let required = match sink.sink_type {
            SinkType::Log => None,
            SinkType::File => Some("path"),
            SinkType::Network => Some("addr"),
        };
        if let Some(param) = required {
            if !sink.params.contains_key(param) {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].params.{param}", sink.name),
                    format!("{:?} sink requires '{param}' param", sink.sink_type),
                ));
            }
        }
    }
    Ok(())
}
