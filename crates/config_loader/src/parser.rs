//! Config parsing
//!
//! TOML is the primary format, JSON is accepted for generated configs.

use contracts::{ContractError, FusionBlueprint};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<FusionBlueprint, ContractError> {
    toml::from_str(content)
        .map_err(|e| ContractError::config_parse_from(format!("TOML parse error: {e}"), e))
}

pub fn parse_json(content: &str) -> Result<FusionBlueprint, ContractError> {
    serde_json::from_str(content)
        .map_err(|e| ContractError::config_parse_from(format!("JSON parse error: {e}"), e))
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<FusionBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ByteSourceConfig, SlotRetention};

    #[test]
    fn parse_toml_dual_radar() {
        let content = r#"
[[radars]]
name = "radar_left"
position_offset = [-1.0, 0.0, 2.5]
facing_angle = { angle = [-20.0, 15.0, 0.0], sequence = "zyx" }
source = { type = "tcp", address = "127.0.0.1:7001" }

[[radars]]
name = "radar_right"
position_offset = [1.0, 0.0, 2.5]
source = { type = "replay", path = "captures/right.bin", loop_playback = true }

[fusion]
slot_retention = "clear_after_fuse"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.radars.len(), 2);
        assert_eq!(bp.radars[0].facing_angle.angle, [-20.0, 15.0, 0.0]);
        assert!(matches!(
            bp.radars[1].source,
            ByteSourceConfig::Replay { loop_playback: true, chunk_size: 4096, .. }
        ));
        assert_eq!(bp.fusion.slot_retention, SlotRetention::ClearAfterFuse);
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn parse_json_minimal() {
        let content = r#"{
            "radars": [{
                "name": "radar1",
                "source": { "type": "synthetic", "id_offset": 1000 }
            }],
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let bp = parse_json(content).unwrap();
        match &bp.radars[0].source {
            ByteSourceConfig::Synthetic(cfg) => {
                assert_eq!(cfg.id_offset, 1000);
                assert_eq!(cfg.num_objects, 2);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn bad_axis_sequence_is_a_parse_error() {
        let content = r#"
[[radars]]
name = "r"
facing_angle = { angle = [0.0, 0.0, 0.0], sequence = "zzx" }
source = { type = "synthetic" }
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
        assert!(err.to_string().contains("permutation"));
    }

    #[test]
    fn syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
