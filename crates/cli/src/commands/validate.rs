//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ByteSourceConfig, FusionBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
    #[serde(skip)]
    missing: bool,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    radar_count: usize,
    source_kinds: Vec<&'static str>,
    output_rate_hz: f64,
    distance_threshold_m: f64,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let (result, blueprint) = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if let (true, Some(blueprint)) = (args.show, blueprint.as_ref()) {
        let normalized = config_loader::ConfigLoader::to_toml(blueprint)
            .context("Failed to render normalized configuration")?;
        println!("\n# normalized configuration\n{}", normalized);
    }

    if result.valid {
        Ok(())
    } else if result.missing {
        Err(CliError::config_not_found(result.config_path).into())
    } else {
        Err(CliError::config_invalid(result.error.unwrap_or_default()).into())
    }
}

fn validate_config(args: &ValidateArgs) -> (ValidationResult, Option<FusionBlueprint>) {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        let result = ValidationResult {
            valid: false,
            error: Some(format!("File not found: {}", config_path)),
            config_path,
            warnings: Vec::new(),
            summary: None,
            missing: true,
        };
        return (result, None);
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let result = ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: collect_warnings(&blueprint),
                summary: Some(summarize(&blueprint)),
                missing: false,
            };
            (result, Some(blueprint))
        }
        Err(e) => {
            let result = ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: Vec::new(),
                summary: None,
                missing: false,
            };
            (result, None)
        }
    }
}

fn summarize(blueprint: &FusionBlueprint) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        radar_count: blueprint.radars.len(),
        source_kinds: blueprint.radars.iter().map(|r| r.source.kind()).collect(),
        output_rate_hz: blueprint.fusion.output_rate_hz,
        distance_threshold_m: blueprint.fusion.distance_threshold,
        sink_count: blueprint.sinks.len(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &FusionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - fused frames will only be counted".to_string());
    }

    if blueprint.radars.len() == 1 {
        warnings.push("Only one radar configured - no cross-sensor merging will happen".to_string());
    }

    let fusion = &blueprint.fusion;
    let defaults = contracts::FusionConfig::default();
    if fusion.confidence_weight != defaults.confidence_weight
        || fusion.velocity_weight != defaults.velocity_weight
    {
        warnings.push(
            "fusion.confidence_weight / fusion.velocity_weight are reserved and have no effect"
                .to_string(),
        );
    }

    for radar in &blueprint.radars {
        if let ByteSourceConfig::Replay { path, .. } = &radar.source {
            if !std::path::Path::new(path).exists() {
                warnings.push(format!(
                    "Radar '{}' replays '{}', which does not exist yet",
                    radar.name, path
                ));
            }
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Radars: {} ({})",
                summary.radar_count,
                summary.source_kinds.join(", ")
            );
            println!("  Output rate: {} Hz", summary.output_rate_hz);
            println!("  Distance threshold: {} m", summary.distance_threshold_m);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
