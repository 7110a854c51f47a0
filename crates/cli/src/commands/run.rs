//! `run` command implementation.

use anyhow::Result;
use contracts::{ByteSourceConfig, FusionBlueprint, SyntheticConfig};
use std::time::Duration;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Local ids of successive synthetic radars start this far apart.
/// All of them share the default seed so they observe the same objects.
const SYNTHETIC_ID_STRIDE: u32 = 1000;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)?;
    apply_overrides(&mut blueprint, args)?;

    info!(
        radars = blueprint.radars.len(),
        sinks = blueprint.sinks.len(),
        rate_hz = blueprint.fusion.output_rate_hz,
        threshold_m = blueprint.fusion.distance_threshold,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        shutdown_grace: Duration::from_millis(args.shutdown_grace_ms),
    });

    info!("Starting pipeline...");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .map_err(|e| CliError::pipeline_execution(format!("{:#}", e)))?;

    info!(
        fused_frames = stats.scheduler.published,
        frames_parsed = stats.frames_parsed(),
        frames_dropped = stats.frames_dropped(),
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("Radar Fusion finished");
    Ok(())
}

/// Apply command-line overrides and re-validate
fn apply_overrides(blueprint: &mut FusionBlueprint, args: &RunArgs) -> Result<()> {
    if let Some(rate) = args.rate {
        info!(rate_hz = rate, "Overriding output rate from CLI");
        blueprint.fusion.output_rate_hz = rate;
    }
    if let Some(threshold) = args.threshold {
        info!(threshold_m = threshold, "Overriding distance threshold from CLI");
        blueprint.fusion.distance_threshold = threshold;
    }
    if args.synthetic {
        info!("Replacing every radar source with the synthetic generator");
        for (i, radar) in blueprint.radars.iter_mut().enumerate() {
            radar.source = ByteSourceConfig::Synthetic(SyntheticConfig {
                id_offset: i as u32 * SYNTHETIC_ID_STRIDE,
                ..SyntheticConfig::default()
            });
        }
    }

    config_loader::ConfigLoader::validate(blueprint)
        .map_err(|e| CliError::config_invalid(format!("after CLI overrides: {}", e)))?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping pipeline...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &FusionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Radars ({}):", blueprint.radars.len());
    for radar in &blueprint.radars {
        println!(
            "  - {} ({}) at {:?}, facing {:?} [{}]",
            radar.name,
            radar.source.kind(),
            radar.position_offset,
            radar.facing_angle.angle,
            radar.facing_angle.sequence
        );
    }

    let fusion = &blueprint.fusion;
    println!("\nFusion:");
    println!("  Output rate: {} Hz", fusion.output_rate_hz);
    println!("  Distance threshold: {} m", fusion.distance_threshold);
    println!("  Identity timeout: {} s", fusion.identity_timeout_s);
    println!("  Slot retention: {:?}", fusion.slot_retention);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
