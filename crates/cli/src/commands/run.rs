//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::device::{Device, DeviceConfig};
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_device(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(device_id) = args.device_id {
        info!(device_id = %device_id, "Overriding device id from CLI");
        blueprint.engine.device_id = Some(device_id);
    }
    if let Some(base) = args.base_precedence {
        info!(base_precedence = base, "Overriding base precedence from CLI");
        blueprint.engine.base_precedence = base;
    }
    if let Some(port) = args.metrics_port {
        blueprint.runtime.metrics_port = port;
    }
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        transports = blueprint.transports.len(),
        base_precedence = blueprint.engine.base_precedence,
        tick_interval_ms = blueprint.runtime.tick_interval_ms,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if blueprint.runtime.metrics_port != 0 {
        observability::init_metrics_only(blueprint.runtime.metrics_port)?;
    }

    let device = Device::new(DeviceConfig {
        blueprint,
        duration: if args.duration == 0 {
            None
        } else {
            Some(Duration::from_secs(args.duration))
        },
        console: !args.no_console,
    });

    info!("Starting device...");
    let stats = device
        .run(shutdown_signal())
        .await
        .context("Device loop failed")?;

    info!(
        ticks = stats.ticks,
        restarts = stats.restarts,
        duration_secs = stats.duration.as_secs_f64(),
        "Device stopped"
    );
    stats.print_summary();
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
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
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::DeviceBlueprint) {
    let engine = &blueprint.engine;
    println!("\n=== Configuration Summary ===\n");
    println!("Engine:");
    match engine.device_id {
        Some(id) => println!("  Device id: {}", id),
        None if engine.randomize_device_id => println!("  Device id: random"),
        None => println!("  Device id: from transport"),
    }
    println!(
        "  Precedence: base {} gain {}",
        engine.base_precedence, engine.precedence_gain
    );
    if let Some(admin) = engine.admin_precedence {
        println!("  Admin precedence: {}", admin);
    }
    println!(
        "  Start pattern: {:08x} ({}){}",
        engine.start_pattern.bits(),
        engine.start_pattern.name(),
        if engine.start_looping { ", looping" } else { "" }
    );

    println!("\nTransports ({}):", blueprint.transports.len());
    for transport in &blueprint.transports {
        println!("  - {}", transport.label());
    }
    println!();
}
