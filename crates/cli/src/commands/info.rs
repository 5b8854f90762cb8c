//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    engine: EngineInfo,
    runtime: RuntimeInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    transports: Vec<TransportInfo>,
}

#[derive(Serialize)]
struct EngineInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
    randomize_device_id: bool,
    base_precedence: u16,
    precedence_gain: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_precedence: Option<u16>,
    start_pattern: String,
    start_pattern_name: &'static str,
    start_looping: bool,
}

#[derive(Serialize)]
struct RuntimeInfo {
    tick_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

#[derive(Serialize)]
struct TransportInfo {
    label: String,
    interface: String,
    echo: bool,
    min_send_interval_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &contracts::DeviceBlueprint, args: &InfoArgs) -> ConfigInfo {
    let engine = &blueprint.engine;

    let transports = if args.transports {
        blueprint
            .udp_transports()
            .map(|udp| TransportInfo {
                label: udp.label(),
                interface: udp.interface.to_string(),
                echo: udp.echo,
                min_send_interval_ms: udp.min_send_interval_ms,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        engine: EngineInfo {
            device_id: engine.device_id.map(|id| id.to_string()),
            randomize_device_id: engine.randomize_device_id,
            base_precedence: engine.base_precedence,
            precedence_gain: engine.precedence_gain,
            admin_precedence: engine.admin_precedence,
            start_pattern: format!("{:08x}", engine.start_pattern.bits()),
            start_pattern_name: engine.start_pattern.name(),
            start_looping: engine.start_looping,
        },
        runtime: RuntimeInfo {
            tick_interval_ms: blueprint.runtime.tick_interval_ms,
            metrics_port: match blueprint.runtime.metrics_port {
                0 => None,
                port => Some(port),
            },
        },
        transports,
    }
}

fn print_config_info(blueprint: &contracts::DeviceBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  lightsync Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let engine = &blueprint.engine;
    println!("💡 Engine");
    println!("   ├─ Version: {:?}", blueprint.version);
    match engine.device_id {
        Some(id) => println!("   ├─ Device id: {}", id),
        None if engine.randomize_device_id => println!("   ├─ Device id: random"),
        None => println!("   ├─ Device id: (from transport)"),
    }
    println!(
        "   ├─ Precedence: base {} + gain {}",
        engine.base_precedence, engine.precedence_gain
    );
    if let Some(admin) = engine.admin_precedence {
        println!("   ├─ Admin precedence: {}", admin);
    }
    println!(
        "   └─ Start pattern: {:08x} ({}){}",
        engine.start_pattern.bits(),
        engine.start_pattern.name(),
        if engine.start_looping { ", looping" } else { "" }
    );

    println!("\n⚙️  Runtime");
    println!("   ├─ Tick interval: {} ms", blueprint.runtime.tick_interval_ms);
    match blueprint.runtime.metrics_port {
        0 => println!("   └─ Metrics: disabled"),
        port => println!("   └─ Metrics: :{}", port),
    }

    println!("\n📡 Transports ({})", blueprint.transports.len());
    let count = blueprint.transports.len();
    for (i, udp) in blueprint.udp_transports().enumerate() {
        let is_last = i == count - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {}", prefix, udp.label());
        if args.transports {
            println!("   {}  ├─ Interface: {}", child_prefix, udp.interface);
            println!("   {}  ├─ Echo: {}", child_prefix, udp.echo);
            println!(
                "   {}  └─ Min send interval: {} ms",
                child_prefix, udp.min_send_interval_ms
            );
        }
    }

    println!();
}
