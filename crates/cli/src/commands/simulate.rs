//! `simulate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::SimulateArgs;
use crate::simulation::{DeviceReport, Simulation, SimulationConfig, SimulationReport};

/// Simulation result for JSON output
#[derive(Serialize)]
struct SimulationOutput<'a> {
    converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    converged_at_tick: Option<u64>,
    converged_at_ms: Option<u64>,
    messages_received: u64,
    messages_dropped: u64,
    leader_switches: u64,
    hub_sent: u64,
    hub_delivered: u64,
    hub_lost: u64,
    devices: &'a [DeviceReport],
}

/// Execute the `simulate` command
pub fn run_simulate(args: &SimulateArgs) -> Result<()> {
    info!(devices = args.devices, ticks = args.ticks, "Starting simulation");

    let simulation = Simulation::new(SimulationConfig {
        devices: args.devices,
        ticks: args.ticks,
        tick_ms: args.tick_ms,
        topology: args.topology,
        loss: args.loss,
        seed: args.seed,
    })?;
    let report = simulation.run();

    if args.json {
        let output = SimulationOutput {
            converged: report.converged,
            converged_at_tick: report.summary.converged_at_tick,
            converged_at_ms: report
                .summary
                .converged_at_tick
                .map(|tick| tick * args.tick_ms),
            messages_received: report.summary.messages_received,
            messages_dropped: report.summary.messages_dropped,
            leader_switches: report.summary.leader_switches,
            hub_sent: report.hub.sent,
            hub_delivered: report.hub.delivered,
            hub_lost: report.hub.lost,
            devices: &report.devices,
        };
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialize simulation")?;
        println!("{}", json);
    } else {
        print_report(&report);
    }

    if !report.converged {
        tracing::warn!("Mesh did not converge by the last tick");
    }
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("\n=== Devices ===\n");
    for device in &report.devices {
        println!(
            "  {}  leader {}  hops {}  offset {:+} ms  {}",
            device.device_id, device.leader, device.num_hops, device.start_offset_ms, device.pattern
        );
    }
    println!();
    print!("{}", report.summary);
    println!(
        "Hub: sent={} delivered={} lost={} blocked={}",
        report.hub.sent, report.hub.delivered, report.hub.lost, report.hub.blocked
    );
    println!();
}
