//! Device runner - drives one engine on a wall clock.
//!
//! The engine is ticked from a tokio interval on the current task. Console
//! lines come from a dedicated stdin thread so a pending read never holds up
//! runtime shutdown.

use std::future::Future;
use std::io::BufRead;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DeviceBlueprint, Milliseconds, PatternId};
use sync_engine::SyncEngine;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use transport::UdpTransport;

use super::{ConsoleCommand, DeviceStats};

/// Console lines buffered between the stdin thread and the tick loop.
const CONSOLE_CAPACITY: usize = 16;

/// Monotonic millisecond clock for the engine.
///
/// Starts well above zero so times decoded from wire deltas never saturate.
#[derive(Debug, Clone, Copy)]
pub struct DeviceClock {
    started: Instant,
}

impl DeviceClock {
    const EPOCH: Milliseconds = 100_000;

    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn now(&self) -> Milliseconds {
        Self::EPOCH + self.started.elapsed().as_millis() as Milliseconds
    }
}

/// Device run configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Validated device blueprint
    pub blueprint: DeviceBlueprint,

    /// Stop after this long (None = until shutdown)
    pub duration: Option<Duration>,

    /// Read operator commands from stdin
    pub console: bool,
}

/// One device on the configured transports
pub struct Device {
    config: DeviceConfig,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves or the configured duration elapses.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<DeviceStats> {
        let blueprint = &self.config.blueprint;
        let clock = DeviceClock::start();
        let started = Instant::now();

        let mut engine = SyncEngine::new(blueprint.to_sync_engine_config());
        for udp in blueprint.udp_transports() {
            let transport = UdpTransport::on_current_runtime(udp.clone())
                .with_context(|| format!("Failed to create transport {}", udp.label()))?;
            let id = engine.connect(Arc::new(transport));
            info!(transport = %udp.label(), id = %id, "transport registered");
        }
        engine.begin(clock.now());

        let mut stats = DeviceStats {
            device_id: Some(engine.local_device_id()),
            ..Default::default()
        };
        info!(
            device_id = %engine.local_device_id(),
            pattern = %engine.current_pattern(),
            tick_interval_ms = blueprint.runtime.tick_interval_ms,
            "device started"
        );

        let mut console = if self.config.console {
            Some(spawn_console_reader())
        } else {
            None
        };

        let mut ticker =
            tokio::time::interval(Duration::from_millis(blueprint.runtime.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        let mut showing: Option<PatternId> = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let playback = engine.tick(clock.now());
                    stats.ticks += 1;
                    if playback.restart {
                        stats.restarts += 1;
                        stats.protocol.record_hops(engine.num_hops());
                    }
                    if showing != Some(playback.pattern) {
                        info!(
                            pattern = %playback.pattern,
                            name = playback.pattern.name(),
                            elapsed_ms = playback.elapsed,
                            leader = %engine.current_leader(),
                            "now playing"
                        );
                        showing = Some(playback.pattern);
                    }
                }
                line = recv_line(&mut console) => {
                    match line {
                        Some(line) => {
                            handle_console_line(&mut engine, &line, clock.now());
                            stats.commands += 1;
                        }
                        None => {
                            debug!("console closed");
                            console = None;
                        }
                    }
                }
                _ = &mut deadline => {
                    info!("run duration reached");
                    break;
                }
                _ = &mut shutdown => {
                    warn!("shutdown requested");
                    break;
                }
            }
        }

        stats.duration = started.elapsed();
        stats.final_leader = Some(engine.current_leader());
        stats.protocol.record_counters(engine.counters());
        Ok(stats)
    }
}

fn handle_console_line(engine: &mut SyncEngine, line: &str, now: Milliseconds) {
    if line.trim().is_empty() {
        return;
    }
    match line.parse::<ConsoleCommand>() {
        Ok(command) => println!("{}", command.apply(engine, now)),
        Err(e) => {
            debug!(error = %e, "console line rejected");
            println!("! {e}");
        }
    }
}

async fn recv_line(console: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match console {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn spawn_console_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(CONSOLE_CAPACITY);
    let spawned = std::thread::Builder::new()
        .name("lightsync-console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "console unavailable");
    }
    rx
}
