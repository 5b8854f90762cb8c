//! In-process mesh simulation.
//!
//! Runs several engines over one [`LoopbackHub`] on a shared virtual clock.
//! Engines tick in a shuffled order every step so results do not depend on
//! who happens to go first.

use contracts::{DeviceId, Milliseconds, PatternId, SyncEngineConfig};
use observability::{ProtocolStatsAggregator, ProtocolSummary};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use sync_engine::SyncEngine;
use tracing::{debug, info, instrument};
use transport::{HubStats, LoopbackHub};

use crate::cli::Topology;
use crate::error::CliError;

/// Virtual clock start; far enough from zero that decoded wire deltas never
/// saturate.
const CLOCK_START: Milliseconds = 100_000;

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub devices: usize,
    pub ticks: u64,
    pub tick_ms: Milliseconds,
    pub topology: Topology,
    pub loss: f64,
    pub seed: u64,
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), CliError> {
        if self.devices < 2 {
            return Err(CliError::invalid_simulation("need at least 2 devices"));
        }
        if self.devices > 250 {
            return Err(CliError::invalid_simulation("at most 250 devices"));
        }
        if self.tick_ms == 0 {
            return Err(CliError::invalid_simulation("tick_ms must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.loss) {
            return Err(CliError::invalid_simulation("loss must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

/// Per-device state at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub device_id: String,
    pub leader: String,
    pub pattern: String,
    pub num_hops: u8,
    pub start_offset_ms: i64,
}

/// Outcome of a simulation run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub summary: ProtocolSummary,
    pub hub: HubStats,
    pub devices: Vec<DeviceReport>,
    pub converged: bool,
}

/// Mesh of engines sharing one hub
pub struct Simulation {
    config: SimulationConfig,
    hub: LoopbackHub,
    engines: Vec<SyncEngine>,
    order: Vec<usize>,
    rng: StdRng,
    now: Milliseconds,
    stats: ProtocolStatsAggregator,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, CliError> {
        config.validate()?;

        let hub = if config.loss > 0.0 {
            LoopbackHub::with_loss(config.loss, config.seed)
        } else {
            LoopbackHub::new()
        };

        let engines = (0..config.devices)
            .map(|i| {
                let transport = hub.attach().with_device_id(simulated_device_id(i));
                let mut engine = SyncEngine::new(SyncEngineConfig::default());
                engine.connect(Arc::new(transport));
                engine
            })
            .collect();

        let links: Vec<(usize, usize)> = match config.topology {
            Topology::Full => Vec::new(),
            Topology::Line => (1..config.devices).map(|i| (i - 1, i)).collect(),
            Topology::Ring => (0..config.devices)
                .map(|i| (i, (i + 1) % config.devices))
                .collect(),
        };
        if config.topology != Topology::Full {
            hub.restrict_to_links(&links);
        }

        info!(
            devices = config.devices,
            topology = ?config.topology,
            loss = config.loss,
            "simulation created"
        );

        Ok(Self {
            order: (0..config.devices).collect(),
            rng: StdRng::seed_from_u64(config.seed),
            now: CLOCK_START,
            stats: ProtocolStatsAggregator::new(),
            hub,
            engines,
            config,
        })
    }

    /// Advance the clock one tick and tick every engine once.
    pub fn step(&mut self) {
        self.now += self.config.tick_ms;
        self.order.shuffle(&mut self.rng);
        for &i in &self.order {
            self.engines[i].tick(self.now);
        }
    }

    /// Whether every engine follows the same leader on the same pattern.
    pub fn converged(&self) -> bool {
        let Some(first) = self.engines.first() else {
            return true;
        };
        self.engines.iter().all(|engine| {
            engine.current_leader() == first.current_leader()
                && engine.current_pattern() == first.current_pattern()
        })
    }

    #[instrument(name = "simulation_run", skip(self), fields(ticks = self.config.ticks))]
    pub fn run(mut self) -> SimulationReport {
        for tick in 1..=self.config.ticks {
            self.step();
            if self.converged() {
                if self.stats.converged_at_tick.is_none() {
                    debug!(tick, leader = %self.engines[0].current_leader(), "mesh converged");
                }
                self.stats.record_convergence(tick);
            }
        }
        self.finish()
    }

    fn finish(mut self) -> SimulationReport {
        let converged = self.converged();
        let reference = self
            .engines
            .iter()
            .find(|engine| engine.is_leading())
            .map(|engine| engine.current_pattern_start_time());

        let mut devices = Vec::with_capacity(self.engines.len());
        for engine in &self.engines {
            self.stats.record_counters(engine.counters());
            self.stats.record_hops(engine.num_hops());

            let offset = reference
                .map(|start| engine.current_pattern_start_time() as i64 - start as i64)
                .unwrap_or_default();
            self.stats.record_skew_ms(offset.unsigned_abs() as f64);

            devices.push(DeviceReport {
                device_id: engine.local_device_id().to_string(),
                leader: engine.current_leader().to_string(),
                pattern: pattern_label(engine.current_pattern()),
                num_hops: engine.num_hops(),
                start_offset_ms: offset,
            });
        }

        info!(converged, hub = ?self.hub.stats(), "simulation finished");

        SimulationReport {
            summary: self.stats.summary(),
            hub: self.hub.stats(),
            devices,
            converged,
        }
    }
}

fn simulated_device_id(index: usize) -> DeviceId {
    DeviceId::new([0x02, 0, 0, 0, 0, (index + 1) as u8])
}

fn pattern_label(pattern: PatternId) -> String {
    format!("{:08x} ({})", pattern.bits(), pattern.name())
}
