//! Protocol metrics
//!
//! Thin wrappers over the `metrics` facade so metric names live in one place,
//! plus an in-memory aggregator used for end-of-run summaries.

use contracts::{ProtocolCounters, TransportStatus};
use metrics::{counter, gauge};

/// Record a message handed to the engine by a transport
pub fn record_message_received(transport: &str) {
    counter!(
        "lightsync_messages_received_total",
        "transport" => transport.to_string()
    )
    .increment(1);
}

/// Record a dropped message
///
/// Reasons: `malformed`, `self_sent`, `self_originated`, `hop_overflow`,
/// `stale_origination`, `stale_pattern`.
pub fn record_message_dropped(reason: &'static str) {
    counter!("lightsync_messages_dropped_total", "reason" => reason).increment(1);
}

/// Record a change of followed leader
pub fn record_leader_switch(following: bool) {
    counter!("lightsync_leader_switches_total").increment(1);
    gauge!("lightsync_following").set(if following { 1.0 } else { 0.0 });
}

/// Record a leader-side pattern rotation
pub fn record_pattern_rotation() {
    counter!("lightsync_pattern_rotations_total").increment(1);
}

/// Record route table size and current hop distance
pub fn record_route_table(entries: usize, num_hops: u8) {
    gauge!("lightsync_route_entries").set(entries as f64);
    gauge!("lightsync_num_hops").set(num_hops as f64);
}

/// Record retracted routes
pub fn record_routes_retracted(count: usize) {
    counter!("lightsync_routes_retracted_total").increment(count as u64);
}

/// Record evicted routes
pub fn record_routes_evicted(count: usize) {
    counter!("lightsync_routes_evicted_total").increment(count as u64);
}

/// Record a route moving to a new next hop
pub fn record_next_hop_switch() {
    counter!("lightsync_next_hop_switches_total").increment(1);
}

/// Record a transport status transition
pub fn record_transport_status(transport: &str, status: TransportStatus) {
    counter!(
        "lightsync_transport_status_changes_total",
        "transport" => transport.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    gauge!(
        "lightsync_transport_connected",
        "transport" => transport.to_string()
    )
    .set(if status.is_connected() { 1.0 } else { 0.0 });
}

/// Protocol statistics aggregator
///
/// Collects counters from one or more engines and samples of hop distance and
/// start-time skew between devices.
#[derive(Debug, Clone, Default)]
pub struct ProtocolStatsAggregator {
    /// Summed engine counters
    pub counters: ProtocolCounters,

    /// Engines folded into `counters`
    pub engines: u64,

    /// Hop distance samples
    pub hop_stats: RunningStats,

    /// Start-time skew samples (ms)
    pub skew_stats: RunningStats,

    /// Tick at which all devices first agreed
    pub converged_at_tick: Option<u64>,
}

impl ProtocolStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one engine's cumulative counters
    pub fn record_counters(&mut self, counters: &ProtocolCounters) {
        self.counters.merge(counters);
        self.engines += 1;
    }

    pub fn record_hops(&mut self, hops: u8) {
        self.hop_stats.push(hops as f64);
    }

    pub fn record_skew_ms(&mut self, skew_ms: f64) {
        self.skew_stats.push(skew_ms);
    }

    /// Remember the first tick at which the mesh agreed
    pub fn record_convergence(&mut self, tick: u64) {
        self.converged_at_tick.get_or_insert(tick);
    }

    /// Build a summary report
    pub fn summary(&self) -> ProtocolSummary {
        let received = self.counters.messages_received;
        ProtocolSummary {
            engines: self.engines,
            messages_received: received,
            messages_dropped: self.counters.dropped(),
            drop_rate: if received > 0 {
                self.counters.dropped() as f64 / received as f64 * 100.0
            } else {
                0.0
            },
            leader_switches: self.counters.leader_switches,
            pattern_rotations: self.counters.pattern_rotations,
            routes_retracted: self.counters.routes_retracted,
            routes_evicted: self.counters.routes_evicted,
            converged_at_tick: self.converged_at_tick,
            num_hops: StatsSummary::from(&self.hop_stats),
            skew_ms: StatsSummary::from(&self.skew_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary report
#[derive(Debug, Clone, Default)]
pub struct ProtocolSummary {
    pub engines: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub drop_rate: f64,
    pub leader_switches: u64,
    pub pattern_rotations: u64,
    pub routes_retracted: u64,
    pub routes_evicted: u64,
    pub converged_at_tick: Option<u64>,
    pub num_hops: StatsSummary,
    pub skew_ms: StatsSummary,
}

impl std::fmt::Display for ProtocolSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Protocol Summary ===")?;
        writeln!(f, "Engines: {}", self.engines)?;
        writeln!(f, "Messages received: {}", self.messages_received)?;
        writeln!(
            f,
            "Messages dropped: {} ({:.2}%)",
            self.messages_dropped, self.drop_rate
        )?;
        writeln!(f, "Leader switches: {}", self.leader_switches)?;
        writeln!(f, "Pattern rotations: {}", self.pattern_rotations)?;
        writeln!(f, "Routes retracted: {}", self.routes_retracted)?;
        writeln!(f, "Routes evicted: {}", self.routes_evicted)?;
        match self.converged_at_tick {
            Some(tick) => writeln!(f, "Converged at tick: {}", tick)?,
            None => writeln!(f, "Converged at tick: never")?,
        }
        writeln!(f, "Hops: {}", self.num_hops)?;
        writeln!(f, "Start skew (ms): {}", self.skew_ms)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_merges_engines() {
        let mut aggregator = ProtocolStatsAggregator::new();
        let a = ProtocolCounters {
            messages_received: 10,
            dropped_self_sent: 1,
            leader_switches: 1,
            ..Default::default()
        };
        let b = ProtocolCounters {
            messages_received: 30,
            dropped_stale: 3,
            pattern_rotations: 2,
            ..Default::default()
        };
        aggregator.record_counters(&a);
        aggregator.record_counters(&b);
        aggregator.record_convergence(7);
        aggregator.record_convergence(9);

        let summary = aggregator.summary();
        assert_eq!(summary.engines, 2);
        assert_eq!(summary.messages_received, 40);
        assert_eq!(summary.messages_dropped, 4);
        assert!((summary.drop_rate - 10.0).abs() < 1e-10);
        assert_eq!(summary.converged_at_tick, Some(7));
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = ProtocolStatsAggregator::new();
        aggregator.record_hops(1);
        aggregator.record_hops(2);
        let output = aggregator.summary().to_string();
        assert!(output.contains("Converged at tick: never"));
        assert!(output.contains("n=2"));
    }
}
