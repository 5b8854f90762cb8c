//! Running protocol counters shared between the engine and observability.

use serde::{Deserialize, Serialize};

/// Cumulative per-engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolCounters {
    pub messages_received: u64,
    pub dropped_self_sent: u64,
    pub dropped_self_originated: u64,
    pub dropped_hop_overflow: u64,
    pub dropped_stale: u64,
    pub routes_created: u64,
    pub routes_retracted: u64,
    pub routes_evicted: u64,
    pub next_hop_switches: u64,
    pub leader_switches: u64,
    pub pattern_rotations: u64,
}

impl ProtocolCounters {
    /// Total of all drop reasons.
    pub fn dropped(&self) -> u64 {
        self.dropped_self_sent
            + self.dropped_self_originated
            + self.dropped_hop_overflow
            + self.dropped_stale
    }

    /// Accumulate another engine's counters into this one.
    pub fn merge(&mut self, other: &ProtocolCounters) {
        self.messages_received += other.messages_received;
        self.dropped_self_sent += other.dropped_self_sent;
        self.dropped_self_originated += other.dropped_self_originated;
        self.dropped_hop_overflow += other.dropped_hop_overflow;
        self.dropped_stale += other.dropped_stale;
        self.routes_created += other.routes_created;
        self.routes_retracted += other.routes_retracted;
        self.routes_evicted += other.routes_evicted;
        self.next_hop_switches += other.next_hop_switches;
        self.leader_switches += other.leader_switches;
        self.pattern_rotations += other.pattern_rotations;
    }
}
