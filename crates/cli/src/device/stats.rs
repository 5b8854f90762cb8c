//! Device run statistics.

use std::time::Duration;

use contracts::DeviceId;
use observability::ProtocolStatsAggregator;

/// Statistics from a device run
#[derive(Debug, Clone, Default)]
pub struct DeviceStats {
    /// Engine ticks executed
    pub ticks: u64,

    /// Times the renderer was asked to restart
    pub restarts: u64,

    /// Console commands applied
    pub commands: u64,

    /// Wall-clock run time
    pub duration: Duration,

    /// Local identifier chosen at startup
    pub device_id: Option<DeviceId>,

    /// Leader at shutdown
    pub final_leader: Option<DeviceId>,

    /// Engine counters and hop samples
    pub protocol: ProtocolStatsAggregator,
}

impl DeviceStats {
    /// Ticks per second actually achieved
    pub fn tick_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Device Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let unknown = || "-".to_string();
        println!("📊 Overview");
        println!(
            "   ├─ Device: {}",
            self.device_id.map(|id| id.to_string()).unwrap_or_else(unknown)
        );
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks: {} ({:.1}/s)", self.ticks, self.tick_rate());
        println!("   ├─ Restarts: {}", self.restarts);
        println!("   ├─ Console commands: {}", self.commands);
        println!(
            "   └─ Final leader: {}",
            self.final_leader.map(|id| id.to_string()).unwrap_or_else(unknown)
        );

        let summary = self.protocol.summary();
        println!("\n📈 Protocol");
        println!("   ├─ Messages received: {}", summary.messages_received);
        println!(
            "   ├─ Messages dropped: {} ({:.2}%)",
            summary.messages_dropped, summary.drop_rate
        );
        println!("   ├─ Leader switches: {}", summary.leader_switches);
        println!("   ├─ Pattern rotations: {}", summary.pattern_rotations);
        println!("   ├─ Routes retracted: {}", summary.routes_retracted);
        println!("   ├─ Routes evicted: {}", summary.routes_evicted);
        println!("   └─ Hops: {}", summary.num_hops);

        println!();
    }
}
