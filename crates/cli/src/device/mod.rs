//! Single device runtime: tick loop, operator console and run statistics.

mod console;
mod runner;
mod stats;

pub use console::ConsoleCommand;
pub use runner::{Device, DeviceClock, DeviceConfig};
pub use stats::DeviceStats;
