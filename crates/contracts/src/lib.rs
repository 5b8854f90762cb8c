//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend only on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All times are [`Milliseconds`] on the local device's monotonic clock
//! - Nothing in the protocol assumes clocks agree between devices; the wire
//!   format only carries deltas relative to the sender's "now"

mod blueprint;
mod device_id;
mod error;
mod message;
mod pattern;
mod precedence;
mod stats;
mod sync_engine_config;
mod transport;

pub use blueprint::*;
pub use device_id::DeviceId;
pub use error::*;
pub use message::*;
pub use pattern::*;
pub use precedence::*;
pub use stats::ProtocolCounters;
pub use sync_engine_config::*;
pub use transport::*;
