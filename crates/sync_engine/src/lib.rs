//! # Sync Engine
//!
//! Leaderless timeline synchronization for LED devices.
//!
//! Every device broadcasts the timeline it plays (pattern, next pattern,
//! start time) on behalf of an originator. Devices keep a distance-vector
//! route per originator, follow the one with the highest precedence and
//! otherwise lead with their own rotation.
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::{SyncEngine, SyncEngineConfig};
//!
//! let mut engine = SyncEngine::new(SyncEngineConfig::default());
//! engine.connect(transport);
//!
//! loop {
//!     let playback = engine.tick(clock.now_ms());
//!     renderer.draw(playback.pattern, playback.elapsed, playback.restart);
//! }
//! ```

mod controls;
mod engine;
pub mod precedence;
pub mod route_table;
pub mod timing;

pub use contracts::SyncEngineConfig;
pub use engine::{DropReason, Playback, SyncEngine};
pub use route_table::{OriginatorEntry, RouteTable, RouteUpdate};
