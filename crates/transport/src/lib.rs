//! # Transport
//!
//! Concrete implementations of the `Transport` capability consumed by the
//! sync engine.
//!
//! - [`UdpTransport`]: IP multicast on a LAN, socket I/O on a tokio task
//! - [`LoopbackHub`] / [`LoopbackTransport`]: in-process broadcast medium with
//!   per-link control, used for simulation and tests
//!
//! Both share [`SendSchedule`] for rate limiting; UDP reconnects through
//! [`ReconnectBackoff`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transport::LoopbackHub;
//!
//! let hub = LoopbackHub::new();
//! engine_a.connect(Arc::new(hub.attach()));
//! engine_b.connect(Arc::new(hub.attach()));
//! ```

pub mod backoff;
pub mod error;
pub mod loopback;
pub mod schedule;
pub mod udp;

pub use backoff::ReconnectBackoff;
pub use error::TransportError;
pub use loopback::{HubStats, LoopbackHub, LoopbackTransport};
pub use schedule::SendSchedule;
pub use udp::UdpTransport;
