//! Transport trait - send/receive capability consumed by the sync engine
//!
//! Transports own their I/O (sockets, background tasks, radio drivers) and
//! expose a non-blocking surface. The engine registers each transport once and
//! calls into it only from its tick thread, so inbound messages must already be
//! buffered and safe to hand over when [`Transport::received_messages`] runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DeviceId, Milliseconds, SyncMessage};

/// Connection lifecycle of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    #[default]
    Initializing,
    Connecting,
    Connected,
    Disconnected,
    ConnectionFailed,
}

impl TransportStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::ConnectionFailed => "connection failed",
        };
        f.write_str(s)
    }
}

/// Transport implementation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// IP multicast over UDP
    Udp,
    /// In-process broadcast medium
    Loopback,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Loopback => f.write_str("loopback"),
        }
    }
}

/// Send/receive capability.
///
/// All methods take `&self` and must not block; implementations use interior
/// mutability and hand work off to their own tasks where needed.
pub trait Transport: Send + Sync {
    /// Transport kind
    fn kind(&self) -> TransportKind;

    /// Current connection status
    fn status(&self) -> TransportStatus;

    /// Hardware-derived identifier, if this transport has one.
    fn local_device_id(&self) -> Option<DeviceId>;

    /// Replace the message broadcast on this transport.
    fn set_message_to_send(&self, message: &SyncMessage, now: Milliseconds);

    /// Stop broadcasting until the next `set_message_to_send`.
    fn disable_sending(&self, now: Milliseconds);

    /// Send at the next opportunity regardless of rate limiting.
    fn trigger_send_asap(&self, now: Milliseconds);

    /// Drain messages received since the previous call.
    fn received_messages(&self, now: Milliseconds) -> Vec<SyncMessage>;

    /// Whether to keep broadcasting on the transport we follow our leader through.
    fn should_echo(&self) -> bool;

    /// Give the transport a chance to send and to manage its connection.
    fn run_loop(&self, _now: Milliseconds) {}
}
