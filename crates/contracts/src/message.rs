//! SyncMessage - the per-round protocol record

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DeviceId, PatternId, Precedence};

/// Local monotonic time in milliseconds.
pub type Milliseconds = u64;

/// Hop distance from the originator.
pub type NumHops = u8;

/// Hop count treated as unreachable; messages carrying it are dropped.
pub const MAX_HOPS: NumHops = NumHops::MAX;

/// Identifier the engine assigns to each registered transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransportId(u32);

impl TransportId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Message broadcast and received every protocol round.
///
/// `receipt_transport` and `receipt_details` are filled in locally on receipt
/// and never travel on the wire; equality ignores them.
#[derive(Debug, Clone)]
pub struct SyncMessage {
    pub sender: DeviceId,
    pub originator: DeviceId,
    pub precedence: Precedence,
    pub current_pattern: PatternId,
    pub next_pattern: PatternId,
    pub num_hops: NumHops,
    pub current_pattern_start_time: Milliseconds,
    pub last_origination_time: Milliseconds,
    pub receipt_transport: Option<TransportId>,
    pub receipt_details: String,
}

impl SyncMessage {
    /// Same message tagged with the transport it arrived on.
    pub fn received_on(mut self, transport: TransportId) -> Self {
        self.receipt_transport = Some(transport);
        self
    }
}

impl PartialEq for SyncMessage {
    fn eq(&self, other: &Self) -> bool {
        self.sender == other.sender
            && self.originator == other.originator
            && self.precedence == other.precedence
            && self.current_pattern == other.current_pattern
            && self.next_pattern == other.next_pattern
            && self.num_hops == other.num_hops
            && self.current_pattern_start_time == other.current_pattern_start_time
            && self.last_origination_time == other.last_origination_time
    }
}

impl Eq for SyncMessage {}

impl fmt::Display for SyncMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.p{} via {} nh={} current={} next={} start={} ot={}",
            self.originator,
            self.precedence,
            self.sender,
            self.num_hops,
            self.current_pattern,
            self.next_pattern,
            self.current_pattern_start_time,
            self.last_origination_time
        )
    }
}
