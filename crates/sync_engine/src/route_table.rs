//! Distance-vector route table, one entry per originator.
//!
//! Each entry remembers the neighbour (device + transport) we currently hear
//! an originator through. Updates from any other neighbour are ignored unless
//! they offer a strictly shorter path or a much fresher origination time,
//! which keeps the per-originator tree loop free.
//!
//! Entries live in a `Slab` addressed through an originator index, so removal
//! never shifts the storage of other entries.

use std::collections::HashMap;
use std::fmt;

use contracts::{DeviceId, Milliseconds, NumHops, PatternId, Precedence, SyncMessage, TransportId};
use slab::Slab;
use tracing::{debug, info};

use crate::timing::{
    ORIGINATION_TIME_DISCARD, ORIGINATION_TIME_OVERRIDE, PATTERN_START_DISCARD, RESTART_JUMP,
    START_TIME_DRIFT_SAMPLES, START_TIME_JITTER, START_TIME_JUMP,
};

/// Best known route to one originator's timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginatorEntry {
    pub originator: DeviceId,
    pub precedence: Precedence,
    pub current_pattern: PatternId,
    pub next_pattern: PatternId,
    pub current_pattern_start_time: Milliseconds,
    pub last_origination_time: Milliseconds,
    pub next_hop_device: DeviceId,
    pub next_hop_transport: TransportId,
    pub num_hops: NumHops,
    pub retracted: bool,
    /// Signed run length of same-direction start-time moves.
    pub drift_counter: i8,
}

impl OriginatorEntry {
    fn from_message(message: &SyncMessage, transport: TransportId) -> Self {
        Self {
            originator: message.originator,
            precedence: message.precedence,
            current_pattern: message.current_pattern,
            next_pattern: message.next_pattern,
            current_pattern_start_time: message.current_pattern_start_time,
            last_origination_time: message.last_origination_time,
            next_hop_device: message.sender,
            next_hop_transport: transport,
            num_hops: message.num_hops.saturating_add(1),
            retracted: false,
            drift_counter: 0,
        }
    }

    /// Too old to follow: origination or pattern start aged out.
    pub fn is_expired(&self, now: Milliseconds) -> bool {
        now > self.last_origination_time.saturating_add(ORIGINATION_TIME_DISCARD)
            || now > self.current_pattern_start_time.saturating_add(PATTERN_START_DISCARD)
    }

    /// Whether updates arriving from `sender` on `transport` come from our next hop.
    pub fn is_via(&self, sender: &DeviceId, transport: TransportId) -> bool {
        self.next_hop_device == *sender && self.next_hop_transport == transport
    }

    /// Decide whether an incoming start time should replace the stored one.
    fn debounce_start_time(&mut self, incoming: Milliseconds, patterns_changed: bool) -> bool {
        let stored = self.current_pattern_start_time;
        if patterns_changed {
            return true;
        }
        if incoming == stored {
            return false;
        }

        let delta = stored.abs_diff(incoming);
        if delta >= START_TIME_JUMP {
            return true;
        }
        if delta < START_TIME_JITTER {
            self.drift_counter = 0;
            return false;
        }

        // A sample against an established drift only clears the count.
        let step: i8 = if incoming > stored { 1 } else { -1 };
        if self.drift_counter * step <= -2 {
            self.drift_counter = 0;
            return false;
        }
        self.drift_counter += step;
        self.drift_counter.abs() >= START_TIME_DRIFT_SAMPLES
    }
}

impl fmt::Display for OriginatorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.p{} via {}.{} nh={}{}",
            self.originator,
            self.precedence,
            self.next_hop_device,
            self.next_hop_transport,
            self.num_hops,
            if self.retracted { " retracted" } else { "" }
        )
    }
}

/// What a single ingest did to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteUpdate {
    /// A new originator entry was added.
    pub created: bool,
    /// An existing entry moved to the message's sender as next hop.
    pub switched_next_hop: bool,
    /// The message came from the entry's next hop and was merged.
    pub merged: bool,
    /// The merged start time replaced the stored one.
    pub start_time_accepted: bool,
    /// The start time jumped forward far enough to warrant a render restart.
    pub restart_jump: bool,
    /// Originators whose route through this sender was abandoned.
    pub retracted: Vec<DeviceId>,
}

/// Originator → route mapping.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Slab<OriginatorEntry>,
    index: HashMap<DeviceId, usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, originator: &DeviceId) -> Option<&OriginatorEntry> {
        self.index
            .get(originator)
            .and_then(|&key| self.entries.get(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OriginatorEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Remove every entry that has aged out, returning them.
    pub fn evict(&mut self, now: Milliseconds) -> Vec<OriginatorEntry> {
        let stale: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key)
            .collect();

        let mut evicted = Vec::with_capacity(stale.len());
        for key in stale {
            let entry = self.entries.remove(key);
            self.index.remove(&entry.originator);
            info!(
                now,
                entry = %entry,
                origination_age = now.saturating_sub(entry.last_origination_time),
                pattern_age = now.saturating_sub(entry.current_pattern_start_time),
                "evicting route"
            );
            evicted.push(entry);
        }
        evicted
    }

    /// Apply one already-filtered message received on `transport`.
    pub fn ingest(
        &mut self,
        message: &SyncMessage,
        transport: TransportId,
        now: Milliseconds,
    ) -> RouteUpdate {
        let mut update = RouteUpdate::default();

        match self.index.get(&message.originator).copied() {
            None => {
                let entry = OriginatorEntry::from_message(message, transport);
                info!(now, entry = %entry, pattern = %entry.current_pattern, "adding route");
                let key = self.entries.insert(entry);
                self.index.insert(message.originator, key);
                update.created = true;
            }
            Some(key) => {
                let entry = &mut self.entries[key];
                Self::update_entry(entry, message, transport, now, &mut update);
            }
        }

        for (_, entry) in self.entries.iter_mut() {
            if entry.is_via(&message.sender, transport)
                && entry.originator != message.originator
                && !entry.retracted
            {
                entry.retracted = true;
                info!(
                    now,
                    entry = %entry,
                    new_originator = %message.originator,
                    "retracting route abandoned by next hop"
                );
                update.retracted.push(entry.originator);
            }
        }

        update
    }

    fn update_entry(
        entry: &mut OriginatorEntry,
        message: &SyncMessage,
        transport: TransportId,
        now: Milliseconds,
        update: &mut RouteUpdate,
    ) {
        let receipt_hops = message.num_hops.saturating_add(1);

        if !entry.is_via(&message.sender, transport) {
            let shorter = receipt_hops < entry.num_hops;
            let fresher = message.last_origination_time
                > entry
                    .last_origination_time
                    .saturating_add(ORIGINATION_TIME_OVERRIDE);
            if shorter || fresher {
                info!(
                    now,
                    entry = %entry,
                    new_next_hop = %message.sender,
                    new_transport = %transport,
                    new_num_hops = receipt_hops,
                    reason = if shorter { "hops" } else { "origination_time" },
                    "switching next hop"
                );
                entry.next_hop_device = message.sender;
                entry.next_hop_transport = transport;
                entry.num_hops = receipt_hops;
                update.switched_next_hop = true;
            }
        }

        if !entry.is_via(&message.sender, transport) {
            debug!(
                now,
                entry = %entry,
                sender = %message.sender,
                transport = %transport,
                "rejecting update from non next hop"
            );
            return;
        }

        let patterns_changed = entry.current_pattern != message.current_pattern
            || entry.next_pattern != message.next_pattern;
        let incoming_start = message.current_pattern_start_time;
        update.restart_jump =
            incoming_start > entry.current_pattern_start_time.saturating_add(RESTART_JUMP);
        update.start_time_accepted = entry.debounce_start_time(incoming_start, patterns_changed);

        if patterns_changed || entry.retracted || entry.precedence != message.precedence {
            info!(
                now,
                entry = %entry,
                precedence = message.precedence,
                current = %message.current_pattern,
                next = %message.next_pattern,
                start_accepted = update.start_time_accepted,
                details = %message.receipt_details,
                "accepting route update"
            );
        }

        entry.precedence = message.precedence;
        entry.current_pattern = message.current_pattern;
        entry.next_pattern = message.next_pattern;
        entry.last_origination_time = message.last_origination_time;
        entry.retracted = false;
        if update.start_time_accepted {
            entry.current_pattern_start_time = incoming_start;
            entry.drift_counter = 0;
        }
        update.merged = true;
    }
}
