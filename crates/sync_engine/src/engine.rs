//! Main sync engine implementation.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use contracts::{
    compare_precedence, DeviceId, Milliseconds, NumHops, PatternId, Precedence, ProtocolCounters,
    SyncEngineConfig, SyncMessage, Transport, TransportId, MAX_HOPS,
};
use tracing::{debug, info, instrument};

use crate::precedence::local_precedence;
use crate::route_table::{OriginatorEntry, RouteTable, RouteUpdate};
use crate::timing::{
    EFFECT_DURATION, INPUT_DURATION, ORIGINATION_TIME_DISCARD, PATTERN_START_DISCARD,
};

/// Why an inbound message was discarded before reaching the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// We sent it ourselves
    SelfSent,
    /// It describes our own timeline
    SelfOriginated,
    /// Hop count cannot be incremented
    HopOverflow,
    /// Origination time too old
    StaleOrigination,
    /// Pattern start too old
    StalePattern,
}

impl DropReason {
    /// Metric label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfSent => "self_sent",
            Self::SelfOriginated => "self_originated",
            Self::HopOverflow => "hop_overflow",
            Self::StaleOrigination => "stale_origination",
            Self::StalePattern => "stale_pattern",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the renderer should show after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Playback {
    /// Pattern to render
    pub pattern: PatternId,
    /// Time since that pattern started
    pub elapsed: Milliseconds,
    /// Render-side state must be reset before drawing
    pub restart: bool,
}

pub(crate) struct RegisteredTransport {
    pub(crate) id: TransportId,
    pub(crate) transport: Arc<dyn Transport>,
}

/// Leaderless timeline synchronization engine.
///
/// Single threaded: every call runs to completion against the `now` passed
/// in. Transports are registered with [`SyncEngine::connect`] and polled from
/// [`SyncEngine::tick`].
pub struct SyncEngine {
    /// Configuration (precedence values change through `update_precedence`)
    pub(crate) config: SyncEngineConfig,
    /// Registered transports in connection order
    pub(crate) transports: Vec<RegisteredTransport>,
    next_transport_id: u32,
    /// Whether `begin` ran
    started: bool,
    pub(crate) local_device_id: DeviceId,
    /// Originator whose timeline we play (ourselves when leading)
    current_leader: DeviceId,
    pub(crate) current_pattern: PatternId,
    pub(crate) next_pattern: PatternId,
    pub(crate) current_pattern_start_time: Milliseconds,
    /// Transport we hear the leader through, `None` when leading
    followed_transport: Option<TransportId>,
    /// Precedence advertised for the current leader
    leader_precedence: Precedence,
    last_origination_time: Milliseconds,
    num_hops: NumHops,
    pub(crate) last_user_input: Option<Milliseconds>,
    pub(crate) looping: bool,
    pub(crate) forced_palette: Option<u16>,
    /// Position in the special pattern cycle
    pub(crate) special_index: Option<usize>,
    pub(crate) restart_requested: bool,
    routes: RouteTable,
    counters: ProtocolCounters,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("local_device_id", &self.local_device_id)
            .field("current_leader", &self.current_leader)
            .field("current_pattern", &self.current_pattern)
            .field("next_pattern", &self.next_pattern)
            .field("current_pattern_start_time", &self.current_pattern_start_time)
            .field("num_hops", &self.num_hops)
            .field("looping", &self.looping)
            .field("transports", &self.transports.len())
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Create a new sync engine with the given configuration
    pub fn new(config: SyncEngineConfig) -> Self {
        Self {
            current_pattern: config.start_pattern,
            next_pattern: config.start_pattern,
            looping: config.start_looping,
            config,
            transports: Vec::new(),
            next_transport_id: 0,
            started: false,
            local_device_id: DeviceId::default(),
            current_leader: DeviceId::default(),
            current_pattern_start_time: 0,
            followed_transport: None,
            leader_precedence: 0,
            last_origination_time: 0,
            num_hops: 0,
            last_user_input: None,
            forced_palette: None,
            special_index: None,
            restart_requested: false,
            routes: RouteTable::new(),
            counters: ProtocolCounters::default(),
        }
    }

    /// Register a transport for the lifetime of the engine.
    pub fn connect(&mut self, transport: Arc<dyn Transport>) -> TransportId {
        let id = TransportId::new(self.next_transport_id);
        self.next_transport_id += 1;
        info!(transport = %id, kind = %transport.kind(), "connecting transport");
        self.transports.push(RegisteredTransport { id, transport });
        id
    }

    /// Pick the local identity and seed the timeline. Runs once; `tick` calls
    /// it lazily.
    pub fn begin(&mut self, now: Milliseconds) {
        if self.started {
            return;
        }

        let mut device_id = match self.config.device_id {
            Some(id) => id,
            None if self.config.randomize_device_id => DeviceId::random(),
            None => self
                .transports
                .iter()
                .filter_map(|t| t.transport.local_device_id())
                .find(|id| !id.is_zero())
                .unwrap_or_else(DeviceId::random),
        };
        while device_id.is_zero() {
            device_id = DeviceId::random();
        }

        self.local_device_id = device_id;
        self.current_leader = device_id;
        self.current_pattern_start_time = now;
        self.current_pattern = self.config.start_pattern;
        self.next_pattern = if self.looping {
            self.current_pattern
        } else {
            self.advance(self.current_pattern)
        };
        self.started = true;

        info!(
            now,
            device_id = %device_id,
            base_precedence = self.config.base_precedence,
            precedence_gain = self.config.precedence_gain,
            transports = self.transports.len(),
            pattern = %self.current_pattern,
            looping = self.looping,
            "starting sync engine"
        );
    }

    /// Run one protocol round.
    ///
    /// Evicts stale routes, drains every transport, decides whom to follow,
    /// publishes the result and lets transports send.
    #[instrument(level = "trace", name = "sync_engine_tick", skip(self))]
    pub fn tick(&mut self, now: Milliseconds) -> Playback {
        self.begin(now);
        self.evict(now);
        self.receive(now);
        self.decide_and_publish(now);

        for registered in &self.transports {
            registered.transport.run_loop(now);
        }

        let (pattern, elapsed) = self.playing(now);
        Playback {
            pattern,
            elapsed,
            restart: std::mem::take(&mut self.restart_requested),
        }
    }

    /// Feed one received message into the route table.
    ///
    /// Returns the route change, or `None` if the message was dropped.
    #[instrument(
        level = "trace",
        name = "sync_engine_ingest",
        skip(self, message),
        fields(originator = %message.originator, sender = %message.sender)
    )]
    pub fn ingest(
        &mut self,
        message: &SyncMessage,
        transport: TransportId,
        now: Milliseconds,
    ) -> Option<RouteUpdate> {
        self.begin(now);
        self.counters.messages_received += 1;

        if let Some(reason) = self.drop_reason(message, now) {
            match reason {
                DropReason::SelfSent => self.counters.dropped_self_sent += 1,
                DropReason::SelfOriginated => self.counters.dropped_self_originated += 1,
                DropReason::HopOverflow => self.counters.dropped_hop_overflow += 1,
                DropReason::StaleOrigination | DropReason::StalePattern => {
                    self.counters.dropped_stale += 1
                }
            }
            observability::record_message_dropped(reason.as_str());
            debug!(now, reason = %reason, message = %message, transport = %transport, "dropping message");
            return None;
        }

        let update = self.routes.ingest(message, transport, now);
        if update.created {
            self.counters.routes_created += 1;
        }
        if update.switched_next_hop {
            self.counters.next_hop_switches += 1;
            observability::record_next_hop_switch();
        }
        if !update.retracted.is_empty() {
            self.counters.routes_retracted += update.retracted.len() as u64;
            observability::record_routes_retracted(update.retracted.len());
        }
        if update.merged
            && update.restart_jump
            && message.originator == self.current_leader
            && self.followed_transport.is_some()
        {
            debug!(now, originator = %message.originator, "leader start time jumped forward");
            self.restart_requested = true;
        }
        Some(update)
    }

    fn drop_reason(&self, message: &SyncMessage, now: Milliseconds) -> Option<DropReason> {
        if message.sender == self.local_device_id {
            Some(DropReason::SelfSent)
        } else if message.originator == self.local_device_id {
            Some(DropReason::SelfOriginated)
        } else if message.num_hops >= MAX_HOPS {
            Some(DropReason::HopOverflow)
        } else if now > message.last_origination_time.saturating_add(ORIGINATION_TIME_DISCARD) {
            Some(DropReason::StaleOrigination)
        } else if now > message.current_pattern_start_time.saturating_add(PATTERN_START_DISCARD) {
            Some(DropReason::StalePattern)
        } else {
            None
        }
    }

    pub(crate) fn evict(&mut self, now: Milliseconds) {
        let evicted = self.routes.evict(now);
        if !evicted.is_empty() {
            self.counters.routes_evicted += evicted.len() as u64;
            observability::record_routes_evicted(evicted.len());
        }
    }

    fn receive(&mut self, now: Milliseconds) {
        for index in 0..self.transports.len() {
            let id = self.transports[index].id;
            let transport = Arc::clone(&self.transports[index].transport);
            let label = id.to_string();
            for message in transport.received_messages(now) {
                observability::record_message_received(&label);
                let message = message.received_on(id);
                self.ingest(&message, id, now);
            }
        }
    }

    pub(crate) fn decide_and_publish(&mut self, now: Milliseconds) {
        let precedence = self.local_precedence(now);
        match self.best_candidate(precedence, now) {
            Some(entry) => self.follow(entry, now),
            None => self.lead(precedence, now),
        }
        observability::record_route_table(self.routes.len(), self.num_hops);
        self.publish(now);
    }

    /// Strongest eligible route that beats our own precedence.
    fn best_candidate(&self, precedence: Precedence, now: Milliseconds) -> Option<OriginatorEntry> {
        let pinned = self.looping || self.has_recent_user_input(now);
        let local = self.local_device_id;

        self.routes
            .iter()
            .filter(|e| !e.retracted && !e.is_expired(now))
            .filter(|e| {
                !pinned
                    || self
                        .config
                        .admin_precedence
                        .is_some_and(|admin| e.precedence >= admin)
            })
            .filter(|e| {
                compare_precedence(e.precedence, &e.originator, precedence, &local)
                    == Ordering::Greater
            })
            .max_by(|a, b| compare_precedence(a.precedence, &a.originator, b.precedence, &b.originator))
            .cloned()
    }

    fn follow(&mut self, entry: OriginatorEntry, now: Milliseconds) {
        if self.current_leader != entry.originator {
            info!(
                now,
                from = %self.current_leader,
                to = %entry.originator,
                precedence = entry.precedence,
                num_hops = entry.num_hops,
                transport = %entry.next_hop_transport,
                "switching leader"
            );
            self.current_leader = entry.originator;
            self.counters.leader_switches += 1;
            observability::record_leader_switch(true);
        }

        self.next_pattern = entry.next_pattern;
        self.current_pattern_start_time = entry.current_pattern_start_time;
        self.followed_transport = Some(entry.next_hop_transport);
        self.num_hops = entry.num_hops;
        self.leader_precedence = entry.precedence;
        self.last_origination_time = entry.last_origination_time;

        if self.current_pattern != entry.current_pattern {
            self.current_pattern = entry.current_pattern;
            self.restart_requested = true;
            info!(
                now,
                leader = %entry.originator,
                precedence = entry.precedence,
                num_hops = entry.num_hops,
                pattern = %self.current_pattern,
                "following new pattern"
            );
        }
    }

    fn lead(&mut self, precedence: Precedence, now: Milliseconds) {
        if self.current_leader != self.local_device_id {
            info!(
                now,
                from = %self.current_leader,
                precedence,
                "leading"
            );
            self.current_leader = self.local_device_id;
            self.counters.leader_switches += 1;
            observability::record_leader_switch(false);
        }

        self.followed_transport = None;
        self.num_hops = 0;
        self.leader_precedence = precedence;
        self.last_origination_time = now;

        while now.saturating_sub(self.current_pattern_start_time) > EFFECT_DURATION {
            self.current_pattern_start_time += EFFECT_DURATION;
            if self.looping {
                self.next_pattern = self.current_pattern;
            } else {
                self.current_pattern = self.next_pattern;
                self.next_pattern = self.advance(self.next_pattern);
            }
            self.restart_requested = true;
            self.counters.pattern_rotations += 1;
            observability::record_pattern_rotation();
            info!(
                now,
                precedence,
                pattern = %self.current_pattern,
                "leading with new pattern"
            );
        }
    }

    fn publish(&self, now: Milliseconds) {
        if self.transports.is_empty() {
            debug!(now, "no transports to publish on");
            return;
        }

        let message = SyncMessage {
            sender: self.local_device_id,
            originator: self.current_leader,
            precedence: self.leader_precedence,
            current_pattern: self.current_pattern,
            next_pattern: self.next_pattern,
            num_hops: self.num_hops,
            current_pattern_start_time: self.current_pattern_start_time,
            last_origination_time: self.last_origination_time,
            receipt_transport: self.followed_transport,
            receipt_details: String::new(),
        };

        for registered in &self.transports {
            if self.followed_transport == Some(registered.id) && !registered.transport.should_echo() {
                debug!(now, transport = %registered.id, "not echoing on followed transport");
                registered.transport.disable_sending(now);
                continue;
            }
            debug!(now, transport = %registered.id, message = %message, "setting message to send");
            registered.transport.set_message_to_send(&message, now);
        }
    }

    pub(crate) fn trigger_send_asap(&self, now: Milliseconds) {
        for registered in &self.transports {
            registered.transport.trigger_send_asap(now);
        }
    }

    /// Next pattern in the rotation, with the forced palette applied.
    pub(crate) fn advance(&self, pattern: PatternId) -> PatternId {
        self.enforce_palette(pattern.next())
    }

    pub(crate) fn enforce_palette(&self, pattern: PatternId) -> PatternId {
        match self.forced_palette {
            Some(palette) => pattern.apply_palette(palette),
            None => pattern,
        }
    }

    fn has_recent_user_input(&self, now: Milliseconds) -> bool {
        self.last_user_input
            .is_some_and(|input| now.saturating_sub(input) < INPUT_DURATION)
    }

    /// Pattern on screen at `now` and how long it has been playing.
    pub fn playing(&self, now: Milliseconds) -> (PatternId, Milliseconds) {
        let elapsed = now.saturating_sub(self.current_pattern_start_time);
        if elapsed > EFFECT_DURATION {
            (self.next_pattern, elapsed - EFFECT_DURATION)
        } else {
            (self.current_pattern, elapsed)
        }
    }

    /// Our own precedence at `now`, including any user input boost.
    pub fn local_precedence(&self, now: Milliseconds) -> Precedence {
        local_precedence(
            self.config.base_precedence,
            self.config.precedence_gain,
            self.last_user_input,
            now,
        )
    }

    pub fn local_device_id(&self) -> DeviceId {
        self.local_device_id
    }

    pub fn current_leader(&self) -> DeviceId {
        self.current_leader
    }

    pub fn is_leading(&self) -> bool {
        self.started && self.current_leader == self.local_device_id
    }

    pub fn current_pattern(&self) -> PatternId {
        self.current_pattern
    }

    pub fn next_pattern(&self) -> PatternId {
        self.next_pattern
    }

    pub fn current_pattern_start_time(&self) -> Milliseconds {
        self.current_pattern_start_time
    }

    pub fn num_hops(&self) -> NumHops {
        self.num_hops
    }

    pub fn followed_transport(&self) -> Option<TransportId> {
        self.followed_transport
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn forced_palette(&self) -> Option<u16> {
        self.forced_palette
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Cumulative protocol counters
    pub fn counters(&self) -> &ProtocolCounters {
        &self.counters
    }
}
