//! In-process broadcast medium.
//!
//! A [`LoopbackHub`] connects any number of [`LoopbackTransport`]s. Every
//! payload a node sends is delivered to every other node whose link to the
//! sender is up, optionally subject to random loss. Payloads travel through
//! the real wire codec so simulations exercise the same relative-time
//! encoding as devices on a network.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use contracts::{
    DeviceId, Milliseconds, SyncMessage, Transport, TransportKind, TransportStatus,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::schedule::SendSchedule;

/// Delivery counters for a hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub sent: u64,
    pub delivered: u64,
    pub lost: u64,
    pub blocked: u64,
}

#[derive(Debug, Default)]
struct HubState {
    inboxes: Vec<VecDeque<Bytes>>,
    /// Unordered node pairs whose link is down
    cut: HashSet<(usize, usize)>,
    loss: Option<(f64, StdRng)>,
    stats: HubStats,
}

fn link_key(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Shared broadcast medium. Cloning yields another handle to the same hub.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub that drops each delivery with `probability`, reproducibly from `seed`.
    pub fn with_loss(probability: f64, seed: u64) -> Self {
        let hub = Self::new();
        hub.lock().loss = Some((probability.clamp(0.0, 1.0), StdRng::seed_from_u64(seed)));
        hub
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a node and return its transport.
    pub fn attach(&self) -> LoopbackTransport {
        let node = {
            let mut state = self.lock();
            state.inboxes.push(VecDeque::new());
            state.inboxes.len() - 1
        };
        debug!(node, "attached loopback node");
        LoopbackTransport {
            hub: self.clone(),
            node,
            device_id: None,
            echo: true,
            schedule: Mutex::new(SendSchedule::new(0)),
        }
    }

    pub fn node_count(&self) -> usize {
        self.lock().inboxes.len()
    }

    /// Bring the link between two nodes up or down.
    pub fn set_link(&self, a: usize, b: usize, up: bool) {
        let mut state = self.lock();
        if up {
            state.cut.remove(&link_key(a, b));
        } else {
            state.cut.insert(link_key(a, b));
        }
        debug!(a, b, up, "loopback link changed");
    }

    /// Cut every link except the listed ones.
    pub fn restrict_to_links(&self, links: &[(usize, usize)]) {
        let mut state = self.lock();
        let keep: HashSet<_> = links.iter().map(|&(a, b)| link_key(a, b)).collect();
        let nodes = state.inboxes.len();
        state.cut.clear();
        for a in 0..nodes {
            for b in (a + 1)..nodes {
                if !keep.contains(&(a, b)) {
                    state.cut.insert((a, b));
                }
            }
        }
    }

    /// Bring every link back up.
    pub fn heal(&self) {
        self.lock().cut.clear();
        debug!("loopback links healed");
    }

    /// Split nodes into groups that only hear each other.
    pub fn partition(&self, groups: &[&[usize]]) {
        let links: Vec<(usize, usize)> = groups
            .iter()
            .flat_map(|group| {
                group
                    .iter()
                    .flat_map(move |&a| group.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
            })
            .collect();
        self.restrict_to_links(&links);
    }

    pub fn stats(&self) -> HubStats {
        self.lock().stats
    }

    /// Deliver a raw payload to one node, bypassing links and loss.
    pub fn inject(&self, node: usize, payload: Bytes) {
        if let Some(inbox) = self.lock().inboxes.get_mut(node) {
            inbox.push_back(payload);
        }
    }

    fn broadcast(&self, from: usize, payload: Bytes) {
        let mut state = self.lock();
        let HubState {
            inboxes,
            cut,
            loss,
            stats,
        } = &mut *state;
        stats.sent += 1;

        for (node, inbox) in inboxes.iter_mut().enumerate() {
            if node == from {
                continue;
            }
            if cut.contains(&link_key(from, node)) {
                stats.blocked += 1;
                continue;
            }
            if let Some((probability, rng)) = loss.as_mut() {
                if rng.random_bool(*probability) {
                    stats.lost += 1;
                    continue;
                }
            }
            inbox.push_back(payload.clone());
            stats.delivered += 1;
        }
    }

    fn drain(&self, node: usize) -> Vec<Bytes> {
        self.lock()
            .inboxes
            .get_mut(node)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }
}

/// One node on a [`LoopbackHub`].
#[derive(Debug)]
pub struct LoopbackTransport {
    hub: LoopbackHub,
    node: usize,
    device_id: Option<DeviceId>,
    echo: bool,
    schedule: Mutex<SendSchedule>,
}

impl LoopbackTransport {
    /// Report `device_id` as this transport's hardware identifier.
    pub fn with_device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// Whether to keep rebroadcasting on the transport we follow through.
    /// Defaults to true: unlike a LAN, links here need not reach every node.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_min_send_interval(self, interval: Milliseconds) -> Self {
        Self {
            schedule: Mutex::new(SendSchedule::new(interval)),
            ..self
        }
    }

    /// Index of this node on the hub.
    pub fn node(&self) -> usize {
        self.node
    }

    fn schedule(&self) -> MutexGuard<'_, SendSchedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for LoopbackTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Loopback
    }

    fn status(&self) -> TransportStatus {
        TransportStatus::Connected
    }

    fn local_device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    fn set_message_to_send(&self, message: &SyncMessage, _now: Milliseconds) {
        self.schedule().set(message);
    }

    fn disable_sending(&self, _now: Milliseconds) {
        self.schedule().disable();
    }

    fn trigger_send_asap(&self, now: Milliseconds) {
        self.schedule().trigger_asap();
        self.run_loop(now);
    }

    fn received_messages(&self, now: Milliseconds) -> Vec<SyncMessage> {
        self.hub
            .drain(self.node)
            .into_iter()
            .filter_map(|payload| match wire_codec::decode(&payload, now) {
                Ok(mut message) => {
                    message.receipt_details = format!("loopback node {}", self.node);
                    trace!(node = self.node, message = %message, "loopback received");
                    Some(message)
                }
                Err(err) => {
                    debug!(node = self.node, error = %err, "dropping malformed loopback payload");
                    observability::record_message_dropped("malformed");
                    None
                }
            })
            .collect()
    }

    fn should_echo(&self) -> bool {
        self.echo
    }

    fn run_loop(&self, now: Milliseconds) {
        let due = self.schedule().poll(now);
        if let Some(message) = due {
            trace!(node = self.node, message = %message, "loopback sending");
            self.hub.broadcast(self.node, wire_codec::encode(&message, now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PatternId;

    fn message(sender: u8) -> SyncMessage {
        SyncMessage {
            sender: DeviceId::new([2, 0, 0, 0, 0, sender]),
            originator: DeviceId::new([2, 0, 0, 0, 0, sender]),
            precedence: 10,
            current_pattern: PatternId::START,
            next_pattern: PatternId::START.next(),
            num_hops: 0,
            current_pattern_start_time: 1_000,
            last_origination_time: 1_000,
            receipt_transport: None,
            receipt_details: String::new(),
        }
    }

    #[test]
    fn test_broadcast_reaches_other_nodes() {
        let hub = LoopbackHub::new();
        let a = hub.attach();
        let b = hub.attach();
        let c = hub.attach();

        a.set_message_to_send(&message(1), 1_000);
        a.run_loop(1_000);

        assert!(a.received_messages(1_000).is_empty());
        let received = b.received_messages(1_010);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].sender, DeviceId::new([2, 0, 0, 0, 0, 1]));
        assert_eq!(received[0].receipt_details, "loopback node 1");
        assert_eq!(c.received_messages(1_010).len(), 1);
        assert!(b.received_messages(1_020).is_empty());
    }

    #[test]
    fn test_times_pass_through_codec() {
        let hub = LoopbackHub::new();
        let a = hub.attach();
        let b = hub.attach();
        a.set_message_to_send(&message(1), 3_000);
        a.run_loop(3_000);

        let received = b.received_messages(3_005);
        assert_eq!(received[0].current_pattern_start_time, 1_000);
        assert_eq!(received[0].last_origination_time, 1_000);
    }

    #[test]
    fn test_cut_link_blocks_delivery() {
        let hub = LoopbackHub::new();
        let a = hub.attach();
        let b = hub.attach();
        let c = hub.attach();
        hub.set_link(0, 1, false);

        a.set_message_to_send(&message(1), 1_000);
        a.run_loop(1_000);
        assert!(b.received_messages(1_000).is_empty());
        assert_eq!(c.received_messages(1_000).len(), 1);
        assert_eq!(hub.stats().blocked, 1);

        hub.heal();
        a.trigger_send_asap(1_001);
        assert_eq!(b.received_messages(1_001).len(), 1);
    }

    #[test]
    fn test_restrict_to_line() {
        let hub = LoopbackHub::new();
        let nodes: Vec<_> = (0..3).map(|_| hub.attach()).collect();
        hub.restrict_to_links(&[(0, 1), (1, 2)]);

        nodes[0].set_message_to_send(&message(1), 1_000);
        nodes[0].run_loop(1_000);
        assert_eq!(nodes[1].received_messages(1_000).len(), 1);
        assert!(nodes[2].received_messages(1_000).is_empty());
    }

    #[test]
    fn test_partition_groups() {
        let hub = LoopbackHub::new();
        let nodes: Vec<_> = (0..4).map(|_| hub.attach()).collect();
        hub.partition(&[&[0, 1], &[2, 3]]);

        nodes[0].set_message_to_send(&message(1), 1_000);
        nodes[0].run_loop(1_000);
        assert_eq!(nodes[1].received_messages(1_000).len(), 1);
        assert!(nodes[2].received_messages(1_000).is_empty());
        assert!(nodes[3].received_messages(1_000).is_empty());
    }

    #[test]
    fn test_full_loss() {
        let hub = LoopbackHub::with_loss(1.0, 7);
        let a = hub.attach();
        let b = hub.attach();
        a.set_message_to_send(&message(1), 1_000);
        a.run_loop(1_000);
        assert!(b.received_messages(1_000).is_empty());
        assert_eq!(hub.stats().lost, 1);
    }

    #[test]
    fn test_disable_sending() {
        let hub = LoopbackHub::new();
        let a = hub.attach();
        let b = hub.attach();
        a.set_message_to_send(&message(1), 1_000);
        a.disable_sending(1_000);
        a.run_loop(1_000);
        assert!(b.received_messages(1_000).is_empty());
    }

    #[test]
    fn test_malformed_payload_dropped() {
        let hub = LoopbackHub::new();
        let a = hub.attach();
        hub.inject(0, Bytes::from_static(&[0x10, 0x00, 0x01]));
        hub.inject(0, Bytes::from(vec![0x20; wire_codec::PAYLOAD_LEN]));
        assert!(a.received_messages(1_000).is_empty());
    }

    #[test]
    fn test_builder_options() {
        let hub = LoopbackHub::new();
        let id = DeviceId::new([2, 0, 0, 0, 0, 9]);
        let transport = hub
            .attach()
            .with_device_id(id)
            .with_echo(false)
            .with_min_send_interval(100);
        assert_eq!(transport.local_device_id(), Some(id));
        assert!(!transport.should_echo());
        assert_eq!(hub.node_count(), 1);
    }
}
