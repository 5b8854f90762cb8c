//! # Integration Tests
//!
//! Multi-device scenarios across crates.
//!
//! Covers:
//! - Leader election between directly linked devices
//! - Route retraction and next-hop hysteresis
//! - Eviction boundaries
//! - Mesh convergence, partition and heal over a loopback hub
//! - A mesh built from the shipped `lightsync.toml`, summarized through the
//!   protocol stats aggregator

#[cfg(test)]
mod harness {
    use std::sync::Arc;

    use bytes::Bytes;
    use contracts::{DeviceId, Milliseconds, SyncEngineConfig, SyncMessage};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use sync_engine::{timing::START_TIME_JITTER, SyncEngine};
    use transport::LoopbackHub;

    pub const TICK_MS: Milliseconds = 10;
    pub const CLOCK_START: Milliseconds = 100_000;

    pub fn device(last: u8) -> DeviceId {
        DeviceId::new([0x02, 0, 0, 0, 0, last])
    }

    /// Engines on one hub with a shared virtual clock. Node `i` has device id
    /// `device(i + 1)`.
    pub struct Mesh {
        pub hub: LoopbackHub,
        pub engines: Vec<SyncEngine>,
        pub active: Vec<bool>,
        pub now: Milliseconds,
        order: Vec<usize>,
        rng: StdRng,
    }

    impl Mesh {
        pub fn new(devices: usize) -> Self {
            Self::with_hub(LoopbackHub::new(), devices)
        }

        pub fn with_hub(hub: LoopbackHub, devices: usize) -> Self {
            Self::with_config(hub, devices, &SyncEngineConfig::default())
        }

        /// Every node starts from `config` with its own device id.
        pub fn with_config(hub: LoopbackHub, devices: usize, config: &SyncEngineConfig) -> Self {
            let engines = (0..devices)
                .map(|i| {
                    let id = device(i as u8 + 1);
                    let transport = hub.attach().with_device_id(id);
                    let mut engine = SyncEngine::new(SyncEngineConfig {
                        device_id: Some(id),
                        ..config.clone()
                    });
                    engine.connect(Arc::new(transport));
                    engine
                })
                .collect();
            Self {
                hub,
                engines,
                active: vec![true; devices],
                now: CLOCK_START,
                order: (0..devices).collect(),
                rng: StdRng::seed_from_u64(42),
            }
        }

        /// One tick for every active engine, in a shuffled order.
        pub fn step(&mut self) {
            self.now += TICK_MS;
            self.order.shuffle(&mut self.rng);
            for &i in &self.order {
                if self.active[i] {
                    self.engines[i].tick(self.now);
                }
            }
        }

        pub fn run(&mut self, ticks: u64) {
            for _ in 0..ticks {
                self.step();
            }
        }

        /// Step until converged; returns the tick count it took.
        pub fn run_until_converged(&mut self, max_ticks: u64) -> Option<u64> {
            (1..=max_ticks).find(|_| {
                self.step();
                self.converged()
            })
        }

        fn active_engines(&self) -> impl Iterator<Item = &SyncEngine> {
            self.engines
                .iter()
                .zip(&self.active)
                .filter(|(_, active)| **active)
                .map(|(engine, _)| engine)
        }

        /// Same leader, same patterns, start times within jitter tolerance.
        pub fn converged(&self) -> bool {
            let mut engines = self.active_engines();
            let Some(first) = engines.next() else {
                return true;
            };
            engines.all(|engine| {
                engine.current_leader() == first.current_leader()
                    && engine.current_pattern() == first.current_pattern()
                    && engine.next_pattern() == first.next_pattern()
                    && engine
                        .current_pattern_start_time()
                        .abs_diff(first.current_pattern_start_time())
                        <= START_TIME_JITTER
            })
        }

        pub fn leaders(&self, nodes: &[usize]) -> Vec<DeviceId> {
            nodes
                .iter()
                .map(|&i| self.engines[i].current_leader())
                .collect()
        }
    }

    /// Message as a device `sender` relaying `originator` would send it.
    pub fn relayed(
        sender: DeviceId,
        originator: DeviceId,
        precedence: u16,
        num_hops: u8,
        now: Milliseconds,
    ) -> SyncMessage {
        SyncMessage {
            sender,
            originator,
            precedence,
            current_pattern: contracts::PatternId::START,
            next_pattern: contracts::PatternId::START.next(),
            num_hops,
            current_pattern_start_time: now,
            last_origination_time: now,
            receipt_transport: None,
            receipt_details: String::new(),
        }
    }

    /// Encode on the sender's clock, ready for `LoopbackHub::inject`.
    pub fn wire(message: &SyncMessage, now: Milliseconds) -> Bytes {
        wire_codec::encode(message, now)
    }
}

#[cfg(test)]
mod scenario_tests {
    use std::sync::Arc;

    use contracts::{SyncEngineConfig, TransportId};
    use sync_engine::SyncEngine;
    use transport::LoopbackHub;

    use crate::harness::{device, relayed, wire, CLOCK_START};

    /// One engine on a hub whose other node is driven by hand.
    fn listener(base_precedence: u16, id: u8) -> (LoopbackHub, SyncEngine) {
        let hub = LoopbackHub::new();
        let transport = hub.attach();
        let mut engine = SyncEngine::new(SyncEngineConfig {
            base_precedence,
            device_id: Some(device(id)),
            ..Default::default()
        });
        engine.connect(Arc::new(transport));
        (hub, engine)
    }

    #[test]
    fn test_two_devices_direct_link() {
        let a = device(0xA);
        let (hub, mut b) = listener(0, 0xB);
        let now = CLOCK_START;
        b.begin(now);
        assert!(b.is_leading());

        hub.inject(0, wire(&relayed(a, a, 100, 0, now), now));
        b.tick(now + 10);

        assert_eq!(b.current_leader(), a);
        assert_eq!(b.num_hops(), 1);
        assert!(!b.is_leading());
    }

    #[test]
    fn test_retraction_through_next_hop() {
        let (x, y, relay) = (device(0x10), device(0x20), device(0xB));
        let (hub, mut c) = listener(1000, 0xC);
        let mut now = CLOCK_START;

        hub.inject(0, wire(&relayed(relay, x, 5000, 1, now), now));
        c.tick(now);
        assert_eq!(c.current_leader(), x);

        now += 10;
        hub.inject(0, wire(&relayed(relay, y, 3000, 1, now), now));
        c.tick(now);

        let entry = c.routes().get(&x).unwrap();
        assert!(entry.retracted);
        assert_eq!(c.current_leader(), y);

        // X stays out of candidacy while Y keeps arriving through the relay.
        for _ in 0..20 {
            now += 10;
            hub.inject(0, wire(&relayed(relay, y, 3000, 1, now), now));
            c.tick(now);
            assert_eq!(c.current_leader(), y);
        }
    }

    #[test]
    fn test_hysteresis_on_equal_hops() {
        let (x, r1, r2) = (device(0x10), device(0x21), device(0x22));
        let (hub, mut d) = listener(1000, 0xD);
        let start = CLOCK_START;

        hub.inject(0, wire(&relayed(r1, x, 5000, 1, start), start));
        d.tick(start);
        assert_eq!(d.routes().get(&x).unwrap().next_hop_device, r1);
        assert_eq!(d.routes().get(&x).unwrap().num_hops, 2);

        let later = start + 3_000;
        let mut via_r2 = relayed(r2, x, 5000, 1, later);
        via_r2.current_pattern_start_time = start;
        hub.inject(0, wire(&via_r2, later));
        d.tick(later);
        assert_eq!(d.routes().get(&x).unwrap().next_hop_device, r1);

        let much_later = start + 8_500;
        let mut via_r2 = relayed(r2, x, 5000, 1, much_later);
        via_r2.current_pattern_start_time = start;
        hub.inject(0, wire(&via_r2, much_later));
        d.tick(much_later);
        let entry = d.routes().get(&x).unwrap();
        assert_eq!(entry.next_hop_device, r2);
        assert_eq!(entry.num_hops, 2);
    }

    #[test]
    fn test_eviction_boundary() {
        let origin = device(0x10);
        let ot = CLOCK_START;
        let message = relayed(origin, origin, 5000, 0, ot);

        let mut kept = SyncEngine::new(SyncEngineConfig::default());
        kept.ingest(&message, TransportId::new(0), ot);
        kept.tick(ot + 9_000 - 1);
        assert!(kept.routes().get(&origin).is_some());

        let mut evicted = SyncEngine::new(SyncEngineConfig::default());
        evicted.ingest(&message, TransportId::new(0), ot);
        evicted.tick(ot + 9_000 + 1);
        assert!(evicted.routes().get(&origin).is_none());
        assert_eq!(evicted.counters().routes_evicted, 1);
        assert!(evicted.is_leading());
    }

    #[test]
    fn test_malformed_and_self_sent_payloads() {
        let (hub, mut engine) = listener(1000, 0xE);
        let now = CLOCK_START;
        engine.begin(now);

        hub.inject(0, bytes::Bytes::from_static(&[0x10, 0x01, 0x02]));
        hub.inject(0, bytes::Bytes::from(vec![0xFF; wire_codec::PAYLOAD_LEN]));
        let echo = relayed(device(0xE), device(0x10), 9000, 1, now);
        hub.inject(0, wire(&echo, now));
        engine.tick(now + 10);

        assert!(engine.is_leading());
        assert!(engine.routes().is_empty());
        assert_eq!(engine.counters().messages_received, 1);
        assert_eq!(engine.counters().dropped_self_sent, 1);
    }
}

#[cfg(test)]
mod mesh_tests {
    use transport::LoopbackHub;

    use crate::harness::{device, Mesh};

    #[test]
    fn test_full_mesh_converges() {
        let mut mesh = Mesh::new(6);
        let ticks = mesh.run_until_converged(200);
        assert!(ticks.is_some(), "mesh did not converge");
        assert!(mesh.leaders(&[0, 1, 2, 3, 4, 5]).iter().all(|&l| l == device(6)));

        // Agreement holds once reached, well before the first rotation.
        for _ in 0..300 {
            mesh.step();
            assert!(mesh.converged());
        }
    }

    #[test]
    fn test_line_converges_over_relays() {
        let mut mesh = Mesh::new(5);
        mesh.hub.restrict_to_links(&[(0, 1), (1, 2), (2, 3), (3, 4)]);

        let ticks = mesh.run_until_converged(300);
        assert!(ticks.is_some(), "line did not converge");
        let hops: Vec<u8> = mesh.engines.iter().map(|e| e.num_hops()).collect();
        assert_eq!(hops, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_partition_then_heal() {
        let mut mesh = Mesh::new(6);
        mesh.run_until_converged(200).unwrap();

        mesh.hub.partition(&[&[0, 1, 2], &[3, 4, 5]]);
        // Long enough for the lost leader's route to age out everywhere.
        mesh.run(1_200);
        assert!(mesh.leaders(&[0, 1, 2]).iter().all(|&l| l == device(3)));
        assert!(mesh.leaders(&[3, 4, 5]).iter().all(|&l| l == device(6)));

        mesh.hub.heal();
        mesh.run(50);
        assert!(mesh.leaders(&[0, 1, 2, 3, 4, 5]).iter().all(|&l| l == device(6)));
    }

    #[test]
    fn test_leader_departure_triggers_reelection() {
        let mut mesh = Mesh::new(4);
        mesh.run_until_converged(200).unwrap();
        assert_eq!(mesh.engines[0].current_leader(), device(4));

        mesh.active[3] = false;
        mesh.run(1_000);
        assert!(mesh.leaders(&[0, 1, 2]).iter().all(|&l| l == device(3)));
    }

    #[test]
    fn test_user_input_takes_over() {
        let mut mesh = Mesh::new(4);
        mesh.run_until_converged(200).unwrap();

        let now = mesh.now;
        mesh.engines[0].next(now);
        let pattern = mesh.engines[0].current_pattern();
        assert!(mesh.engines[0].is_leading());

        mesh.run(10);
        assert!(mesh.leaders(&[0, 1, 2, 3]).iter().all(|&l| l == device(1)));
        assert!(mesh
            .engines
            .iter()
            .all(|engine| engine.current_pattern() == pattern));
    }

    #[test]
    fn test_lossy_mesh_converges() {
        let mut mesh = Mesh::with_hub(LoopbackHub::with_loss(0.3, 9), 5);
        let ticks = mesh.run_until_converged(500);
        assert!(ticks.is_some(), "lossy mesh did not converge");
        assert!(mesh.hub.stats().lost > 0);
    }
}

#[cfg(test)]
mod config_tests {
    use std::path::Path;

    use config_loader::ConfigLoader;
    use contracts::TransportConfig;
    use observability::ProtocolStatsAggregator;
    use transport::LoopbackHub;

    use crate::harness::{device, Mesh};

    fn sample_config_path() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../lightsync.toml")
    }

    #[test]
    fn test_sample_config_loads() {
        let blueprint = ConfigLoader::load_from_path(&sample_config_path()).unwrap();
        assert_eq!(blueprint.engine.base_precedence, 1000);
        assert!(blueprint.engine.device_id.is_none());
        assert_eq!(blueprint.runtime.tick_interval_ms, 10);

        let TransportConfig::Udp(udp) = &blueprint.transports[0];
        assert_eq!(udp.group().to_string(), "224.0.0.169:6699");
    }

    #[test]
    fn test_mesh_from_sample_config() {
        let blueprint = ConfigLoader::load_from_path(&sample_config_path()).unwrap();
        let mut mesh = Mesh::with_config(LoopbackHub::new(), 4, &blueprint.engine);

        let mut stats = ProtocolStatsAggregator::new();
        let converged_at = mesh.run_until_converged(500).expect("mesh should converge");
        stats.record_convergence(converged_at);
        mesh.run(100);
        assert!(mesh.converged());
        assert_eq!(mesh.leaders(&[0]), vec![device(4)]);

        for engine in &mesh.engines {
            stats.record_counters(engine.counters());
            stats.record_hops(engine.num_hops());
        }
        let summary = stats.summary();
        assert_eq!(summary.engines, 4);
        assert_eq!(summary.converged_at_tick, Some(converged_at));
        assert!(summary.messages_received > 0);
        assert_eq!(summary.num_hops.count, 4);
        assert_eq!(summary.num_hops.min, 0.0);
        assert_eq!(summary.num_hops.max, 1.0);
    }
}
