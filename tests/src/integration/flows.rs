//! # Integration Test Flows
//!
//! A coordinator and several storage peers share one in-memory directory
//! with inline delivery. Background loops are replaced by explicit rounds
//! so the clock and every sweep are under test control.
//!
//! ## Flows Tested
//!
//! 1. Storage peers boot, discover the coordinator and each other
//! 2. Zero-hop routes become evidence, evidence becomes locality domains
//! 3. A silent peer departs and leaves the topology and neighbor views
//! 4. Rendezvous detach removes a peer immediately

#[cfg(test)]
mod tests {
    use pc_01_membership::adapters::{EphemeralIdentityStore, InMemoryDirectory};
    use pc_01_membership::test_utils::{ControllableTimeSource, RecordingListener};
    use pc_01_membership::{
        derive_peer_id, AdvertisementKind, CoordinatorPeer, MembershipApi, MembershipConfig, Peer, PeerBehavior,
        PeerId, PeerRole, RendezvousEvent, ServiceName, StoragePeer,
    };
    use pc_02_locality::{
        BroadcastTopology, DomainMergeEngine, LocalityConfig, LocalitySensor, PlacementTopology,
        TopologyBinding, DEFAULT_DOMAIN,
    };
    use std::sync::Arc;
    use tokio::sync::watch;

    const LOGIN: &str = "it";

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct Storage {
        node: StoragePeer,
        sensor: Arc<LocalitySensor>,
    }

    struct Cluster {
        time: Arc<ControllableTimeSource>,
        directory: Arc<InMemoryDirectory>,
        config: MembershipConfig,
        coordinator: CoordinatorPeer,
        engine: Arc<DomainMergeEngine>,
        topology: Arc<BroadcastTopology>,
        events: Arc<RecordingListener>,
        storage: Vec<Storage>,
    }

    fn id(seed: &str) -> PeerId {
        derive_peer_id(LOGIN, seed)
    }

    fn idle_shutdown() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    impl Cluster {
        /// Boot a coordinator and `sites.len()` storage peers. Peers with
        /// the same site number reach each other without a relay.
        fn boot(sites: &[usize]) -> Self {
            let time = Arc::new(ControllableTimeSource::new(10_000));
            let directory = Arc::new(InMemoryDirectory::new(time.clone()));
            let config = MembershipConfig::for_testing();

            let seeds: Vec<String> = (0..sites.len()).map(|i| format!("s{i}")).collect();
            for (i, a) in seeds.iter().enumerate() {
                for (j, b) in seeds.iter().enumerate().skip(i + 1) {
                    let hops = if sites[i] == sites[j] { 0 } else { 2 };
                    directory.set_route(&id(a), &id(b), hops);
                }
            }

            let coordinator_peer = Arc::new(Peer::new(
                PeerRole::Coordinator,
                "coordinator",
                config.clone(),
                directory.clone(),
                Arc::new(EphemeralIdentityStore::new(LOGIN)),
            ));
            let coordinator = CoordinatorPeer::new(coordinator_peer.clone(), idle_shutdown());
            let ctx = coordinator_peer.initialize().unwrap();
            coordinator_peer.pin_endpoint(ServiceName::Rpc).unwrap();

            let topology = Arc::new(BroadcastTopology::new(time.clone()));
            let engine = DomainMergeEngine::new(
                ctx.peer_id().clone(),
                coordinator_peer.clone(),
                directory.clone(),
                time.clone(),
                LocalityConfig::for_testing(),
            );
            let binding = Arc::new(TopologyBinding::new(topology.clone()).with_engine(&engine));
            let events = Arc::new(RecordingListener::new());
            coordinator_peer.add_listener(binding.clone());
            coordinator_peer.add_listener(events.clone());
            engine.add_listener(binding);

            let mut cluster = Self {
                time,
                directory,
                config,
                coordinator,
                engine,
                topology,
                events,
                storage: Vec::new(),
            };
            for seed in &seeds {
                cluster.boot_storage(seed);
            }
            cluster
        }

        fn boot_storage(&mut self, seed: &str) {
            let peer = Arc::new(Peer::new(
                PeerRole::Storage,
                seed,
                self.config.clone(),
                self.directory.clone(),
                Arc::new(EphemeralIdentityStore::new(LOGIN)),
            ));
            let node = StoragePeer::new(peer.clone(), idle_shutdown());
            peer.initialize().unwrap();
            node.discover_cluster().unwrap();
            let sensor = LocalitySensor::new(
                id(seed),
                self.directory.clone(),
                LocalityConfig::for_testing(),
            );
            self.coordinator
                .on_rendezvous_event(RendezvousEvent::Attached(id(seed)));
            self.storage.push(Storage { node, sensor });
        }

        /// One sweep interval: every running peer sweeps, senses, and the
        /// coordinator polls evidence.
        fn round(&self) {
            self.time.advance(self.config.sweep_interval_ms);
            for storage in &self.storage {
                storage.node.monitor().sweep_once();
                storage.sensor.sense_once();
            }
            self.coordinator.monitor().sweep_once();
            self.engine.poll();
        }

        fn stop_storage(&self, index: usize) {
            self.storage[index].node.peer().shutdown();
            self.storage[index].sensor.stop();
        }
    }

    // =========================================================================
    // FLOWS
    // =========================================================================

    #[test]
    fn test_boot_discovers_coordinator_and_fellow_peers() {
        let cluster = Cluster::boot(&[0, 0, 1]);
        cluster.round();

        let coordinator_id = id("coordinator");
        for storage in &cluster.storage {
            let peer = storage.node.peer();
            assert_eq!(peer.coordinators(), vec![coordinator_id.clone()]);
            assert_eq!(
                peer.resolve_endpoint(&coordinator_id).ok().map(|e| e.peer_id),
                Some(coordinator_id.clone())
            );
            assert_eq!(peer.members().len(), 2);
        }
        assert_eq!(cluster.coordinator.peer().members().len(), 3);
        assert_eq!(cluster.events.joins().len(), 3);
    }

    #[test]
    fn test_direct_routes_become_locality_domains() {
        let cluster = Cluster::boot(&[0, 1, 0, 1]);
        for seed in ["s0", "s1", "s2", "s3"] {
            assert_eq!(
                cluster.topology.domain_of(&id(seed)).as_deref(),
                Some(DEFAULT_DOMAIN)
            );
        }

        cluster.round();

        let topology = &cluster.topology;
        assert!(topology.is_on_same_domain(&id("s0"), &id("s2")));
        assert!(topology.is_on_same_domain(&id("s1"), &id("s3")));
        assert!(!topology.is_on_same_domain(&id("s0"), &id("s1")));
        assert_eq!(topology.num_domains(), 3);
        assert_eq!(topology.num_peers(), 4);

        let placement: &dyn PlacementTopology = &**topology;
        assert_eq!(placement.distance(&id("s0"), &id("s2")), 1);
        assert_eq!(placement.distance(&id("s0"), &id("s3")), 3);

        let own = topology.domain_of(&id("s0")).unwrap();
        for _ in 0..20 {
            let pick = placement.choose_random(&format!("~{own}")).unwrap();
            assert!(pick == id("s1") || pick == id("s3"));
        }
    }

    #[test]
    fn test_relay_host_contributes_no_evidence() {
        let mut cluster = Cluster::boot(&[0, 1]);
        cluster.boot_storage("relay");
        cluster.directory.set_route(&id("relay"), &id("s0"), 0);
        // Only the relay could report the s0 link.
        cluster.storage[0].sensor.stop();
        let relay_config = LocalityConfig {
            is_relay: true,
            ..LocalityConfig::for_testing()
        };
        cluster.storage[2].sensor =
            LocalitySensor::new(id("relay"), cluster.directory.clone(), relay_config);

        cluster.round();

        assert_eq!(cluster.engine.num_views(), 0);
        assert!(cluster
            .directory
            .records()
            .iter()
            .all(|adv| adv.kind() != AdvertisementKind::LocalityEvidence));
        assert_eq!(
            cluster.topology.domain_of(&id("relay")).as_deref(),
            Some(DEFAULT_DOMAIN)
        );
    }

    #[test]
    fn test_silent_peer_departs_and_leaves_topology() {
        let cluster = Cluster::boot(&[0, 1, 0, 1]);
        cluster.round();
        assert!(cluster.topology.contains(&id("s3")));

        cluster.stop_storage(3);
        for _ in 0..(cluster.config.retry_limit + 6) {
            cluster.round();
        }

        assert_eq!(cluster.events.departures(), vec![id("s3")]);
        assert!(!cluster.coordinator.peer().is_alive(&id("s3")));
        assert!(!cluster.topology.contains(&id("s3")));
        assert_eq!(cluster.topology.num_peers(), 3);

        let (_, view) = cluster.engine.view_of(&id("s1")).unwrap();
        assert_eq!(view, vec![id("s1")]);
        // Live peers never departed.
        for seed in ["s0", "s1", "s2"] {
            assert!(cluster.coordinator.peer().is_alive(&id(seed)));
        }
    }

    #[test]
    fn test_rendezvous_detach_removes_peer_at_once() {
        let cluster = Cluster::boot(&[0, 0]);
        cluster.round();
        assert!(cluster.topology.is_on_same_domain(&id("s0"), &id("s1")));

        cluster
            .coordinator
            .on_rendezvous_event(RendezvousEvent::Detached(id("s1")));

        assert!(!cluster.topology.contains(&id("s1")));
        let (_, view) = cluster.engine.view_of(&id("s0")).unwrap();
        assert_eq!(view, vec![id("s0")]);

        // Evidence still in the directory no longer applies to a non-member.
        cluster.round();
        assert!(!cluster.topology.contains(&id("s1")));
    }
}
