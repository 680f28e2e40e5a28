//! End-to-end boot of the node runtime.

use node_runtime::container::subsystems::demo_seed;
use node_runtime::{NodeConfig, NodeMode, NodeRuntime, StartupError};
use pc_01_membership::adapters::{DeliveryMode, InMemoryDirectory, SystemTimeSource};
use pc_01_membership::{
    derive_peer_id, Advertisement, AdvertisementDirectory, MembershipApi, PeerBehavior, PeerId,
    PeerRole, RendezvousEvent,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn demo_config(peers: usize, sites: usize) -> NodeConfig {
    let mut config = NodeConfig::for_testing();
    config.node.mode = NodeMode::Demo;
    config.node.demo_storage_peers = peers;
    config.node.demo_sites = sites;
    config.identity.login_name = Some("demo".into());
    config
}

fn demo_ids(peers: usize) -> Vec<PeerId> {
    (0..peers).map(|i| derive_peer_id("demo", &demo_seed(i))).collect()
}

fn shared_directory() -> Arc<InMemoryDirectory> {
    Arc::new(InMemoryDirectory::with_delivery(
        Arc::new(SystemTimeSource::new()),
        DeliveryMode::Spawned,
    ))
}

fn node_config(mode: NodeMode, p2p_dir: &Path, seed: &str) -> NodeConfig {
    let mut config = NodeConfig::for_testing();
    config.node.mode = mode;
    config.identity.p2p_dir = p2p_dir.to_path_buf();
    config.identity.seed = seed.into();
    config
}

#[tokio::test(start_paused = true)]
async fn test_demo_cluster_groups_peers_by_site() {
    let mut runtime = NodeRuntime::new(demo_config(4, 2));
    runtime.start().unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    let ids = demo_ids(4);
    let container = runtime.container();
    let coordinator = container.coordinator().unwrap();
    for id in &ids {
        assert!(coordinator.peer.peer().is_alive(id));
    }

    let topology = container.topology().unwrap();
    assert_eq!(topology.num_peers(), 4);
    assert!(topology.is_on_same_domain(&ids[0], &ids[2]));
    assert!(topology.is_on_same_domain(&ids[1], &ids[3]));
    assert!(!topology.is_on_same_domain(&ids[0], &ids[1]));
    assert_eq!(topology.distance(&ids[0], &ids[1]), 3);

    let remote = topology.domain_of(&ids[0]).unwrap();
    let pick = topology.choose_random(&format!("~{remote}")).unwrap();
    assert!(pick == ids[1] || pick == ids[3]);

    let engine = coordinator.engine.clone();
    let sensors: Vec<_> = container.storage().iter().map(|s| s.sensor.clone()).collect();
    runtime.shutdown().await;
    assert!(!engine.is_running());
    assert!(sensors.iter().all(|sensor| !sensor.is_running()));
}

#[tokio::test(start_paused = true)]
async fn test_single_site_storage_peers_know_each_other() {
    let mut runtime = NodeRuntime::new(demo_config(3, 1));
    runtime.start().unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let ids = demo_ids(3);
    let container = runtime.container();
    for storage in container.storage() {
        let own = storage.peer_id().unwrap();
        let peer = storage.peer.peer();
        for other in ids.iter().filter(|id| **id != own) {
            assert!(peer.is_alive(other));
        }
        assert_eq!(peer.coordinators().len(), 1);
    }
    let topology = container.topology().unwrap();
    assert_eq!(topology.num_domains(), 2);

    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_coordinator_mode_persists_identity() {
    let dir = tempfile::tempdir().unwrap();
    let directory = shared_directory();
    let config = node_config(NodeMode::Coordinator, dir.path(), "coordinator");

    let mut runtime = NodeRuntime::with_directory(config, directory.clone());
    runtime.start().unwrap();
    let coordinator = runtime.container().coordinator().unwrap();
    let first = coordinator.peer.peer().peer_id().cloned().unwrap();
    assert!(dir.path().join("cert").read_dir().unwrap().next().is_some());
    runtime.shutdown().await;

    let config = node_config(NodeMode::Coordinator, dir.path(), "ignored-on-reload");
    let mut runtime = NodeRuntime::with_directory(config, directory);
    runtime.start().unwrap();
    let reloaded = runtime.container().coordinator().unwrap().peer.peer().peer_id().cloned();
    assert_eq!(reloaded, Some(first));
    runtime.shutdown().await;
}

#[tokio::test]
async fn test_cluster_modes_refuse_private_directory() {
    let dir = tempfile::tempdir().unwrap();
    for mode in [NodeMode::Coordinator, NodeMode::Storage] {
        let mut runtime = NodeRuntime::new(node_config(mode, dir.path(), "lonely"));
        let err = runtime.start().unwrap_err();
        assert!(matches!(err, StartupError::IsolatedDirectory { mode: m } if m == mode));
        assert!(runtime.container().peers().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_coordinator_and_storage_nodes_share_injected_directory() {
    let coordinator_dir = tempfile::tempdir().unwrap();
    let storage_dir = tempfile::tempdir().unwrap();
    let directory = shared_directory();

    let mut coordinator_node = NodeRuntime::with_directory(
        node_config(NodeMode::Coordinator, coordinator_dir.path(), "coordinator"),
        directory.clone(),
    );
    coordinator_node.start().unwrap();
    let mut storage_node = NodeRuntime::with_directory(
        node_config(NodeMode::Storage, storage_dir.path(), "s1"),
        directory.clone(),
    );
    storage_node.start().unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let coordinator = coordinator_node.container().coordinator().unwrap();
    let coordinator_id = coordinator.peer.peer().peer_id().cloned().unwrap();
    let storage = &storage_node.container().storage()[0];
    let storage_id = storage.peer_id().unwrap();
    assert_eq!(storage.peer.peer().coordinators(), vec![coordinator_id]);

    coordinator
        .peer
        .on_rendezvous_event(RendezvousEvent::Attached(storage_id.clone()));
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(coordinator.peer.peer().is_alive(&storage_id));
    assert!(coordinator.topology.contains(&storage_id));

    storage_node.shutdown().await;
    coordinator_node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_second_coordinator_is_fatal() {
    let mut runtime = NodeRuntime::new(demo_config(2, 1));
    runtime.start().unwrap();

    let directory = runtime.container().in_process_directory().unwrap().clone();
    directory
        .publish(
            Advertisement::presence(derive_peer_id("demo", "rogue"), PeerRole::Coordinator),
            None,
        )
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), runtime.fatal_error())
        .await
        .unwrap();
    assert!(matches!(err, StartupError::MultipleCoordinators { count: 2, .. }));

    runtime.shutdown().await;
}
