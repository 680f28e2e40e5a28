//! # Subsystem Container
//!
//! Builds and owns the peers, locality services and topology of one node.
//! In demo mode the container hosts a whole cluster on a shared in-process
//! directory and stands in for the rendezvous by attaching each storage
//! peer to the coordinator once it has booted.
//!
//! Coordinator and storage modes only make sense on a directory the rest
//! of the cluster also reaches, so they refuse to start on the private
//! in-process one. Inject the shared directory with
//! [`SubsystemContainer::with_directory`].

use super::config::{NodeConfig, NodeMode};
use pc_01_membership::adapters::{
    DeliveryMode, EphemeralIdentityStore, FileIdentityStore, InMemoryDirectory, SystemTimeSource,
};
use pc_01_membership::{
    derive_peer_id, AdvertisementDirectory, CoordinatorPeer, IdentityStore, MembershipError, Peer,
    PeerBehavior, PeerId, PeerRole, RendezvousEvent, StoragePeer, TimeSource,
};
use pc_02_locality::{
    BroadcastTopology, DomainMergeEngine, LocalityError, LocalitySensor, TopologyBinding,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Hop count between demo peers on different sites.
const CROSS_SITE_HOPS: u32 = 2;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("membership: {0}")]
    Membership(#[from] MembershipError),

    #[error("locality: {0}")]
    Locality(#[from] LocalityError),

    #[error("{mode} mode needs a directory shared with the rest of the cluster")]
    IsolatedDirectory { mode: NodeMode },

    #[error("peer {peer_id} sees {count} coordinators; a cluster has exactly one")]
    MultipleCoordinators { peer_id: PeerId, count: usize },
}

/// Coordinator side: peer, merge engine and the topology it feeds.
pub struct CoordinatorNode {
    pub peer: Arc<CoordinatorPeer>,
    pub engine: Arc<DomainMergeEngine>,
    pub topology: Arc<BroadcastTopology>,
}

/// Storage side: peer plus its locality sensor.
pub struct StorageNode {
    pub peer: Arc<StoragePeer>,
    pub sensor: Arc<LocalitySensor>,
}

impl StorageNode {
    pub fn peer_id(&self) -> Option<PeerId> {
        self.peer.peer().peer_id().cloned()
    }
}

/// Every running component of this process.
pub struct SubsystemContainer {
    config: NodeConfig,
    time: Arc<dyn TimeSource>,
    directory: Arc<dyn AdvertisementDirectory>,
    /// Set when the container built its own directory instead of being handed one.
    in_process: Option<Arc<InMemoryDirectory>>,
    coordinator: Option<CoordinatorNode>,
    storage: Vec<StorageNode>,
    tasks: Vec<JoinHandle<()>>,
}

impl SubsystemContainer {
    /// Container on a private in-process directory. Only demo mode starts on it.
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource::new());
        let directory = Arc::new(InMemoryDirectory::with_delivery(
            Arc::clone(&time),
            DeliveryMode::Spawned,
        ));
        let mut container = Self::build(config, time, directory.clone());
        container.in_process = Some(directory);
        container
    }

    /// Container on a directory shared with other nodes.
    #[must_use]
    pub fn with_directory(config: NodeConfig, directory: Arc<dyn AdvertisementDirectory>) -> Self {
        Self::build(config, Arc::new(SystemTimeSource::new()), directory)
    }

    fn build(
        config: NodeConfig,
        time: Arc<dyn TimeSource>,
        directory: Arc<dyn AdvertisementDirectory>,
    ) -> Self {
        Self {
            config,
            time,
            directory,
            in_process: None,
            coordinator: None,
            storage: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<dyn AdvertisementDirectory> {
        &self.directory
    }

    /// The private directory built by [`Self::new`], if any.
    pub fn in_process_directory(&self) -> Option<&Arc<InMemoryDirectory>> {
        self.in_process.as_ref()
    }

    pub fn coordinator(&self) -> Option<&CoordinatorNode> {
        self.coordinator.as_ref()
    }

    pub fn storage(&self) -> &[StorageNode] {
        &self.storage
    }

    pub fn topology(&self) -> Option<&Arc<BroadcastTopology>> {
        self.coordinator.as_ref().map(|c| &c.topology)
    }

    /// Every peer hosted by this container, coordinator first.
    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.coordinator
            .iter()
            .map(|c| Arc::clone(c.peer.peer()))
            .chain(self.storage.iter().map(|s| Arc::clone(s.peer.peer())))
            .collect()
    }

    /// Boot every component for the configured mode. Must run inside a tokio runtime.
    pub fn start(&mut self, shutdown: &watch::Receiver<bool>) -> Result<(), StartupError> {
        let mode = self.config.node.mode;
        if mode != NodeMode::Demo && self.in_process.is_some() {
            error!(mode = %mode, "refusing to start on a private directory");
            return Err(StartupError::IsolatedDirectory { mode });
        }
        info!(mode = %mode, "starting subsystems");
        match mode {
            NodeMode::Coordinator => {
                let store = self.file_identity_store();
                self.start_coordinator(store, shutdown)?;
            }
            NodeMode::Storage => {
                let store = self.file_identity_store();
                let seed = self.config.identity.seed.clone();
                self.start_storage(&seed, store, shutdown)?;
            }
            NodeMode::Demo => self.start_demo(shutdown)?,
        }
        Ok(())
    }

    fn file_identity_store(&self) -> Arc<dyn IdentityStore> {
        Arc::new(FileIdentityStore::new(&self.config.identity))
    }

    fn new_peer(&self, role: PeerRole, seed: &str, store: Arc<dyn IdentityStore>) -> Arc<Peer> {
        Arc::new(Peer::new(
            role,
            seed,
            self.config.membership.clone(),
            self.directory.clone(),
            store,
        ))
    }

    fn start_coordinator(
        &mut self,
        store: Arc<dyn IdentityStore>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<(), StartupError> {
        let seed = match self.config.node.mode {
            NodeMode::Demo => "coordinator".to_string(),
            _ => self.config.identity.seed.clone(),
        };
        let peer = self.new_peer(PeerRole::Coordinator, &seed, store);
        let coordinator = Arc::new(CoordinatorPeer::new(Arc::clone(&peer), shutdown.clone()));
        let ctx = peer.initialize()?;

        let topology = Arc::new(BroadcastTopology::new(Arc::clone(&self.time)));
        let engine = DomainMergeEngine::new(
            ctx.peer_id().clone(),
            peer.clone(),
            self.directory.clone(),
            Arc::clone(&self.time),
            self.config.locality.clone(),
        );
        let binding = Arc::new(TopologyBinding::new(Arc::clone(&topology)).with_engine(&engine));
        peer.add_listener(binding.clone());
        engine.add_listener(binding);

        coordinator.boot()?;
        self.tasks.extend(coordinator.take_monitor_task());
        self.tasks.push(engine.spawn(shutdown.clone())?);

        self.coordinator = Some(CoordinatorNode {
            peer: coordinator,
            engine,
            topology,
        });
        Ok(())
    }

    fn start_storage(
        &mut self,
        seed: &str,
        store: Arc<dyn IdentityStore>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<PeerId, StartupError> {
        let peer = self.new_peer(PeerRole::Storage, seed, store);
        let storage = Arc::new(StoragePeer::new(
            Arc::clone(&peer),
            shutdown.clone(),
        ));
        storage.boot()?;
        let ctx = peer.context()?;
        let peer_id = ctx.peer_id().clone();

        let sensor = LocalitySensor::new(
            peer_id.clone(),
            self.directory.clone(),
            self.config.locality.clone(),
        );
        self.tasks.extend(storage.take_monitor_task());
        self.tasks.push(sensor.spawn(shutdown.clone())?);

        self.storage.push(StorageNode {
            peer: storage,
            sensor,
        });
        Ok(peer_id)
    }

    /// Coordinator plus `demo_storage_peers` storage peers, spread
    /// round-robin over `demo_sites` sites. Peers on one site reach each
    /// other directly; other pairs are relayed.
    fn start_demo(&mut self, shutdown: &watch::Receiver<bool>) -> Result<(), StartupError> {
        let login = self.config.identity.effective_login_name();
        let peers = self.config.node.demo_storage_peers;
        let sites = self.config.node.demo_sites.max(1);

        let seeds: Vec<String> = (0..peers).map(demo_seed).collect();
        // An injected directory brings its own routes.
        if let Some(directory) = &self.in_process {
            let ids: Vec<PeerId> = seeds.iter().map(|seed| derive_peer_id(&login, seed)).collect();
            for (i, a) in ids.iter().enumerate() {
                for (j, b) in ids.iter().enumerate().skip(i + 1) {
                    let hops = if i % sites == j % sites { 0 } else { CROSS_SITE_HOPS };
                    directory.set_route(a, b, hops);
                }
            }
        }

        self.start_coordinator(Arc::new(EphemeralIdentityStore::new(login.clone())), shutdown)?;
        for seed in &seeds {
            let peer_id =
                self.start_storage(seed, Arc::new(EphemeralIdentityStore::new(login.clone())), shutdown)?;
            if let Some(coordinator) = &self.coordinator {
                coordinator
                    .peer
                    .on_rendezvous_event(RendezvousEvent::Attached(peer_id));
            }
        }
        info!(peers, sites, "demo cluster started");
        Ok(())
    }

    /// Hand over every spawned background task.
    pub fn take_tasks(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.tasks)
    }
}

/// Fails if any peer has seen more than one coordinator.
pub fn check_coordinators(peers: &[Arc<Peer>]) -> Result<(), StartupError> {
    for peer in peers {
        if !peer.misconfigured() {
            continue;
        }
        if let Some(peer_id) = peer.peer_id() {
            return Err(StartupError::MultipleCoordinators {
                peer_id: peer_id.clone(),
                count: peer.coordinators().len(),
            });
        }
    }
    Ok(())
}

/// Seed of the `index`th demo storage peer.
pub fn demo_seed(index: usize) -> String {
    format!("storage-{index}")
}
