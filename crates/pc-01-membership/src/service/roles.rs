//! Role-specific behavior on top of [`Peer`].

use super::discovery::{AdmissionPolicy, DiscoveryHandler};
use super::monitor::LivenessMonitor;
use super::peer::Peer;
use crate::domain::{DiscoveryQuery, MembershipError, PeerRole, RendezvousEvent, ServiceName};
use crate::ports::DiscoveryListener;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Template for role peers: initialize, then transport, then start.
///
/// Both hooks do nothing by default.
pub trait PeerBehavior: Send + Sync {
    fn peer(&self) -> &Arc<Peer>;

    fn setup_transport(&self) -> Result<(), MembershipError> {
        Ok(())
    }

    fn start(&self) -> Result<(), MembershipError> {
        Ok(())
    }

    /// Run the full boot sequence. Stops at the first error.
    fn boot(&self) -> Result<(), MembershipError> {
        self.peer().initialize()?;
        self.setup_transport()?;
        self.start()
    }
}

/// Spawned monitor task shared by both roles.
struct MonitorSlot {
    monitor: Arc<LivenessMonitor>,
    shutdown: watch::Receiver<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorSlot {
    fn new(monitor: LivenessMonitor, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            monitor: Arc::new(monitor),
            shutdown,
            task: Mutex::new(None),
        }
    }

    fn spawn(&self) -> Result<(), MembershipError> {
        let mut task = self.task.lock();
        if task.is_none() {
            *task = Some(self.monitor.spawn(self.shutdown.clone())?);
        }
        Ok(())
    }

    fn take(&self) -> Option<JoinHandle<()>> {
        self.task.lock().take()
    }
}

// =============================================================================
// CoordinatorPeer
// =============================================================================

/// The single namespace coordinator.
///
/// Membership is driven by rendezvous attach/detach; liveness by the
/// monitor. Its RPC endpoint is published without expiration.
pub struct CoordinatorPeer {
    peer: Arc<Peer>,
    handler: Arc<DiscoveryHandler>,
    slot: MonitorSlot,
}

impl CoordinatorPeer {
    pub fn new(peer: Arc<Peer>, shutdown: watch::Receiver<bool>) -> Self {
        let handler = DiscoveryHandler::new(Arc::clone(&peer), AdmissionPolicy::RendezvousOnly);
        let monitor = LivenessMonitor::new(
            Arc::clone(&peer),
            Arc::clone(&handler) as Arc<dyn DiscoveryListener>,
        );
        Self {
            peer,
            handler,
            slot: MonitorSlot::new(monitor, shutdown),
        }
    }

    pub fn monitor(&self) -> &Arc<LivenessMonitor> {
        &self.slot.monitor
    }

    pub fn discovery_handler(&self) -> &Arc<DiscoveryHandler> {
        &self.handler
    }

    /// Hand the spawned monitor task to the caller (for joining on shutdown).
    pub fn take_monitor_task(&self) -> Option<JoinHandle<()>> {
        self.slot.take()
    }

    /// Apply a rendezvous notification to membership.
    pub fn on_rendezvous_event(&self, event: RendezvousEvent) {
        match event {
            RendezvousEvent::Attached(peer_id) | RendezvousEvent::Reattached(peer_id) => {
                self.peer.admit(peer_id);
            }
            RendezvousEvent::Detached(peer_id) | RendezvousEvent::Failed(peer_id) => {
                self.peer.evict(&peer_id);
            }
            RendezvousEvent::Unrecognized { kind, peer_id } => {
                warn!(kind = %kind, peer_id = %peer_id, "unhandled rendezvous event");
            }
        }
    }
}

impl PeerBehavior for CoordinatorPeer {
    fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    fn start(&self) -> Result<(), MembershipError> {
        self.peer.context()?;
        self.peer.pin_endpoint(ServiceName::Rpc)?;
        self.slot.spawn()?;
        info!(peer_id = ?self.peer.peer_id(), "coordinator started");
        Ok(())
    }
}

// =============================================================================
// StoragePeer
// =============================================================================

/// A storage node. Finds the coordinator and its fellow storage peers
/// through discovery.
pub struct StoragePeer {
    peer: Arc<Peer>,
    handler: Arc<DiscoveryHandler>,
    slot: MonitorSlot,
}

impl StoragePeer {
    pub fn new(peer: Arc<Peer>, shutdown: watch::Receiver<bool>) -> Self {
        let handler = DiscoveryHandler::new(Arc::clone(&peer), AdmissionPolicy::AdmitDiscovered);
        let monitor = LivenessMonitor::new(
            Arc::clone(&peer),
            Arc::clone(&handler) as Arc<dyn DiscoveryListener>,
        );
        Self {
            peer,
            handler,
            slot: MonitorSlot::new(monitor, shutdown),
        }
    }

    pub fn monitor(&self) -> &Arc<LivenessMonitor> {
        &self.slot.monitor
    }

    pub fn discovery_handler(&self) -> &Arc<DiscoveryHandler> {
        &self.handler
    }

    pub fn take_monitor_task(&self) -> Option<JoinHandle<()>> {
        self.slot.take()
    }

    /// Look up the coordinator and every storage peer.
    pub fn discover_cluster(&self) -> Result<(), MembershipError> {
        let ctx = self.peer.context()?;
        let local = ctx.peer_id().clone();
        let listener = Arc::clone(&self.handler) as Arc<dyn DiscoveryListener>;
        // Every coordinator record, so a second one is noticed.
        self.peer.request_advertisements(
            DiscoveryQuery::presence(
                local.clone(),
                PeerRole::Coordinator,
                ctx.config().discovery_result_cap,
            ),
            Arc::clone(&listener),
        );
        self.peer.request_advertisements(
            DiscoveryQuery::presence(local, PeerRole::Storage, ctx.config().discovery_result_cap),
            listener,
        );
        Ok(())
    }
}

impl PeerBehavior for StoragePeer {
    fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    fn start(&self) -> Result<(), MembershipError> {
        self.discover_cluster()?;
        self.slot.spawn()?;
        info!(peer_id = ?self.peer.peer_id(), "storage peer started");
        Ok(())
    }
}
