//! Coordinator-side merge of locality evidence into neighbor views.

use crate::domain::{LocalityConfig, LocalityError, MergeOutcome, NeighborMap, SetId, DEFAULT_DOMAIN};
use crate::ports::{AdvertisementDirectory, DiscoveryListener, MembershipApi, TimeSource};
use pc_01_membership::{
    Advertisement, ClusterEvent, DiscoveryQuery, DiscoveryResponse, EventListener,
    ListenerRegistry, PeerId,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Turns `LocalityEvidence` into per-peer neighbor sets.
///
/// Only evidence between two distinct current members is applied. After
/// each mutation, listeners hear `LocalityDomainChanged` for every peer
/// whose set changed, synchronously and while the engine's lock is held.
/// A peer pruned out of its own set is reported back in the default domain.
pub struct DomainMergeEngine {
    local: PeerId,
    membership: Arc<dyn MembershipApi>,
    directory: Arc<dyn AdvertisementDirectory>,
    time: Arc<dyn TimeSource>,
    config: LocalityConfig,
    neighbors: RwLock<NeighborMap>,
    listeners: ListenerRegistry,
    running: AtomicBool,
    me: Weak<DomainMergeEngine>,
}

impl DomainMergeEngine {
    /// `local` is the coordinator's id, used as the requester of evidence polls.
    pub fn new(
        local: PeerId,
        membership: Arc<dyn MembershipApi>,
        directory: Arc<dyn AdvertisementDirectory>,
        time: Arc<dyn TimeSource>,
        config: LocalityConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            local,
            membership,
            directory,
            time,
            config,
            neighbors: RwLock::new(NeighborMap::new()),
            listeners: ListenerRegistry::new(),
            running: AtomicBool::new(true),
            me: me.clone(),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.register(listener);
    }

    pub fn config(&self) -> &LocalityConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ignore further evidence and end the poll loop on its next tick.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("domain merge engine stopped");
        }
    }

    /// Apply one evidence pair. Returns `true` if any view changed.
    pub fn on_evidence(&self, a: &PeerId, b: &PeerId) -> bool {
        if !self.is_running() {
            return false;
        }
        if a == b {
            debug!(peer_id = %a, "dropping self-evidence");
            return false;
        }

        // Liveness is read under the view lock. A departure evicts first and
        // then waits here in `forget`, so it cannot slip between check and apply.
        let mut neighbors = self.neighbors.write();
        if !self.membership.is_alive(a) || !self.membership.is_alive(b) {
            debug!(local = %a, remote = %b, "dropping evidence for non-members");
            return false;
        }

        let now = self.time.now();
        let outcome = neighbors.apply(a, b, now, self.config.neighbor_expiry_ms);
        if outcome.is_empty() {
            return false;
        }
        debug!(
            local = %a,
            remote = %b,
            changed_sets = outcome.changed_sets.len(),
            released = outcome.released.len(),
            "neighbor views updated"
        );
        self.notify(&neighbors, &outcome);
        true
    }

    /// Drop a departed peer from every view.
    pub fn forget(&self, peer_id: &PeerId) {
        let mut neighbors = self.neighbors.write();
        let changed = neighbors.forget(peer_id);
        if changed.is_empty() {
            return;
        }
        debug!(peer_id = %peer_id, sets = changed.len(), "forgot departed peer");
        let outcome = MergeOutcome {
            changed_sets: changed,
            released: Vec::new(),
        };
        self.notify(&neighbors, &outcome);
    }

    /// Set id and members of `peer_id`'s view, if it has one.
    pub fn view_of(&self, peer_id: &PeerId) -> Option<(SetId, Vec<PeerId>)> {
        self.neighbors.read().view_of(peer_id)
    }

    pub fn num_views(&self) -> usize {
        self.neighbors.read().num_sets()
    }

    fn notify(&self, neighbors: &NeighborMap, outcome: &MergeOutcome) {
        for set in &outcome.changed_sets {
            let members = neighbors.members_of(*set);
            for peer_id in neighbors.peers_indexed_to(*set) {
                self.listeners.fire(&ClusterEvent::LocalityDomainChanged {
                    peer_id,
                    domain_id: set.to_string(),
                    members: members.clone(),
                });
            }
        }
        for peer_id in &outcome.released {
            info!(peer_id = %peer_id, "peer released to default domain");
            self.listeners.fire(&ClusterEvent::LocalityDomainChanged {
                peer_id: peer_id.clone(),
                domain_id: DEFAULT_DOMAIN.to_string(),
                members: Vec::new(),
            });
        }
    }

    /// Ask the directory for current evidence. Results come back through
    /// [`DiscoveryListener::on_discovery`].
    pub fn poll(&self) {
        if !self.is_running() {
            return;
        }
        let Some(listener) = self.me.upgrade() else {
            return;
        };
        let query = DiscoveryQuery::evidence(self.local.clone(), self.config.discovery_result_cap);
        if let Err(e) = self.directory.query_async(query, listener) {
            warn!(error = %e, "evidence poll failed");
        }
    }

    /// Poll immediately, then every `poll_interval`, until `shutdown` flips
    /// to `true` or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() && self.is_running() {
            tokio::select! {
                _ = ticker.tick() => self.poll(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.stop();
    }

    pub fn spawn(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, LocalityError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| LocalityError::NoRuntime)?;
        Ok(handle.spawn(Arc::clone(self).run(shutdown)))
    }
}

impl DiscoveryListener for DomainMergeEngine {
    fn on_discovery(&self, response: DiscoveryResponse) {
        for discovered in &response.advertisements {
            match &discovered.advertisement {
                Advertisement::LocalityEvidence { local, remote } => {
                    self.on_evidence(local, remote);
                }
                other => debug!(key = %other.key(), "merge engine ignoring non-evidence record"),
            }
        }
    }
}

impl std::fmt::Debug for DomainMergeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainMergeEngine")
            .field("local", &self.local)
            .field("views", &self.num_views())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
