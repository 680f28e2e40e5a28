//! Storage-side locality sensing.

use crate::domain::{LocalityConfig, LocalityError};
use crate::ports::{AdvertisementDirectory, DiscoveryListener};
use pc_01_membership::{Advertisement, DiscoveryQuery, DiscoveryResponse, PeerId, PeerRole};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Overhears direct routes to other storage peers and publishes them as
/// `LocalityEvidence`.
///
/// Non-authoritative: publish failures are logged and the next round tries
/// again. A relay reaches everyone in one hop, so it never publishes.
pub struct LocalitySensor {
    local: PeerId,
    directory: Arc<dyn AdvertisementDirectory>,
    config: LocalityConfig,
    running: AtomicBool,
    me: Weak<LocalitySensor>,
}

impl LocalitySensor {
    pub fn new(
        local: PeerId,
        directory: Arc<dyn AdvertisementDirectory>,
        config: LocalityConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            local,
            directory,
            config,
            running: AtomicBool::new(true),
            me: me.clone(),
        })
    }

    pub fn local(&self) -> &PeerId {
        &self.local
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(peer_id = %self.local, "locality sensor stopped");
        }
    }

    /// One sensing round: query cluster-wide storage presence.
    pub fn sense_once(&self) {
        if !self.is_running() {
            return;
        }
        if self.config.is_relay {
            debug!(peer_id = %self.local, "relay host, skipping locality sensing");
            return;
        }
        let Some(listener) = self.me.upgrade() else {
            return;
        };
        let query = DiscoveryQuery::presence(
            self.local.clone(),
            PeerRole::Storage,
            self.config.discovery_result_cap,
        );
        if let Err(e) = self.directory.query_async(query, listener) {
            warn!(peer_id = %self.local, error = %e, "locality sensing query failed");
        }
    }

    fn publish_evidence(&self, remote: &PeerId) {
        let evidence = Advertisement::evidence(self.local.clone(), remote.clone());
        match self.directory.publish(evidence, Some(self.config.evidence_ttl())) {
            Ok(()) => debug!(local = %self.local, remote = %remote, "published locality evidence"),
            Err(e) => warn!(local = %self.local, remote = %remote, error = %e, "failed to publish locality evidence"),
        }
    }

    /// Sense immediately, then once per evidence lifetime, until `shutdown`
    /// flips to `true` or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.evidence_lifetime());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() && self.is_running() {
            tokio::select! {
                _ = ticker.tick() => self.sense_once(),
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

impl DiscoveryListener for LocalitySensor {
    fn on_discovery(&self, response: DiscoveryResponse) {
        if !self.is_running() || self.config.is_relay {
            return;
        }
        for discovered in &response.advertisements {
            let Advertisement::PeerPresence { peer_id, role } = &discovered.advertisement else {
                continue;
            };
            if peer_id == &self.local || *role != PeerRole::Storage {
                continue;
            }
            if discovered.has_direct_route() {
                self.publish_evidence(peer_id);
            }
        }
    }
}

impl std::fmt::Debug for LocalitySensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalitySensor")
            .field("local", &self.local)
            .field("is_relay", &self.config.is_relay)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
