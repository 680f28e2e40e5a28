//! Periodic liveness sweep.

use super::peer::Peer;
use crate::domain::{
    AdvertisementFilter, AdvertisementKind, ClusterEvent, DiscoveryQuery, MembershipError,
    PeerRole, SweepOutcome,
};
use crate::ports::DiscoveryListener;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Heartbeat failure detector with a bounded retry budget.
///
/// Each sweep ages suspects, fires departures, probes every member and then
/// issues cluster-wide storage and coordinator presence queries before
/// republishing presence. A coordinator that shows up late still trips
/// [`Peer::misconfigured`].
/// Probe answers reach `handler`, which clears suspects.
pub struct LivenessMonitor {
    peer: Arc<Peer>,
    handler: Arc<dyn DiscoveryListener>,
}

impl LivenessMonitor {
    pub fn new(peer: Arc<Peer>, handler: Arc<dyn DiscoveryListener>) -> Self {
        Self { peer, handler }
    }

    /// Run a single sweep. Does nothing unless the peer is running.
    pub fn sweep_once(&self) -> SweepOutcome {
        if !self.peer.is_running() {
            return SweepOutcome::default();
        }
        let Ok(ctx) = self.peer.context() else {
            return SweepOutcome::default();
        };
        let local = ctx.peer_id().clone();

        // Lock is released here; the directory may call back synchronously.
        let outcome = self.peer.sweep_membership();

        for departed in &outcome.departed {
            let filter = AdvertisementFilter::kind(AdvertisementKind::PeerPresence)
                .with_owner(departed.clone());
            if let Err(e) = self.peer.directory().flush_local(&filter) {
                warn!(peer_id = %departed, error = %e, "failed to flush departed peer's presence");
            }
            info!(
                peer_id = %departed,
                retry_limit = ctx.config().retry_limit,
                "peer departed after missing liveness probes"
            );
            self.peer.listeners().fire(&ClusterEvent::PeerDeparted {
                peer_id: departed.clone(),
            });
        }

        for target in &outcome.probes {
            self.peer.request_advertisements(
                DiscoveryQuery::probe(local.clone(), target.clone(), PeerRole::Storage),
                Arc::clone(&self.handler),
            );
        }

        let cap = ctx.config().discovery_result_cap;
        self.peer.request_advertisements(
            DiscoveryQuery::presence(local.clone(), PeerRole::Storage, cap),
            Arc::clone(&self.handler),
        );
        self.peer.request_advertisements(
            DiscoveryQuery::presence(local, PeerRole::Coordinator, cap),
            Arc::clone(&self.handler),
        );

        if let Err(e) = self.peer.republish() {
            warn!(error = %e, "failed to republish presence");
        }

        debug!(
            departed = outcome.departed.len(),
            probes = outcome.probes.len(),
            "liveness sweep complete"
        );
        outcome
    }

    /// Sweep every interval until `shutdown` flips to `true` or its sender drops.
    ///
    /// The first sweep happens one interval after start. The peer is
    /// stopped on exit so late callbacks are ignored.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.peer.config().sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.peer.shutdown();
        info!("liveness monitor stopped");
    }

    /// Spawn [`Self::run`] on the current tokio runtime.
    pub fn spawn(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, MembershipError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| MembershipError::NoRuntime)?;
        Ok(handle.spawn(Arc::clone(self).run(shutdown)))
    }
}
