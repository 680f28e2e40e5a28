//! Discovery response dispatch.
//!
//! Responses may arrive on any thread, out of order, duplicated, or after
//! shutdown. Every branch here is idempotent.

use super::peer::Peer;
use crate::domain::{
    Advertisement, DiscoveredAdvertisement, DiscoveryQuery, DiscoveryResponse, PeerId, PeerRole,
    ServiceName,
};
use crate::ports::DiscoveryListener;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};

/// How discovered storage peers are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Membership comes from the rendezvous only (coordinator).
    RendezvousOnly,
    /// Storage presence seen in discovery joins membership (storage peers).
    AdmitDiscovered,
}

/// Dispatches discovery responses by advertisement kind.
pub struct DiscoveryHandler {
    peer: Arc<Peer>,
    policy: AdmissionPolicy,
    me: Weak<DiscoveryHandler>,
}

impl DiscoveryHandler {
    pub fn new(peer: Arc<Peer>, policy: AdmissionPolicy) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            peer,
            policy,
            me: me.clone(),
        })
    }

    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    fn as_listener(&self) -> Option<Arc<dyn DiscoveryListener>> {
        self.me
            .upgrade()
            .map(|handler| handler as Arc<dyn DiscoveryListener>)
    }

    /// Follow-up lookup of `target`'s RPC endpoint.
    fn resolve_rpc(&self, requester: &PeerId, target: PeerId) {
        if let Some(listener) = self.as_listener() {
            self.peer.request_advertisements(
                DiscoveryQuery::endpoint(requester.clone(), target, ServiceName::Rpc),
                listener,
            );
        }
    }

    fn handle(&self, local: &PeerId, discovered: &DiscoveredAdvertisement) {
        match &discovered.advertisement {
            Advertisement::PeerPresence { peer_id, .. } if peer_id == local => {}
            Advertisement::PeerPresence { peer_id, role } => {
                self.peer.confirm(peer_id);
                self.on_presence(local, peer_id, *role);
            }
            adv @ Advertisement::ServiceEndpoint { service, name, .. } => {
                if *service != ServiceName::Rpc || name != service.well_known_name() {
                    debug!(key = %adv.key(), "ignoring non-RPC endpoint advertisement");
                    return;
                }
                self.on_rpc_endpoint(adv);
            }
            adv @ Advertisement::LocalityEvidence { .. } => {
                debug!(key = %adv.key(), "locality evidence is not handled by membership");
            }
        }
    }

    fn on_presence(&self, local: &PeerId, peer_id: &PeerId, role: PeerRole) {
        match role {
            PeerRole::Coordinator => match self.peer.record_coordinator(peer_id.clone()) {
                Ok(true) => {
                    info!(coordinator = %peer_id, "coordinator discovered");
                    self.resolve_rpc(local, peer_id.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    error!(error = %e, "FATAL: only one coordinator is supported per cluster");
                }
            },
            PeerRole::Storage => {
                let admitted = self.policy == AdmissionPolicy::AdmitDiscovered
                    && self.peer.admit(peer_id.clone());
                if admitted || self.peer.needs_endpoint(peer_id) {
                    self.resolve_rpc(local, peer_id.clone());
                }
            }
            PeerRole::Client | PeerRole::Discovery => {
                debug!(peer_id = %peer_id, role = %role, "ignoring presence of non-member role");
            }
        }
    }

    fn on_rpc_endpoint(&self, adv: &Advertisement) {
        let Some(endpoint) = adv.as_endpoint() else {
            return;
        };
        let owner = endpoint.peer_id.clone();
        if self.peer.coordinators().contains(&owner) {
            if self.peer.bind_coordinator_endpoint(endpoint) {
                info!(coordinator = %owner, "coordinator RPC endpoint bound");
            }
        } else if self.peer.bind_endpoint(endpoint) {
            debug!(peer_id = %owner, "member RPC endpoint bound");
        } else {
            debug!(peer_id = %owner, "endpoint for unknown peer dropped");
        }
    }
}

impl DiscoveryListener for DiscoveryHandler {
    fn on_discovery(&self, response: DiscoveryResponse) {
        if !self.peer.is_running() {
            debug!("discovery response after shutdown ignored");
            return;
        }
        let Some(local) = self.peer.peer_id().cloned() else {
            return;
        };
        for discovered in &response.advertisements {
            self.handle(&local, discovered);
        }
    }
}
