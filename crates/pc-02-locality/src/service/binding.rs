//! Keeps the topology in step with membership and locality events.

use super::merge::DomainMergeEngine;
use super::topology::BroadcastTopology;
use crate::domain::DEFAULT_DOMAIN;
use pc_01_membership::{ClusterEvent, EventListener};
use std::sync::{Arc, Weak};

/// Event listener that feeds a [`BroadcastTopology`].
///
/// - `PeerJoined` places the peer in the default domain
/// - `LocalityDomainChanged` moves it to the reported domain
/// - `PeerDeparted` forgets it in the bound engine, then removes it
///
/// Register it on the peer and on the merge engine.
pub struct TopologyBinding {
    topology: Arc<BroadcastTopology>,
    engine: Option<Weak<DomainMergeEngine>>,
}

impl TopologyBinding {
    #[must_use]
    pub fn new(topology: Arc<BroadcastTopology>) -> Self {
        Self {
            topology,
            engine: None,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: &Arc<DomainMergeEngine>) -> Self {
        self.engine = Some(Arc::downgrade(engine));
        self
    }

    pub fn topology(&self) -> &Arc<BroadcastTopology> {
        &self.topology
    }
}

impl EventListener for TopologyBinding {
    fn on_event(&self, event: &ClusterEvent) {
        match event {
            ClusterEvent::PeerJoined { peer_id } => {
                self.topology.add(peer_id, DEFAULT_DOMAIN);
            }
            ClusterEvent::LocalityDomainChanged { peer_id, domain_id, .. } => {
                self.topology.add(peer_id, domain_id);
            }
            ClusterEvent::PeerDeparted { peer_id } => {
                // Forget first: evidence applied before the eviction lands
                // in the topology before the removal below.
                if let Some(engine) = self.engine.as_ref().and_then(Weak::upgrade) {
                    engine.forget(peer_id);
                }
                self.topology.remove(peer_id);
            }
        }
    }
}
