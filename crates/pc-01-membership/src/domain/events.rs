//! Cluster events raised to registered listeners.

use super::entities::PeerId;

/// Advisory membership and locality signals.
///
/// Departures are best-effort: a departed peer may still be reachable, so
/// consumers re-resolve before treating an endpoint as gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    /// First sighting of a peer (rendezvous attach or discovery).
    PeerJoined { peer_id: PeerId },
    /// The peer exceeded its retry budget or detached from the rendezvous.
    PeerDeparted { peer_id: PeerId },
    /// The recorded neighbor set of `peer_id` changed.
    LocalityDomainChanged {
        peer_id: PeerId,
        domain_id: String,
        members: Vec<PeerId>,
    },
}

impl ClusterEvent {
    /// The peer the event is about.
    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::PeerJoined { peer_id }
            | Self::PeerDeparted { peer_id }
            | Self::LocalityDomainChanged { peer_id, .. } => peer_id,
        }
    }
}

/// Client attach/detach notifications from the coordinator's rendezvous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendezvousEvent {
    Attached(PeerId),
    Reattached(PeerId),
    Detached(PeerId),
    Failed(PeerId),
    /// Any kind this subsystem does not act on.
    Unrecognized { kind: String, peer_id: PeerId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_peer_id_accessor() {
        let event = ClusterEvent::LocalityDomainChanged {
            peer_id: PeerId::new("a"),
            domain_id: "1".into(),
            members: vec![PeerId::new("a"), PeerId::new("b")],
        };
        assert_eq!(event.peer_id(), &PeerId::new("a"));
    }
}
