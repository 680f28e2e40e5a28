use crate::domain::{MembershipConfig, PeerId, PeerIdentity, PeerRole};

/// Immutable per-process peer context.
///
/// Created exactly once by [`super::Peer::initialize`] and shared read-only
/// with every component afterwards.
#[derive(Debug)]
pub struct PeerContext {
    identity: PeerIdentity,
    config: MembershipConfig,
}

impl PeerContext {
    pub fn new(identity: PeerIdentity, config: MembershipConfig) -> Self {
        Self { identity, config }
    }

    pub fn peer_id(&self) -> &PeerId {
        self.identity.peer_id()
    }

    pub fn role(&self) -> PeerRole {
        self.identity.role()
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }
}
