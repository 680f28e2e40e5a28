//! # Driving Ports (Inbound API)
//!
//! What the rest of the storage system calls on a running peer.

use crate::domain::{ClusterEvent, Endpoint, MembershipError, PeerId};

/// Liveness and addressing queries used by replica placement.
///
/// # Example
///
/// ```rust,ignore
/// use pc_01_membership::ports::MembershipApi;
///
/// fn pick_target<M: MembershipApi>(api: &M, candidate: &PeerId) -> Option<Endpoint> {
///     api.is_alive(candidate).then(|| api.resolve_endpoint(candidate).ok()).flatten()
/// }
/// ```
pub trait MembershipApi: Send + Sync {
    /// True if `peer_id` is currently a member.
    fn is_alive(&self, peer_id: &PeerId) -> bool;

    /// Resolved RPC endpoint of a member.
    ///
    /// # Errors
    ///
    /// - `PeerNotFound` if the peer is not a member
    /// - `EndpointUnresolved` if it is a member whose endpoint has not been discovered yet
    fn resolve_endpoint(&self, peer_id: &PeerId) -> Result<Endpoint, MembershipError>;

    /// Snapshot of current member ids.
    fn members(&self) -> Vec<PeerId>;
}

/// Receiver of cluster events.
///
/// Called synchronously from whichever task raised the event, possibly
/// while the raiser holds its own lock. Implementations must not call
/// back into the raiser.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ClusterEvent);
}
