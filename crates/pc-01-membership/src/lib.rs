//! # Cluster Membership Subsystem
//!
//! Peer identity, advertisement discovery and failure detection for the
//! PeerCloud storage cluster. Nodes never know each other's addresses up
//! front: they publish presence and endpoint advertisements into a shared
//! directory and find each other by querying it.
//!
//! ## Architecture
//!
//! Hexagonal, as in every PeerCloud crate:
//! - **Domain Layer:** advertisements, identity derivation, membership table
//!   and its suspect/departure state machine
//! - **Ports Layer:** `AdvertisementDirectory`, `IdentityStore`,
//!   `DiscoveryListener`, `EventListener`, `MembershipApi`
//! - **Service Layer:** `Peer`, role peers, discovery dispatch, liveness monitor
//! - **Adapters Layer:** in-memory directory, file identity store, config, clock
//!
//! ## Example
//!
//! ```rust
//! use pc_01_membership::{MembershipTable, PeerId};
//!
//! let mut table = MembershipTable::new();
//! table.insert(PeerId::new("storage-1"));
//!
//! // A peer that never answers departs on sweep retry_limit + 1.
//! for _ in 0..3 {
//!     assert!(table.sweep(3).departed.is_empty());
//! }
//! assert_eq!(table.sweep(3).departed, vec![PeerId::new("storage-1")]);
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Test utilities (clocks, recording listeners).
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// PUBLIC API RE-EXPORTS
// =============================================================================

pub use domain::{
    derive_peer_id, Advertisement, AdvertisementFilter, AdvertisementKind, Certificate,
    ClusterEvent, ConfigError, DirectoryError, DiscoveredAdvertisement, DiscoveryQuery,
    DiscoveryResponse, Endpoint, IdentityConfig, LivenessState, MembershipConfig,
    MembershipError, MembershipTable, PeerId, PeerIdentity, PeerRole, RendezvousEvent, RouteHint,
    ServiceName, SweepOutcome, Timestamp,
};
pub use ports::{
    AdvertisementDirectory, ConfigProvider, DiscoveryListener, EventListener, IdentityStore,
    MembershipApi, TimeSource,
};
pub use service::{
    AdmissionPolicy, CoordinatorPeer, DiscoveryHandler, ListenerRegistry, LivenessMonitor, Peer,
    PeerBehavior, PeerContext, StoragePeer,
};
