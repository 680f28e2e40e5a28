//! # Locality Subsystem
//!
//! Infers which storage peers share a broadcast domain and keeps a
//! topology that replica placement can query.
//!
//! Storage peers run a [`LocalitySensor`] that publishes `LocalityEvidence`
//! whenever a discovery answer arrives over a zero-hop route. The
//! coordinator's [`DomainMergeEngine`] folds that evidence into per-peer
//! neighbor views, and a [`TopologyBinding`] mirrors membership and view
//! changes into the [`BroadcastTopology`].
//!
//! ## Architecture
//!
//! - **Domain Layer:** domain table, distance metric, selectors, neighbor views
//! - **Ports Layer:** `PlacementTopology`; directory and membership ports
//!   come from `pc-01-membership`
//! - **Service Layer:** sensor, merge engine, topology, binding
//! - **Adapters Layer:** `[locality]` TOML section
//!
//! ## Example
//!
//! ```rust
//! use pc_01_membership::{PeerId, Timestamp};
//! use pc_02_locality::{DomainSelector, DomainTable};
//!
//! let mut table = DomainTable::new();
//! let now = Timestamp::from_millis(0);
//! table.add(&PeerId::new("a"), "0", now);
//! table.add(&PeerId::new("c"), "7", now);
//!
//! let remote = DomainSelector::parse("~0").unwrap();
//! let pick = table.choose_random(&remote, &mut rand::thread_rng());
//! assert_eq!(pick, Some(PeerId::new("c")));
//! assert_eq!(table.distance(&PeerId::new("a"), &PeerId::new("c")), 2);
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// PUBLIC API RE-EXPORTS
// =============================================================================

#[cfg(feature = "network")]
pub use adapters::TomlLocalityConfig;
pub use domain::{
    normalize_domain_id, AddOutcome, BroadcastDomain, DomainSelector, DomainSnapshot, DomainTable,
    LocalityConfig, LocalityError, MemberSnapshot, MergeOutcome, NeighborMap, SetId,
    TopologySnapshot, TopologyStats, DEFAULT_DOMAIN, DEFAULT_EVIDENCE_LIFETIME_MS,
};
pub use ports::PlacementTopology;
pub use service::{BroadcastTopology, DomainMergeEngine, LocalitySensor, TopologyBinding};
