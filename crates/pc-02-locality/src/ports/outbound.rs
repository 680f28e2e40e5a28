//! # Driven Ports (Outbound SPI)
//!
//! Locality reuses the membership subsystem's ports unchanged: evidence
//! travels through the same advertisement directory, and the merge engine
//! only trusts pairs the membership view currently reports alive.

pub use pc_01_membership::ports::{
    AdvertisementDirectory, DiscoveryListener, MembershipApi, TimeSource,
};
