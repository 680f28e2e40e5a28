//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** what replica placement calls
//!   (`PlacementTopology`)
//! - **Driven Ports (Outbound):** the directory, clock and membership view
//!   this subsystem consumes, all defined by `pc-01-membership`

pub mod inbound;
pub mod outbound;

pub use inbound::PlacementTopology;
pub use outbound::{AdvertisementDirectory, DiscoveryListener, MembershipApi, TimeSource};
