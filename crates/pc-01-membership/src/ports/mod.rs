//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** what replica placement and other
//!   consumers call (`MembershipApi`, `EventListener`)
//! - **Driven Ports (Outbound):** what this subsystem requires from the
//!   overlay transport and the host (`AdvertisementDirectory`,
//!   `DiscoveryListener`, `IdentityStore`, `ConfigProvider`, `TimeSource`)

pub mod inbound;
pub mod outbound;

pub use inbound::{EventListener, MembershipApi};
pub use outbound::{
    AdvertisementDirectory, ConfigProvider, DiscoveryListener, IdentityStore, TimeSource,
};
