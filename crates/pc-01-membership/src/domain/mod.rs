//! Domain Layer - Pure membership logic with no I/O
//!
//! - Peer ids, roles, endpoints and timestamps
//! - Advertisements, filters and discovery queries
//! - Identity derivation and certificates
//! - Membership table with the suspect/departure state machine

pub mod advertisement;
pub mod config;
pub mod entities;
pub mod errors;
pub mod events;
pub mod identity;
pub mod membership;

pub use advertisement::*;
pub use config::*;
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use identity::*;
pub use membership::*;
