//! Service Layer - wires the membership domain to the directory port.
//!
//! - `Peer` - identity, membership table, endpoints, listeners
//! - `DiscoveryHandler` - dispatches discovery responses
//! - `LivenessMonitor` - periodic sweep with bounded retries
//! - `CoordinatorPeer` / `StoragePeer` - role behavior

mod context;
mod discovery;
mod listeners;
mod monitor;
mod peer;
mod roles;

pub use context::PeerContext;
pub use discovery::{AdmissionPolicy, DiscoveryHandler};
pub use listeners::ListenerRegistry;
pub use monitor::LivenessMonitor;
pub use peer::Peer;
pub use roles::{CoordinatorPeer, PeerBehavior, StoragePeer};
