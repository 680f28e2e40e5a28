//! Service Layer - locality sensing, merging and the shared topology.
//!
//! - `LocalitySensor` - publishes evidence for zero-hop routes (storage side)
//! - `DomainMergeEngine` - folds evidence into neighbor views (coordinator side)
//! - `BroadcastTopology` - lock-guarded domain table used by placement
//! - `TopologyBinding` - event listener keeping the topology current

mod binding;
mod merge;
mod sensor;
mod topology;

pub use binding::TopologyBinding;
pub use merge::DomainMergeEngine;
pub use sensor::LocalitySensor;
pub use topology::BroadcastTopology;
