//! Cross-crate flows: discovery, liveness, locality sensing, domain merge
//! and the topology seen by replica placement.

pub mod flows;
