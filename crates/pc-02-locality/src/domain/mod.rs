//! Domain Layer - Pure locality logic with no I/O
//!
//! - Domain ids, the default domain and `~id` selectors
//! - The broadcast-domain table with its distance metric
//! - Per-peer neighbor views built from locality evidence

pub mod config;
pub mod errors;
pub mod neighbors;
pub mod selector;
pub mod topology;

pub use config::*;
pub use errors::*;
pub use neighbors::*;
pub use selector::*;
pub use topology::*;
