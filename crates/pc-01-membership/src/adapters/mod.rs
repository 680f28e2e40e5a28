//! Adapters: concrete implementations of the outbound ports.
//!
//! - `InMemoryDirectory` - in-process advertisement directory with TTLs and route hints
//! - `FileIdentityStore` / `EphemeralIdentityStore` - identity bootstrap
//! - `StaticConfigProvider` / `TomlConfigProvider` - configuration
//! - `SystemTimeSource` - wall clock

pub mod config;
pub mod directory;
pub mod identity;
pub mod time;

pub use config::StaticConfigProvider;
#[cfg(feature = "network")]
pub use config::TomlConfigProvider;
pub use directory::{DeliveryMode, InMemoryDirectory};
pub use identity::{EphemeralIdentityStore, FileIdentityStore};
pub use time::SystemTimeSource;
