//! Adapters: configuration loading for the locality subsystem.
//!
//! The directory, clock and identity adapters are shared with
//! `pc-01-membership`.

#[cfg(feature = "network")]
pub mod config;

#[cfg(feature = "network")]
pub use config::TomlLocalityConfig;
