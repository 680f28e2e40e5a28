//! # Node Runtime Library
//!
//! Exposes configuration, the subsystem container and the runtime for the
//! `node-runtime` binary and its tests.

pub mod container;
pub mod runtime;

pub use container::{ConfigError, NodeConfig, NodeMode, StartupError, SubsystemContainer};
pub use runtime::NodeRuntime;
