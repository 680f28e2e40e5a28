//! # Subsystem Container
//!
//! Configuration plus the container that boots and owns every peer,
//! locality service and background task of this process.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NodeConfig, NodeMode, NodeSettings};
pub use subsystems::{CoordinatorNode, StartupError, StorageNode, SubsystemContainer};
