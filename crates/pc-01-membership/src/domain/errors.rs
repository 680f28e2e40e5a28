//! Error types for the membership subsystem.

use super::entities::PeerId;
use thiserror::Error;

/// Transient failures reported by an advertisement directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("advertisement directory unreachable")]
    Unreachable,

    #[error("directory rejected advertisement {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Errors raised by identity bootstrap and peer operations.
#[derive(Debug, Error)]
pub enum MembershipError {
    /// More than one certificate on disk; an administrator must pick one.
    #[error("found {count} identity certificates in {dir}, expected at most one")]
    ConflictingIdentity { count: usize, dir: String },

    #[error("identity certificate {path} is malformed: {reason}")]
    MalformedIdentity { path: String, reason: String },

    #[error("keystore password rejected for peer {peer_id}")]
    KeyStoreLocked { peer_id: PeerId },

    #[error("no key material stored for peer {peer_id}")]
    KeyMaterialMissing { peer_id: PeerId },

    #[error("failed to seal key material: {0}")]
    KeySealing(String),

    #[error("identity storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("identity encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The directory could not be reached or refused a bootstrap publish.
    #[error("bootstrap failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("peer {0} is not a cluster member")]
    PeerNotFound(PeerId),

    #[error("no endpoint resolved yet for peer {0}")]
    EndpointUnresolved(PeerId),

    #[error("peer has not been initialized")]
    NotInitialized,

    #[error("background tasks need a running tokio runtime")]
    NoRuntime,

    /// Only one coordinator is supported per cluster.
    #[error("multiple coordinators observed: {first} and {second}")]
    MultipleCoordinators { first: PeerId, second: PeerId },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
