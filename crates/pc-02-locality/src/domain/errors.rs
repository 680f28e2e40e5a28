//! Locality errors.

use pc_01_membership::PeerId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalityError {
    /// A topology snapshot lists the same peer in two domains.
    #[error("peer {peer_id} appears in domains {first} and {second}")]
    DuplicatePeer {
        peer_id: PeerId,
        first: String,
        second: String,
    },

    #[error("topology snapshot has an empty domain id")]
    EmptyDomainId,

    #[error("invalid locality config value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("failed to parse locality config: {0}")]
    ConfigParse(String),

    #[error("no tokio runtime available to spawn a background loop")]
    NoRuntime,
}
