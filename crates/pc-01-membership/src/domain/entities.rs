//! Core entities shared by every membership component.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// PeerId
// =============================================================================

/// Opaque, stable identifier of a peer in the overlay.
///
/// Minted once per host (see [`crate::domain::PeerIdentity`]) and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap an already-validated id string.
    ///
    /// Returns `None` for an empty or whitespace-only id.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Build an id from a string known to be non-empty.
    ///
    /// Empty input falls back to the literal `"anonymous"` so the
    /// never-empty invariant holds.
    pub fn new(raw: impl Into<String>) -> Self {
        Self::parse(raw).unwrap_or_else(|| Self("anonymous".to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

// =============================================================================
// PeerRole
// =============================================================================

/// Role a peer plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// The single namespace coordinator.
    Coordinator,
    /// A block storage node.
    Storage,
    /// A file-system client.
    Client,
    /// A pure discovery helper (runs the locality sensor).
    Discovery,
}

impl PeerRole {
    /// Stable presence tag carried in presence advertisements.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Storage => "storage",
            Self::Client => "client",
            Self::Discovery => "discovery",
        }
    }

    /// Parse a presence tag back into a role.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "coordinator" => Some(Self::Coordinator),
            "storage" => Some(Self::Storage),
            "client" => Some(Self::Client),
            "discovery" => Some(Self::Discovery),
            _ => None,
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// =============================================================================
// Timestamp
// =============================================================================

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add milliseconds (saturating).
    pub fn add_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is in the future).
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// =============================================================================
// Services and endpoints
// =============================================================================

/// The two well-known channels every peer exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceName {
    /// Control / RPC traffic.
    Rpc,
    /// Bulk block data.
    Data,
}

impl ServiceName {
    /// Well-known advertisement name used to discover the channel.
    pub fn well_known_name(&self) -> &'static str {
        match self {
            Self::Rpc => "PeerCloud RPC Channel",
            Self::Data => "PeerCloud DATA Channel",
        }
    }

    /// Fixed channel id shared by all peers for this service.
    pub fn channel_id(&self) -> &'static str {
        match self {
            Self::Rpc => "urn:pc:channel:rpc:5f3c8a1e9b7d4c20",
            Self::Data => "urn:pc:channel:data:a24e6d0b3f9c1875",
        }
    }
}

/// Resolved address of a service on a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub peer_id: PeerId,
    pub service: ServiceName,
    pub channel_id: String,
}

impl Endpoint {
    /// Endpoint of `service` on `peer_id`, bound to the well-known channel.
    pub fn well_known(peer_id: PeerId, service: ServiceName) -> Self {
        Self {
            peer_id,
            service,
            channel_id: service.channel_id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_rejects_empty() {
        assert!(PeerId::parse("").is_none());
        assert!(PeerId::parse("   ").is_none());
        assert_eq!(PeerId::parse(" abc ").map(|p| p.to_string()), Some("abc".into()));
    }

    #[test]
    fn test_role_tag_roundtrip() {
        for role in [
            PeerRole::Coordinator,
            PeerRole::Storage,
            PeerRole::Client,
            PeerRole::Discovery,
        ] {
            assert_eq!(PeerRole::from_tag(role.tag()), Some(role));
        }
        assert_eq!(PeerRole::from_tag("relay"), None);
    }

    #[test]
    fn test_timestamp_millis_since_saturates() {
        let early = Timestamp::from_millis(100);
        let late = Timestamp::from_millis(350);
        assert_eq!(late.millis_since(early), 250);
        assert_eq!(early.millis_since(late), 0);
    }
}
