//! Advertisements and discovery queries.
//!
//! An advertisement is a discoverable, TTL-bound record. Once published the
//! directory owns the copy; peers republish periodically to keep it fresh.

use super::entities::{Endpoint, PeerId, PeerRole, ServiceName};
use serde::{Deserialize, Serialize};

/// Name under which locality evidence is published.
pub const LOCALITY_EVIDENCE_NAME: &str = "PeerCloud Locality Evidence";

/// Kind discriminant used by query and flush filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvertisementKind {
    ServiceEndpoint,
    PeerPresence,
    LocalityEvidence,
}

/// A discoverable record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advertisement {
    /// A reachable channel for one service of a peer.
    ServiceEndpoint {
        owner: PeerId,
        service: ServiceName,
        channel_id: String,
        name: String,
    },
    /// A peer announcing it is active in the given role.
    PeerPresence { peer_id: PeerId, role: PeerRole },
    /// Two peers observed to be directly reachable from each other.
    LocalityEvidence { local: PeerId, remote: PeerId },
}

impl Advertisement {
    /// Presence record for `peer_id`.
    pub fn presence(peer_id: PeerId, role: PeerRole) -> Self {
        Self::PeerPresence { peer_id, role }
    }

    /// Well-known endpoint record for `service` on `owner`.
    pub fn endpoint(owner: PeerId, service: ServiceName) -> Self {
        Self::ServiceEndpoint {
            owner,
            service,
            channel_id: service.channel_id().to_string(),
            name: service.well_known_name().to_string(),
        }
    }

    /// Evidence that `local` reaches `remote` without a relay.
    pub fn evidence(local: PeerId, remote: PeerId) -> Self {
        Self::LocalityEvidence { local, remote }
    }

    pub fn kind(&self) -> AdvertisementKind {
        match self {
            Self::ServiceEndpoint { .. } => AdvertisementKind::ServiceEndpoint,
            Self::PeerPresence { .. } => AdvertisementKind::PeerPresence,
            Self::LocalityEvidence { .. } => AdvertisementKind::LocalityEvidence,
        }
    }

    /// The peer that published this record.
    pub fn owner(&self) -> &PeerId {
        match self {
            Self::ServiceEndpoint { owner, .. } => owner,
            Self::PeerPresence { peer_id, .. } => peer_id,
            Self::LocalityEvidence { local, .. } => local,
        }
    }

    /// Name matched by query name filters.
    ///
    /// Endpoints match on their well-known name, presence on the role tag.
    pub fn name(&self) -> &str {
        match self {
            Self::ServiceEndpoint { name, .. } => name,
            Self::PeerPresence { role, .. } => role.tag(),
            Self::LocalityEvidence { .. } => LOCALITY_EVIDENCE_NAME,
        }
    }

    /// Identity of the record in a directory.
    ///
    /// Republishing a record with the same key replaces the old copy. The
    /// evidence key is order-independent since the pair is unordered.
    pub fn key(&self) -> String {
        match self {
            Self::ServiceEndpoint { owner, name, .. } => format!("endpoint/{owner}/{name}"),
            Self::PeerPresence { peer_id, .. } => format!("presence/{peer_id}"),
            Self::LocalityEvidence { local, remote } => {
                let (a, b) = if local <= remote {
                    (local, remote)
                } else {
                    (remote, local)
                };
                format!("evidence/{a}/{b}")
            }
        }
    }

    /// The endpoint this record describes, if it is a service record.
    pub fn as_endpoint(&self) -> Option<Endpoint> {
        match self {
            Self::ServiceEndpoint {
                owner,
                service,
                channel_id,
                ..
            } => Some(Endpoint {
                peer_id: owner.clone(),
                service: *service,
                channel_id: channel_id.clone(),
            }),
            _ => None,
        }
    }
}

// =============================================================================
// Filters and queries
// =============================================================================

/// Matches advertisements by kind, owner and name. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisementFilter {
    pub kind: Option<AdvertisementKind>,
    pub owner: Option<PeerId>,
    pub name: Option<String>,
}

impl AdvertisementFilter {
    #[must_use]
    pub fn kind(kind: AdvertisementKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: PeerId) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn matches(&self, adv: &Advertisement) -> bool {
        self.kind.map_or(true, |k| k == adv.kind())
            && self.owner.as_ref().map_or(true, |o| o == adv.owner())
            && self.name.as_deref().map_or(true, |n| n == adv.name())
    }
}

/// An asynchronous advertisement lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryQuery {
    /// Peer issuing the query; route hints are computed relative to it.
    pub requester: PeerId,
    /// Kind, scope (owner) and name filter.
    pub filter: AdvertisementFilter,
    /// Upper bound on delivered advertisements.
    pub limit: usize,
}

impl DiscoveryQuery {
    /// Cluster-wide lookup of presence records for `role`.
    pub fn presence(requester: PeerId, role: PeerRole, limit: usize) -> Self {
        Self {
            requester,
            filter: AdvertisementFilter::kind(AdvertisementKind::PeerPresence)
                .with_name(role.tag()),
            limit,
        }
    }

    /// Lookup of the presence record of one peer.
    pub fn probe(requester: PeerId, target: PeerId, role: PeerRole) -> Self {
        Self {
            requester,
            filter: AdvertisementFilter::kind(AdvertisementKind::PeerPresence)
                .with_owner(target)
                .with_name(role.tag()),
            limit: 1,
        }
    }

    /// Lookup of `service`'s endpoint on `target`.
    pub fn endpoint(requester: PeerId, target: PeerId, service: ServiceName) -> Self {
        Self {
            requester,
            filter: AdvertisementFilter::kind(AdvertisementKind::ServiceEndpoint)
                .with_owner(target)
                .with_name(service.well_known_name()),
            limit: 1,
        }
    }

    /// Cluster-wide lookup of locality evidence.
    pub fn evidence(requester: PeerId, limit: usize) -> Self {
        Self {
            requester,
            filter: AdvertisementFilter::kind(AdvertisementKind::LocalityEvidence),
            limit,
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Route metadata attached to a discovery result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHint {
    /// Intermediate hops between requester and publisher. Zero means direct.
    pub hops: u32,
}

impl RouteHint {
    pub fn direct() -> Self {
        Self { hops: 0 }
    }

    pub fn relayed(hops: u32) -> Self {
        Self { hops: hops.max(1) }
    }

    pub fn is_direct(&self) -> bool {
        self.hops == 0
    }
}

/// One advertisement plus the routes it was observed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAdvertisement {
    pub advertisement: Advertisement,
    pub routes: Vec<RouteHint>,
}

impl DiscoveredAdvertisement {
    pub fn new(advertisement: Advertisement, routes: Vec<RouteHint>) -> Self {
        Self {
            advertisement,
            routes,
        }
    }

    /// True if any route reached the publisher without a relay.
    pub fn has_direct_route(&self) -> bool {
        self.routes.iter().any(RouteHint::is_direct)
    }
}

/// Results delivered to a discovery listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResponse {
    pub advertisements: Vec<DiscoveredAdvertisement>,
}

impl DiscoveryResponse {
    pub fn new(advertisements: Vec<DiscoveredAdvertisement>) -> Self {
        Self { advertisements }
    }

    pub fn is_empty(&self) -> bool {
        self.advertisements.is_empty()
    }
}
