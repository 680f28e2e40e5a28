//! Thread-safe broadcast-domain topology.

use crate::domain::{AddOutcome, DomainSelector, DomainTable, LocalityError, TopologySnapshot};
use crate::ports::{PlacementTopology, TimeSource};
use pc_01_membership::PeerId;
use parking_lot::Mutex;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Concurrent view of which peers share a locality domain.
///
/// Every operation takes the same exclusive lock, so readers always see a
/// table where each peer sits in exactly one domain.
pub struct BroadcastTopology {
    table: Mutex<DomainTable>,
    time: Arc<dyn TimeSource>,
}

impl BroadcastTopology {
    #[must_use]
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            table: Mutex::new(DomainTable::new()),
            time,
        }
    }

    /// Rebuild from a snapshot.
    pub fn restore(
        snapshot: &TopologySnapshot,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, LocalityError> {
        let table = DomainTable::restore(snapshot)?;
        info!(
            domains = table.stats().num_domains,
            peers = table.stats().num_peers,
            "topology restored"
        );
        Ok(Self {
            table: Mutex::new(table),
            time,
        })
    }

    /// Place `peer_id` in `domain_hint`. Returns `true` if the table changed.
    pub fn add(&self, peer_id: &PeerId, domain_hint: &str) -> bool {
        let now = self.time.now();
        let outcome = self.table.lock().add(peer_id, domain_hint, now);
        match outcome {
            AddOutcome::Added => {
                debug!(peer_id = %peer_id, domain = domain_hint, "peer added to topology");
                true
            }
            AddOutcome::Moved { from } => {
                info!(peer_id = %peer_id, from = %from, to = domain_hint, "peer moved between domains");
                true
            }
            AddOutcome::Unchanged => false,
            AddOutcome::Rejected => {
                debug!(peer_id = %peer_id, "ignoring add with empty domain id");
                false
            }
        }
    }

    /// Returns the domain the peer left.
    pub fn remove(&self, peer_id: &PeerId) -> Option<String> {
        let removed = self.table.lock().remove(peer_id);
        if let Some(domain) = &removed {
            debug!(peer_id = %peer_id, domain = %domain, "peer removed from topology");
        }
        removed
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.table.lock().contains(peer_id)
    }

    pub fn is_on_same_domain(&self, a: &PeerId, b: &PeerId) -> bool {
        self.table.lock().is_on_same_domain(a, b)
    }

    pub fn distance(&self, a: &PeerId, b: &PeerId) -> u8 {
        self.table.lock().distance(a, b)
    }

    /// Uniform pick for `spec` (`"<id>"` or `"~<id>"`).
    pub fn choose_random(&self, spec: &str) -> Option<PeerId> {
        self.choose_random_with(spec, &mut rand::thread_rng())
    }

    /// [`Self::choose_random`] with a caller-supplied generator.
    pub fn choose_random_with<R: Rng + ?Sized>(&self, spec: &str, rng: &mut R) -> Option<PeerId> {
        let Some(selector) = DomainSelector::parse(spec) else {
            debug!(spec, "ignoring empty domain selector");
            return None;
        };
        self.table.lock().choose_random(&selector, rng)
    }

    pub fn domain_of(&self, peer_id: &PeerId) -> Option<String> {
        self.table.lock().domain_of(peer_id).map(str::to_string)
    }

    /// Domain ids, default first.
    pub fn domain_ids(&self) -> Vec<String> {
        self.table
            .lock()
            .domains()
            .iter()
            .map(|d| d.id().to_string())
            .collect()
    }

    pub fn members_of(&self, domain_id: &str) -> Vec<PeerId> {
        self.table
            .lock()
            .domain(domain_id)
            .map(|d| d.members().cloned().collect())
            .unwrap_or_default()
    }

    pub fn num_domains(&self) -> usize {
        self.table.lock().stats().num_domains
    }

    pub fn num_peers(&self) -> usize {
        self.table.lock().stats().num_peers
    }

    /// Refresh `peer_id`'s last contact. `false` if it is not placed.
    pub fn touch(&self, peer_id: &PeerId) -> bool {
        let now = self.time.now();
        self.table.lock().touch(peer_id, now)
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        self.table.lock().snapshot()
    }
}

impl PlacementTopology for BroadcastTopology {
    fn choose_random(&self, spec: &str) -> Option<PeerId> {
        BroadcastTopology::choose_random(self, spec)
    }

    fn distance(&self, a: &PeerId, b: &PeerId) -> u8 {
        BroadcastTopology::distance(self, a, b)
    }

    fn is_on_same_domain(&self, a: &PeerId, b: &PeerId) -> bool {
        BroadcastTopology::is_on_same_domain(self, a, b)
    }

    fn contains(&self, peer_id: &PeerId) -> bool {
        BroadcastTopology::contains(self, peer_id)
    }
}

impl fmt::Display for BroadcastTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock();
        fmt::Display::fmt(&*table, f)
    }
}

impl fmt::Debug for BroadcastTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.table.lock().stats();
        f.debug_struct("BroadcastTopology")
            .field("num_domains", &stats.num_domains)
            .field("num_peers", &stats.num_peers)
            .finish()
    }
}
