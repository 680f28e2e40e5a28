//! Broadcast-domain table.
//!
//! Peers are grouped into locality domains. The default domain `"0"` is
//! always first and survives losing all its members; every other domain is
//! created on first use and dropped when it empties.
//!
//! Invariants held after every operation:
//! - a peer is in at most one domain
//! - `num_peers()` equals the sum of domain sizes
//! - the default domain exists

use super::errors::LocalityError;
use super::selector::{normalize_domain_id, DomainSelector, DEFAULT_DOMAIN};
use pc_01_membership::{PeerId, Timestamp};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One locality domain and its members' last-contact times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastDomain {
    id: String,
    members: BTreeMap<PeerId, Timestamp>,
}

impl BroadcastDomain {
    fn new(id: String) -> Self {
        Self {
            id,
            members: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_DOMAIN
    }

    pub fn members(&self) -> impl Iterator<Item = &PeerId> {
        self.members.keys()
    }

    pub fn last_contact(&self, peer_id: &PeerId) -> Option<Timestamp> {
        self.members.get(peer_id).copied()
    }
}

/// What `add` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The peer left `from` for the requested domain.
    Moved { from: String },
    /// Already a member of that domain.
    Unchanged,
    /// Empty domain hint.
    Rejected,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TopologyStats {
    pub num_domains: usize,
    pub num_peers: usize,
}

#[derive(Debug, Clone)]
pub struct DomainTable {
    /// Default domain first, then creation order.
    domains: Vec<BroadcastDomain>,
    placement: HashMap<PeerId, String>,
    num_peers: usize,
}

impl Default for DomainTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainTable {
    pub fn new() -> Self {
        Self {
            domains: vec![BroadcastDomain::new(DEFAULT_DOMAIN.to_string())],
            placement: HashMap::new(),
            num_peers: 0,
        }
    }

    fn position(&self, domain_id: &str) -> Option<usize> {
        self.domains.iter().position(|d| d.id == domain_id)
    }

    /// Place `peer_id` in `domain_hint`, creating the domain if needed.
    ///
    /// A peer already in another domain is moved; the domain it leaves is
    /// dropped if that empties it (unless it is the default).
    pub fn add(&mut self, peer_id: &PeerId, domain_hint: &str, now: Timestamp) -> AddOutcome {
        let Some(domain_id) = normalize_domain_id(domain_hint) else {
            return AddOutcome::Rejected;
        };

        let previous = self.placement.get(peer_id).cloned();
        if previous.as_deref() == Some(domain_id.as_str()) {
            return AddOutcome::Unchanged;
        }
        if previous.is_some() {
            self.remove(peer_id);
        }

        let index = match self.position(&domain_id) {
            Some(index) => index,
            None => {
                self.domains.push(BroadcastDomain::new(domain_id.clone()));
                self.domains.len() - 1
            }
        };
        self.domains[index].members.insert(peer_id.clone(), now);
        self.placement.insert(peer_id.clone(), domain_id);
        self.num_peers += 1;
        debug_assert_eq!(
            self.num_peers,
            self.domains.iter().map(BroadcastDomain::len).sum::<usize>()
        );

        match previous {
            Some(from) => AddOutcome::Moved { from },
            None => AddOutcome::Added,
        }
    }

    /// Remove `peer_id`. Returns the domain it was in.
    pub fn remove(&mut self, peer_id: &PeerId) -> Option<String> {
        let domain_id = self.placement.remove(peer_id)?;
        if let Some(index) = self.position(&domain_id) {
            let domain = &mut self.domains[index];
            if domain.members.remove(peer_id).is_some() {
                self.num_peers -= 1;
            }
            if domain.is_empty() && !domain.is_default() {
                self.domains.remove(index);
            }
        }
        Some(domain_id)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.placement.contains_key(peer_id)
    }

    pub fn domain_of(&self, peer_id: &PeerId) -> Option<&str> {
        self.placement.get(peer_id).map(String::as_str)
    }

    pub fn domain(&self, domain_id: &str) -> Option<&BroadcastDomain> {
        self.domains.iter().find(|d| d.id == domain_id)
    }

    pub fn domains(&self) -> &[BroadcastDomain] {
        &self.domains
    }

    /// Refresh last contact. Returns `false` for unknown peers.
    pub fn touch(&mut self, peer_id: &PeerId, now: Timestamp) -> bool {
        let Some(domain_id) = self.placement.get(peer_id) else {
            return false;
        };
        let Some(index) = self.position(domain_id) else {
            return false;
        };
        match self.domains[index].members.get_mut(peer_id) {
            Some(seen) => {
                *seen = now;
                true
            }
            None => false,
        }
    }

    pub fn is_on_same_domain(&self, a: &PeerId, b: &PeerId) -> bool {
        match (self.domain_of(a), self.domain_of(b)) {
            (Some(da), Some(db)) => da == db,
            _ => false,
        }
    }

    /// Coarse locality metric.
    ///
    /// - 1: same peer or same domain
    /// - 2: exactly one of the two is in the default domain
    /// - 3: otherwise
    pub fn distance(&self, a: &PeerId, b: &PeerId) -> u8 {
        if a == b || self.is_on_same_domain(a, b) {
            return 1;
        }
        let in_default = |p: &PeerId| self.domain_of(p) == Some(DEFAULT_DOMAIN);
        if in_default(a) || in_default(b) {
            2
        } else {
            3
        }
    }

    /// Uniform pick among members of the domains `selector` admits.
    pub fn choose_random<R: Rng + ?Sized>(
        &self,
        selector: &DomainSelector,
        rng: &mut R,
    ) -> Option<PeerId> {
        let candidates: Vec<&PeerId> = self
            .domains
            .iter()
            .filter(|d| selector.admits(&d.id))
            .flat_map(|d| d.members.keys())
            .collect();
        candidates.choose(rng).map(|p| (*p).clone())
    }

    pub fn stats(&self) -> TopologyStats {
        TopologyStats {
            num_domains: self.domains.len(),
            num_peers: self.num_peers,
        }
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            domains: self
                .domains
                .iter()
                .map(|d| DomainSnapshot {
                    id: d.id.clone(),
                    members: d
                        .members
                        .iter()
                        .map(|(peer_id, seen)| MemberSnapshot {
                            peer_id: peer_id.clone(),
                            last_contact: *seen,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Rebuild a table from a snapshot, recomputing counters.
    pub fn restore(snapshot: &TopologySnapshot) -> Result<Self, LocalityError> {
        let mut table = Self::new();
        for domain in &snapshot.domains {
            let id = normalize_domain_id(&domain.id).ok_or(LocalityError::EmptyDomainId)?;
            for member in &domain.members {
                if let Some(first) = table.domain_of(&member.peer_id) {
                    return Err(LocalityError::DuplicatePeer {
                        peer_id: member.peer_id.clone(),
                        first: first.to_string(),
                        second: id,
                    });
                }
                table.add(&member.peer_id, &id, member.last_contact);
            }
        }
        Ok(table)
    }
}

impl fmt::Display for DomainTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of domains: {}", self.domains.len())?;
        writeln!(f, "Number of peers: {}", self.num_peers)?;
        for domain in &self.domains {
            writeln!(f, "domain {} ({} peers)", domain.id, domain.len())?;
            for peer_id in domain.members.keys() {
                writeln!(f, "   {peer_id}")?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Serialized form
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub peer_id: PeerId,
    pub last_contact: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSnapshot {
    pub id: String,
    pub members: Vec<MemberSnapshot>,
}

/// Serializable copy of a whole topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub domains: Vec<DomainSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id)
    }

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_new_table_has_only_default_domain() {
        let table = DomainTable::new();
        assert_eq!(table.domains().len(), 1);
        assert_eq!(table.domains()[0].id(), "0");
        assert_eq!(table.stats(), TopologyStats { num_domains: 1, num_peers: 0 });
    }

    #[test]
    fn test_add_then_remove() {
        let mut table = DomainTable::new();
        assert_eq!(table.add(&peer("a"), "7", t(1)), AddOutcome::Added);
        assert!(table.contains(&peer("a")));
        assert_eq!(table.remove(&peer("a")).as_deref(), Some("7"));
        assert!(!table.contains(&peer("a")));
        assert_eq!(table.remove(&peer("a")), None);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut table = DomainTable::new();
        table.add(&peer("a"), "7", t(1));
        assert_eq!(table.add(&peer("a"), "7", t(2)), AddOutcome::Unchanged);
        assert_eq!(table.stats().num_peers, 1);
        assert_eq!(table.domain("7").and_then(|d| d.last_contact(&peer("a"))), Some(t(1)));
    }

    #[test]
    fn test_add_rejects_empty_hint() {
        let mut table = DomainTable::new();
        assert_eq!(table.add(&peer("a"), "", t(1)), AddOutcome::Rejected);
        assert_eq!(table.add(&peer("a"), "  ", t(1)), AddOutcome::Rejected);
        assert!(!table.contains(&peer("a")));
    }

    #[test]
    fn test_add_moves_between_domains_and_collects_empty_one() {
        let mut table = DomainTable::new();
        table.add(&peer("a"), "7", t(1));
        assert_eq!(
            table.add(&peer("a"), "9", t(2)),
            AddOutcome::Moved { from: "7".into() }
        );
        assert!(table.domain("7").is_none());
        assert_eq!(table.domain_of(&peer("a")), Some("9"));
        assert_eq!(table.stats(), TopologyStats { num_domains: 2, num_peers: 1 });
    }

    #[test]
    fn test_peer_count_matches_domain_sizes() {
        let mut table = DomainTable::new();
        let moves = [("a", "1"), ("b", "1"), ("c", "2"), ("a", "2"), ("b", "0"), ("c", "3")];
        for (step, (id, domain)) in moves.iter().enumerate() {
            table.add(&peer(id), domain, t(step as u64));
            let placed: usize = table.domains().iter().map(BroadcastDomain::len).sum();
            assert_eq!(table.stats().num_peers, placed);
        }
        table.remove(&peer("b"));
        let placed: usize = table.domains().iter().map(BroadcastDomain::len).sum();
        assert_eq!(table.stats().num_peers, placed);
        assert_eq!(placed, 2);
    }

    #[test]
    fn test_default_domain_survives_emptying() {
        let mut table = DomainTable::new();
        table.add(&peer("a"), "0", t(1));
        table.add(&peer("b"), "/datanodes", t(1));
        assert_eq!(table.domain("0").map(BroadcastDomain::len), Some(2));
        table.remove(&peer("a"));
        table.remove(&peer("b"));
        assert!(table.domain("0").is_some());
        assert_eq!(table.stats().num_domains, 1);
    }

    #[test]
    fn test_distance_tiers_and_symmetry() {
        let mut table = DomainTable::new();
        table.add(&peer("a"), "0", t(1));
        table.add(&peer("b"), "0", t(1));
        table.add(&peer("c"), "7", t(1));
        table.add(&peer("d"), "7", t(1));
        table.add(&peer("e"), "9", t(1));

        assert_eq!(table.distance(&peer("a"), &peer("a")), 1);
        assert_eq!(table.distance(&peer("a"), &peer("b")), 1);
        assert_eq!(table.distance(&peer("c"), &peer("d")), 1);
        assert_eq!(table.distance(&peer("a"), &peer("c")), 2);
        assert_eq!(table.distance(&peer("c"), &peer("e")), 3);

        let ids = ["a", "b", "c", "d", "e", "unknown"];
        for x in ids {
            for y in ids {
                assert_eq!(
                    table.distance(&peer(x), &peer(y)),
                    table.distance(&peer(y), &peer(x)),
                    "asymmetric for {x},{y}"
                );
            }
        }
    }

    #[test]
    fn test_choose_random_excluding_default() {
        let mut table = DomainTable::new();
        for (p, d) in [("a", "0"), ("b", "0"), ("c", "7"), ("d", "7")] {
            table.add(&peer(p), d, t(1));
        }
        let selector = DomainSelector::parse("~0").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let pick = table.choose_random(&selector, &mut rng).unwrap();
            assert!(pick == peer("c") || pick == peer("d"));
            seen.insert(pick);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_choose_random_empty_selection() {
        let table = DomainTable::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(table
            .choose_random(&DomainSelector::Only("0".into()), &mut rng)
            .is_none());
        assert!(table
            .choose_random(&DomainSelector::Only("42".into()), &mut rng)
            .is_none());
    }

    #[test]
    fn test_touch_refreshes_contact() {
        let mut table = DomainTable::new();
        table.add(&peer("a"), "7", t(1));
        assert!(table.touch(&peer("a"), t(5)));
        assert_eq!(table.domain("7").and_then(|d| d.last_contact(&peer("a"))), Some(t(5)));
        assert!(!table.touch(&peer("ghost"), t(5)));
    }

    #[test]
    fn test_snapshot_restore_preserves_layout() {
        let mut table = DomainTable::new();
        table.add(&peer("a"), "0", t(1));
        table.add(&peer("b"), "7", t(2));
        table.add(&peer("c"), "7", t(3));

        let json = serde_json::to_string(&table.snapshot()).unwrap();
        let restored = DomainTable::restore(&serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.stats(), table.stats());
        assert_eq!(restored.domain_of(&peer("c")), Some("7"));
        assert_eq!(restored.snapshot(), table.snapshot());
    }

    #[test]
    fn test_restore_rejects_duplicate_peer() {
        let snapshot = TopologySnapshot {
            domains: vec![
                DomainSnapshot {
                    id: "1".into(),
                    members: vec![MemberSnapshot { peer_id: peer("a"), last_contact: t(1) }],
                },
                DomainSnapshot {
                    id: "2".into(),
                    members: vec![MemberSnapshot { peer_id: peer("a"), last_contact: t(1) }],
                },
            ],
        };
        assert!(matches!(
            DomainTable::restore(&snapshot),
            Err(LocalityError::DuplicatePeer { .. })
        ));
    }

    #[test]
    fn test_display_lists_domains() {
        let mut table = DomainTable::new();
        table.add(&peer("a"), "7", t(1));
        let rendered = table.to_string();
        assert!(rendered.contains("Number of domains: 2"));
        assert!(rendered.contains("domain 7 (1 peers)"));
        assert!(rendered.contains("   a"));
    }
}
