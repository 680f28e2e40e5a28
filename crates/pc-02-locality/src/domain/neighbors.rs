//! Per-peer neighbor views built from locality evidence.
//!
//! Each indexed peer points at one numbered neighbor set; several peers may
//! share a set. Two peers mapped to different sets are never unified: when
//! evidence links them, each set just gains an entry for the other peer.
//! Views are therefore per peer and not guaranteed to be transitively
//! consistent.

use pc_01_membership::{PeerId, Timestamp};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Neighbor set number. Starts at 1, so it never collides with the default domain.
pub type SetId = u64;

/// What applying one evidence pair changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Sets whose membership changed.
    pub changed_sets: BTreeSet<SetId>,
    /// Peers whose own set lost them to pruning; they are no longer indexed.
    pub released: Vec<PeerId>,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.changed_sets.is_empty() && self.released.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct NeighborMap {
    sets: HashMap<SetId, BTreeMap<PeerId, Timestamp>>,
    index: HashMap<PeerId, SetId>,
    next_id: SetId,
}

impl Default for NeighborMap {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborMap {
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> SetId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Apply evidence that `a` and `b` are directly reachable.
    ///
    /// - neither mapped: new set `{a, b}` indexed under both
    /// - one mapped: the other joins that set and is indexed to it
    /// - both mapped: each gets (or refreshes) an entry in the other's set,
    ///   both refresh their own entry, then both sets drop entries older
    ///   than `expiry_ms`
    pub fn apply(&mut self, a: &PeerId, b: &PeerId, now: Timestamp, expiry_ms: u64) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        if a == b {
            return outcome;
        }

        match (self.index.get(a).copied(), self.index.get(b).copied()) {
            (None, None) => {
                let id = self.allocate();
                let set = BTreeMap::from([(a.clone(), now), (b.clone(), now)]);
                self.sets.insert(id, set);
                self.index.insert(a.clone(), id);
                self.index.insert(b.clone(), id);
                outcome.changed_sets.insert(id);
            }
            (None, Some(id)) => self.join(a, id, now, &mut outcome),
            (Some(id), None) => self.join(b, id, now, &mut outcome),
            (Some(set_a), Some(set_b)) => {
                for (set, entry) in [(set_b, a), (set_a, b), (set_a, a), (set_b, b)] {
                    if let Some(members) = self.sets.get_mut(&set) {
                        if members.insert(entry.clone(), now).is_none() {
                            outcome.changed_sets.insert(set);
                        }
                    }
                }
                self.prune(set_a, now, expiry_ms, &mut outcome);
                if set_b != set_a {
                    self.prune(set_b, now, expiry_ms, &mut outcome);
                }
            }
        }
        outcome
    }

    fn join(&mut self, newcomer: &PeerId, id: SetId, now: Timestamp, outcome: &mut MergeOutcome) {
        if let Some(members) = self.sets.get_mut(&id) {
            members.insert(newcomer.clone(), now);
            self.index.insert(newcomer.clone(), id);
            outcome.changed_sets.insert(id);
        }
    }

    fn prune(&mut self, id: SetId, now: Timestamp, expiry_ms: u64, outcome: &mut MergeOutcome) {
        let Some(members) = self.sets.get_mut(&id) else {
            return;
        };
        let stale: Vec<PeerId> = members
            .iter()
            .filter(|(_, seen)| now.millis_since(**seen) > expiry_ms)
            .map(|(peer_id, _)| peer_id.clone())
            .collect();
        if stale.is_empty() {
            return;
        }
        for peer_id in &stale {
            members.remove(peer_id);
        }
        let emptied = members.is_empty();
        outcome.changed_sets.insert(id);

        for peer_id in stale {
            if self.index.get(&peer_id) == Some(&id) {
                self.index.remove(&peer_id);
                outcome.released.push(peer_id);
            }
        }
        if emptied {
            self.sets.remove(&id);
        }
    }

    /// Drop every trace of `peer_id`. Returns the sets that lost it.
    pub fn forget(&mut self, peer_id: &PeerId) -> BTreeSet<SetId> {
        self.index.remove(peer_id);
        let mut changed = BTreeSet::new();
        self.sets.retain(|id, members| {
            if members.remove(peer_id).is_some() {
                changed.insert(*id);
            }
            !members.is_empty()
        });
        // Peers indexed to a set that vanished are unmapped.
        let sets = &self.sets;
        self.index.retain(|_, id| sets.contains_key(id));
        changed
    }

    /// The set `peer_id` is indexed to.
    pub fn set_of(&self, peer_id: &PeerId) -> Option<SetId> {
        self.index.get(peer_id).copied()
    }

    /// Members of set `id`, sorted.
    pub fn members_of(&self, id: SetId) -> Vec<PeerId> {
        self.sets
            .get(&id)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn last_contact(&self, id: SetId, peer_id: &PeerId) -> Option<Timestamp> {
        self.sets.get(&id).and_then(|members| members.get(peer_id).copied())
    }

    /// Peers indexed to set `id`, sorted.
    pub fn peers_indexed_to(&self, id: SetId) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .index
            .iter()
            .filter(|(_, set)| **set == id)
            .map(|(peer_id, _)| peer_id.clone())
            .collect();
        peers.sort();
        peers
    }

    /// `(set, members)` view of `peer_id`.
    pub fn view_of(&self, peer_id: &PeerId) -> Option<(SetId, Vec<PeerId>)> {
        let id = self.set_of(peer_id)?;
        Some((id, self.members_of(id)))
    }

    pub fn num_sets(&self) -> usize {
        self.sets.len()
    }

    pub fn num_indexed(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRY: u64 = 1_000;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id)
    }

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_neither_mapped_creates_shared_set() {
        let mut map = NeighborMap::new();
        let outcome = map.apply(&peer("n1"), &peer("n2"), t(0), EXPIRY);

        let id = map.set_of(&peer("n1")).unwrap();
        assert_eq!(id, 1);
        assert_eq!(map.set_of(&peer("n2")), Some(id));
        assert_eq!(map.members_of(id), vec![peer("n1"), peer("n2")]);
        assert_eq!(outcome.changed_sets, BTreeSet::from([id]));
    }

    #[test]
    fn test_one_mapped_joins_existing_set() {
        let mut map = NeighborMap::new();
        map.apply(&peer("n3"), &peer("x"), t(0), EXPIRY);
        let id = map.set_of(&peer("n3")).unwrap();

        map.apply(&peer("n3"), &peer("n4"), t(10), EXPIRY);
        assert_eq!(map.set_of(&peer("n4")), Some(id));
        assert_eq!(map.members_of(id).len(), 3);
        assert_eq!(map.num_sets(), 1);
    }

    #[test]
    fn test_both_mapped_distinct_sets_are_not_unified() {
        let mut map = NeighborMap::new();
        map.apply(&peer("a"), &peer("b"), t(0), EXPIRY);
        map.apply(&peer("c"), &peer("d"), t(0), EXPIRY);
        let set_a = map.set_of(&peer("a")).unwrap();
        let set_c = map.set_of(&peer("c")).unwrap();

        let outcome = map.apply(&peer("a"), &peer("c"), t(10), EXPIRY);

        assert_ne!(map.set_of(&peer("a")), map.set_of(&peer("c")));
        assert_eq!(map.members_of(set_a), vec![peer("a"), peer("b"), peer("c")]);
        assert_eq!(map.members_of(set_c), vec![peer("a"), peer("c"), peer("d")]);
        assert_eq!(outcome.changed_sets, BTreeSet::from([set_a, set_c]));
        // b never saw d: views are per peer.
        assert!(!map.members_of(set_a).contains(&peer("d")));
    }

    #[test]
    fn test_both_mapped_refresh_is_not_a_change() {
        let mut map = NeighborMap::new();
        map.apply(&peer("a"), &peer("b"), t(0), EXPIRY);
        let outcome = map.apply(&peer("a"), &peer("b"), t(500), EXPIRY);
        assert!(outcome.is_empty());
        let id = map.set_of(&peer("a")).unwrap();
        assert_eq!(map.last_contact(id, &peer("b")), Some(t(500)));
    }

    #[test]
    fn test_stale_entries_pruned_and_released() {
        let mut map = NeighborMap::new();
        map.apply(&peer("a"), &peer("b"), t(0), EXPIRY);
        map.apply(&peer("a"), &peer("c"), t(0), EXPIRY);
        let id = map.set_of(&peer("a")).unwrap();

        // Only a and b keep reporting.
        let outcome = map.apply(&peer("a"), &peer("b"), t(2_000), EXPIRY);

        assert_eq!(map.members_of(id), vec![peer("a"), peer("b")]);
        assert_eq!(outcome.released, vec![peer("c")]);
        assert_eq!(map.set_of(&peer("c")), None);
    }

    #[test]
    fn test_self_evidence_ignored() {
        let mut map = NeighborMap::new();
        assert!(map.apply(&peer("a"), &peer("a"), t(0), EXPIRY).is_empty());
        assert_eq!(map.num_sets(), 0);
    }

    #[test]
    fn test_forget_removes_peer_everywhere() {
        let mut map = NeighborMap::new();
        map.apply(&peer("a"), &peer("b"), t(0), EXPIRY);
        map.apply(&peer("c"), &peer("d"), t(0), EXPIRY);
        map.apply(&peer("a"), &peer("c"), t(0), EXPIRY);

        let changed = map.forget(&peer("c"));
        assert_eq!(changed.len(), 2);
        assert_eq!(map.set_of(&peer("c")), None);
        assert_eq!(map.view_of(&peer("d")).map(|(_, m)| m), Some(vec![peer("a"), peer("d")]));
    }

    #[test]
    fn test_forget_last_members_drops_set() {
        let mut map = NeighborMap::new();
        map.apply(&peer("a"), &peer("b"), t(0), EXPIRY);
        map.forget(&peer("a"));
        map.forget(&peer("b"));
        assert_eq!(map.num_sets(), 0);
        assert_eq!(map.num_indexed(), 0);
    }

    #[test]
    fn test_set_ids_never_reuse_default() {
        let mut map = NeighborMap::new();
        for i in 0..5 {
            map.apply(&peer(&format!("x{i}")), &peer(&format!("y{i}")), t(0), EXPIRY);
        }
        assert!(map.peers_indexed_to(0).is_empty());
        assert_eq!(map.peers_indexed_to(5), vec![peer("x4"), peer("y4")]);
    }
}
