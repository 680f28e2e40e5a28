//! Membership table and the liveness state machine.
//!
//! Each member is `Confirmed` (no suspect entry) or `Suspect(n)` with
//! `1 <= n <= retry_limit`. A sweep ages suspects and opens new suspect
//! entries; a fresh presence advertisement closes them again.
//!
//! ```text
//!   Confirmed ──sweep──▶ Suspect(1) ──sweep──▶ ... ──▶ Suspect(limit) ──sweep──▶ Departed
//!       ▲                    │                              │
//!       └──── presence ──────┴──────────────────────────────┘
//! ```

use super::entities::{Endpoint, PeerId};
use std::collections::HashMap;

/// Liveness state of a single member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    Confirmed,
    Suspect(u32),
}

/// Result of one sweep over the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Members removed this sweep, in removal order.
    pub departed: Vec<PeerId>,
    /// Members to probe once the lock is released.
    pub probes: Vec<PeerId>,
}

/// Known members with their last resolved endpoint, plus the suspect set.
///
/// Both maps live behind the same lock in the service layer, so every
/// mutation here sees a consistent pair.
#[derive(Debug, Clone, Default)]
pub struct MembershipTable {
    members: HashMap<PeerId, Option<Endpoint>>,
    suspects: HashMap<PeerId, u32>,
}

impl MembershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a first sighting. Returns `true` if the peer was new.
    ///
    /// An existing entry keeps its endpoint.
    pub fn insert(&mut self, peer_id: PeerId) -> bool {
        if self.members.contains_key(&peer_id) {
            return false;
        }
        self.members.insert(peer_id, None);
        true
    }

    /// Bind a resolved endpoint to an existing member.
    ///
    /// Returns `false` if the peer is not a member.
    pub fn bind_endpoint(&mut self, endpoint: Endpoint) -> bool {
        match self.members.get_mut(&endpoint.peer_id) {
            Some(slot) => {
                *slot = Some(endpoint);
                true
            }
            None => false,
        }
    }

    /// Drop a member and any suspect entry. Returns `true` if it was a member.
    pub fn remove(&mut self, peer_id: &PeerId) -> bool {
        self.suspects.remove(peer_id);
        self.members.remove(peer_id).is_some()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.members.contains_key(peer_id)
    }

    /// Resolved endpoint of a member, if any.
    pub fn endpoint(&self, peer_id: &PeerId) -> Option<&Endpoint> {
        self.members.get(peer_id).and_then(Option::as_ref)
    }

    /// Member ids in sorted order.
    pub fn members(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.members.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn state(&self, peer_id: &PeerId) -> Option<LivenessState> {
        if !self.members.contains_key(peer_id) {
            return None;
        }
        Some(match self.suspects.get(peer_id) {
            Some(&n) => LivenessState::Suspect(n),
            None => LivenessState::Confirmed,
        })
    }

    /// A fresh presence advertisement was observed. Returns `true` if a
    /// suspect entry was cleared.
    pub fn confirm(&mut self, peer_id: &PeerId) -> bool {
        self.suspects.remove(peer_id).is_some()
    }

    pub fn suspect_count(&self) -> usize {
        self.suspects.len()
    }

    /// Run one liveness sweep.
    ///
    /// 1. Every existing suspect below `retry_limit` is incremented; the rest
    ///    depart and are removed from both maps.
    /// 2. Every remaining member is probed; those without a suspect entry
    ///    get one with a count of 1.
    ///
    /// A member that never answers departs on sweep `retry_limit + 1`.
    pub fn sweep(&mut self, retry_limit: u32) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        let mut suspects: Vec<PeerId> = self.suspects.keys().cloned().collect();
        suspects.sort();
        for peer_id in suspects {
            let Some(misses) = self.suspects.get_mut(&peer_id) else {
                continue;
            };
            if *misses < retry_limit {
                *misses += 1;
            } else {
                self.suspects.remove(&peer_id);
                self.members.remove(&peer_id);
                outcome.departed.push(peer_id);
            }
        }

        for peer_id in self.members() {
            self.suspects.entry(peer_id.clone()).or_insert(1);
            outcome.probes.push(peer_id);
        }

        outcome
    }
}
