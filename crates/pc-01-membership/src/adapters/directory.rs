use crate::domain::{
    Advertisement, AdvertisementFilter, DirectoryError, DiscoveredAdvertisement, DiscoveryQuery,
    DiscoveryResponse, PeerId, RouteHint, Timestamp,
};
use crate::ports::{AdvertisementDirectory, DiscoveryListener, TimeSource};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// How query results reach the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Call the listener before `query_async` returns.
    Inline,
    /// Call the listener from a spawned tokio task. Falls back to inline
    /// delivery outside a runtime.
    Spawned,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    advertisement: Advertisement,
    expires_at: Option<Timestamp>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    records: HashMap<String, StoredRecord>,
    /// Hop counts between unordered peer pairs.
    routes: HashMap<(PeerId, PeerId), u32>,
}

fn route_key(a: &PeerId, b: &PeerId) -> (PeerId, PeerId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// In-process advertisement directory shared by every peer of a cluster.
///
/// Records expire by TTL against the injected clock. Route hints come from
/// an explicit hop table; unknown pairs are reported one relay hop apart.
pub struct InMemoryDirectory {
    time: Arc<dyn TimeSource>,
    state: Mutex<DirectoryState>,
    reachable: AtomicBool,
    rejecting: AtomicBool,
    delivery: DeliveryMode,
}

impl InMemoryDirectory {
    /// Directory with inline delivery.
    #[must_use]
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self::with_delivery(time, DeliveryMode::Inline)
    }

    #[must_use]
    pub fn with_delivery(time: Arc<dyn TimeSource>, delivery: DeliveryMode) -> Self {
        Self {
            time,
            state: Mutex::new(DirectoryState::default()),
            reachable: AtomicBool::new(true),
            rejecting: AtomicBool::new(false),
            delivery,
        }
    }

    /// Simulate the overlay going away (or coming back).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make every publish fail with `Rejected`.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Record that `a` and `b` are `hops` apart. Zero means directly reachable.
    pub fn set_route(&self, a: &PeerId, b: &PeerId, hops: u32) {
        self.state.lock().routes.insert(route_key(a, b), hops);
    }

    /// Live (unexpired) records, ordered by key.
    pub fn records(&self) -> Vec<Advertisement> {
        let now = self.time.now();
        let mut state = self.state.lock();
        Self::purge_expired(&mut state, now);
        let mut keyed: Vec<(&String, &StoredRecord)> = state.records.iter().collect();
        keyed.sort_by(|a, b| a.0.cmp(b.0));
        keyed
            .into_iter()
            .map(|(_, record)| record.advertisement.clone())
            .collect()
    }

    pub fn contains(&self, adv: &Advertisement) -> bool {
        self.records().iter().any(|r| r.key() == adv.key())
    }

    fn purge_expired(state: &mut DirectoryState, now: Timestamp) {
        state
            .records
            .retain(|_, record| record.expires_at.map_or(true, |at| at > now));
    }

    fn check_reachable(&self) -> Result<(), DirectoryError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(DirectoryError::Unreachable)
        }
    }

    fn deliver(&self, listener: Arc<dyn DiscoveryListener>, response: DiscoveryResponse) {
        match (self.delivery, tokio::runtime::Handle::try_current()) {
            (DeliveryMode::Spawned, Ok(handle)) => {
                handle.spawn(async move { listener.on_discovery(response) });
            }
            _ => listener.on_discovery(response),
        }
    }
}

impl AdvertisementDirectory for InMemoryDirectory {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn publish(&self, adv: Advertisement, ttl: Option<Duration>) -> Result<(), DirectoryError> {
        self.check_reachable()?;
        let key = adv.key();
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(DirectoryError::Rejected {
                key,
                reason: "directory is rejecting publishes".into(),
            });
        }
        let now = self.time.now();
        let expires_at = ttl.map(|ttl| now.add_millis(ttl.as_millis() as u64));
        trace!(key = %key, ?expires_at, "publish");
        self.state.lock().records.insert(
            key,
            StoredRecord {
                advertisement: adv,
                expires_at,
            },
        );
        Ok(())
    }

    fn unpublish(&self, adv: &Advertisement) -> Result<(), DirectoryError> {
        self.check_reachable()?;
        self.state.lock().records.remove(&adv.key());
        Ok(())
    }

    fn flush_local(&self, filter: &AdvertisementFilter) -> Result<usize, DirectoryError> {
        self.check_reachable()?;
        let mut state = self.state.lock();
        let before = state.records.len();
        state
            .records
            .retain(|_, record| !filter.matches(&record.advertisement));
        Ok(before - state.records.len())
    }

    fn query_async(
        &self,
        query: DiscoveryQuery,
        listener: Arc<dyn DiscoveryListener>,
    ) -> Result<(), DirectoryError> {
        self.check_reachable()?;
        let now = self.time.now();

        let results: Vec<DiscoveredAdvertisement> = {
            let mut state = self.state.lock();
            Self::purge_expired(&mut state, now);
            let mut matching: Vec<&StoredRecord> = state
                .records
                .values()
                .filter(|record| query.filter.matches(&record.advertisement))
                .collect();
            matching.sort_by_key(|record| record.advertisement.key());
            matching
                .into_iter()
                .take(query.limit)
                .map(|record| {
                    let owner = record.advertisement.owner();
                    let hint = match state.routes.get(&route_key(&query.requester, owner)) {
                        Some(&0) => RouteHint::direct(),
                        Some(&hops) => RouteHint::relayed(hops),
                        None => RouteHint::relayed(1),
                    };
                    DiscoveredAdvertisement::new(record.advertisement.clone(), vec![hint])
                })
                .collect()
        };

        debug!(
            requester = %query.requester,
            filter = ?query.filter,
            results = results.len(),
            "discovery query"
        );
        if !results.is_empty() {
            self.deliver(listener, DiscoveryResponse::new(results));
        }
        Ok(())
    }
}
