//! Test utilities for membership.
//!
//! Deterministic clocks and recording listeners. Enable with the
//! `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use pc_01_membership::test_utils::ControllableTimeSource;
//! use pc_01_membership::ports::TimeSource;
//!
//! let time = ControllableTimeSource::new(1_000);
//! time.advance(500);
//! assert_eq!(time.now().as_millis(), 1_500);
//! ```

use crate::domain::{ClusterEvent, DiscoveredAdvertisement, DiscoveryResponse, PeerId, Timestamp};
use crate::ports::{DiscoveryListener, EventListener, TimeSource};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A time source that always returns the same instant.
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    millis: u64,
}

impl FixedTimeSource {
    pub fn new(millis: u64) -> Self {
        Self { millis }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis)
    }
}

/// Thread-safe TimeSource for tests requiring time advancement.
#[derive(Debug, Default)]
pub struct ControllableTimeSource {
    millis: AtomicU64,
}

impl ControllableTimeSource {
    pub fn new(initial_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(initial_millis),
        }
    }

    /// Advance the clock by `millis`.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Records every cluster event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ClusterEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClusterEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Ids of every `PeerDeparted` event, in order.
    pub fn departures(&self) -> Vec<PeerId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ClusterEvent::PeerDeparted { peer_id } => Some(peer_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids of every `PeerJoined` event, in order.
    pub fn joins(&self) -> Vec<PeerId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ClusterEvent::PeerJoined { peer_id } => Some(peer_id.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &ClusterEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Records every discovery result it receives.
#[derive(Debug, Default)]
pub struct RecordingDiscoveryListener {
    received: Mutex<Vec<DiscoveredAdvertisement>>,
}

impl RecordingDiscoveryListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advertisements(&self) -> Vec<DiscoveredAdvertisement> {
        self.received.lock().clone()
    }
}

impl DiscoveryListener for RecordingDiscoveryListener {
    fn on_discovery(&self, response: DiscoveryResponse) {
        self.received.lock().extend(response.advertisements);
    }
}
