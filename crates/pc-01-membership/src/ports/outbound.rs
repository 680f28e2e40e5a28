//! # Driven Ports (Outbound SPI)
//!
//! What this subsystem requires from the overlay transport and the host.

use crate::domain::{
    Advertisement, AdvertisementFilter, DirectoryError, DiscoveryQuery, DiscoveryResponse,
    IdentityConfig, MembershipConfig, MembershipError, PeerIdentity, PeerRole, Timestamp,
};
use std::sync::Arc;
use std::time::Duration;

/// Publish/query primitive for discoverable records.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. `query_async` returns immediately;
/// results arrive later on the listener, possibly on another thread,
/// possibly more than once, possibly after the caller has shut down.
/// Callers never hold their own locks across these calls, so an
/// implementation may deliver synchronously.
pub trait AdvertisementDirectory: Send + Sync {
    /// True if the directory can currently be reached.
    fn is_reachable(&self) -> bool;

    /// Publish `adv`, replacing any record with the same key.
    ///
    /// `ttl = None` publishes without expiration.
    fn publish(&self, adv: Advertisement, ttl: Option<Duration>) -> Result<(), DirectoryError>;

    /// Withdraw a previously published record.
    fn unpublish(&self, adv: &Advertisement) -> Result<(), DirectoryError>;

    /// Drop cached records matching `filter`. Returns how many were dropped.
    fn flush_local(&self, filter: &AdvertisementFilter) -> Result<usize, DirectoryError>;

    /// Start an asynchronous lookup. Results go to `listener`.
    fn query_async(
        &self,
        query: DiscoveryQuery,
        listener: Arc<dyn DiscoveryListener>,
    ) -> Result<(), DirectoryError>;
}

/// Completion handle for asynchronous discovery.
///
/// Must tolerate concurrent, reordered and duplicated delivery.
pub trait DiscoveryListener: Send + Sync {
    fn on_discovery(&self, response: DiscoveryResponse);
}

/// Loads or mints the local peer identity.
pub trait IdentityStore: Send + Sync {
    /// Load the single persisted identity, or mint one from the login name
    /// and `seed` if none exists.
    ///
    /// # Errors
    ///
    /// `ConflictingIdentity` if more than one identity is persisted, or a
    /// keystore error if the key material cannot be unlocked or created.
    fn load_or_create_identity(
        &self,
        seed: &str,
        role: PeerRole,
    ) -> Result<PeerIdentity, MembershipError>;
}

/// Configuration source.
pub trait ConfigProvider: Send + Sync {
    fn membership_config(&self) -> MembershipConfig;

    fn identity_config(&self) -> IdentityConfig;
}

/// Abstract interface for time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}
