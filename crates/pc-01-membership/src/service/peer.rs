use super::context::PeerContext;
use super::listeners::ListenerRegistry;
use crate::domain::{
    Advertisement, AdvertisementFilter, AdvertisementKind, ClusterEvent, DiscoveryQuery, Endpoint,
    MembershipConfig, MembershipError, MembershipTable, PeerId, PeerRole, ServiceName,
    SweepOutcome,
};
use crate::ports::{
    AdvertisementDirectory, DiscoveryListener, EventListener, IdentityStore, MembershipApi,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A locally owned advertisement and the TTL it is republished with.
#[derive(Debug, Clone)]
struct OwnedAdvertisement {
    advertisement: Advertisement,
    ttl: Option<Duration>,
}

/// Endpoints and coordinator bookkeeping, guarded separately from membership.
#[derive(Debug, Default)]
struct RoutingState {
    local_endpoints: Vec<OwnedAdvertisement>,
    coordinators: Vec<PeerId>,
    coordinator_rpc: Option<Endpoint>,
    misconfigured: bool,
}

/// Base peer: identity, membership table and resolved endpoints.
///
/// Role behavior lives in [`super::CoordinatorPeer`] and
/// [`super::StoragePeer`]; both wrap an `Arc<Peer>`.
pub struct Peer {
    role: PeerRole,
    seed: String,
    config: MembershipConfig,
    directory: Arc<dyn AdvertisementDirectory>,
    identity_store: Arc<dyn IdentityStore>,
    context: OnceLock<Arc<PeerContext>>,
    /// Members and suspects share this one lock.
    membership: Mutex<MembershipTable>,
    routing: RwLock<RoutingState>,
    running: AtomicBool,
    listeners: ListenerRegistry,
}

impl Peer {
    /// Create an uninitialized peer with an empty membership table.
    pub fn new(
        role: PeerRole,
        seed: impl Into<String>,
        config: MembershipConfig,
        directory: Arc<dyn AdvertisementDirectory>,
        identity_store: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            role,
            seed: seed.into(),
            config,
            directory,
            identity_store,
            context: OnceLock::new(),
            membership: Mutex::new(MembershipTable::new()),
            routing: RwLock::new(RoutingState::default()),
            running: AtomicBool::new(false),
            listeners: ListenerRegistry::new(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bootstrap identity and announce this peer.
    ///
    /// 1. Load or mint the identity.
    /// 2. Check the directory is reachable.
    /// 3. Purge stale presence records this peer left behind.
    /// 4. Publish fresh presence and both service endpoints.
    ///
    /// Any failure leaves the peer uninitialized. Calling this again on an
    /// initialized peer returns the existing context.
    pub fn initialize(&self) -> Result<Arc<PeerContext>, MembershipError> {
        if let Some(existing) = self.context.get() {
            return Ok(Arc::clone(existing));
        }

        let identity = self
            .identity_store
            .load_or_create_identity(&self.seed, self.role)?;
        let peer_id = identity.peer_id().clone();

        if !self.directory.is_reachable() {
            error!(peer_id = %peer_id, "advertisement directory unreachable at bootstrap");
            return Err(crate::domain::DirectoryError::Unreachable.into());
        }

        let stale = self.directory.flush_local(
            &AdvertisementFilter::kind(AdvertisementKind::PeerPresence).with_owner(peer_id.clone()),
        )?;
        if stale > 0 {
            debug!(peer_id = %peer_id, stale, "purged stale presence advertisements");
        }

        let ttl = Some(self.config.advertisement_ttl());
        self.directory
            .publish(Advertisement::presence(peer_id.clone(), self.role), ttl)?;

        let endpoints: Vec<OwnedAdvertisement> = [ServiceName::Rpc, ServiceName::Data]
            .into_iter()
            .map(|service| OwnedAdvertisement {
                advertisement: Advertisement::endpoint(peer_id.clone(), service),
                ttl,
            })
            .collect();
        for owned in &endpoints {
            self.directory.publish(owned.advertisement.clone(), owned.ttl)?;
        }

        let context = Arc::new(PeerContext::new(identity, self.config.clone()));
        let context = Arc::clone(self.context.get_or_init(|| context));
        {
            let mut routing = self.routing.write();
            routing.local_endpoints = endpoints;
            // A coordinator counts itself, so any rival it discovers is a second one.
            if self.role == PeerRole::Coordinator && !routing.coordinators.contains(&peer_id) {
                routing.coordinators.insert(0, peer_id.clone());
            }
        }
        self.running.store(true, Ordering::SeqCst);

        info!(peer_id = %peer_id, role = %self.role, "peer initialized");
        Ok(context)
    }

    /// Stop accepting callbacks. Late discovery responses are ignored.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(peer_id = ?self.peer_id(), "peer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> Result<&Arc<PeerContext>, MembershipError> {
        self.context.get().ok_or(MembershipError::NotInitialized)
    }

    pub fn peer_id(&self) -> Option<&PeerId> {
        self.context.get().map(|ctx| ctx.peer_id())
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    pub(crate) fn directory(&self) -> &Arc<dyn AdvertisementDirectory> {
        &self.directory
    }

    fn is_self(&self, peer_id: &PeerId) -> bool {
        self.peer_id() == Some(peer_id)
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.register(listener);
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Record a first sighting. Fires `PeerJoined` if the peer was new.
    pub fn admit(&self, peer_id: PeerId) -> bool {
        if self.is_self(&peer_id) {
            return false;
        }
        let added = self.membership.lock().insert(peer_id.clone());
        if added {
            info!(peer_id = %peer_id, "peer joined");
            self.listeners.fire(&ClusterEvent::PeerJoined { peer_id });
        }
        added
    }

    /// Drop a member. Fires `PeerDeparted` if it was one.
    pub fn evict(&self, peer_id: &PeerId) -> bool {
        let removed = self.membership.lock().remove(peer_id);
        if removed {
            info!(peer_id = %peer_id, "peer left");
            self.listeners.fire(&ClusterEvent::PeerDeparted {
                peer_id: peer_id.clone(),
            });
        }
        removed
    }

    /// Clear the suspect entry of a member that was seen again.
    pub fn confirm(&self, peer_id: &PeerId) -> bool {
        let cleared = self.membership.lock().confirm(peer_id);
        if cleared {
            debug!(peer_id = %peer_id, "suspect confirmed alive");
        }
        cleared
    }

    /// Bind a member's endpoint. Ignored for non-members.
    pub fn bind_endpoint(&self, endpoint: Endpoint) -> bool {
        self.membership.lock().bind_endpoint(endpoint)
    }

    /// True if the peer is a member whose endpoint is still unresolved.
    pub fn needs_endpoint(&self, peer_id: &PeerId) -> bool {
        let table = self.membership.lock();
        table.contains(peer_id) && table.endpoint(peer_id).is_none()
    }

    /// Run one sweep of the state machine under the membership lock.
    pub(crate) fn sweep_membership(&self) -> SweepOutcome {
        self.membership.lock().sweep(self.config.retry_limit)
    }

    /// Read access to the table for diagnostics and tests.
    pub fn with_membership<R>(&self, f: impl FnOnce(&MembershipTable) -> R) -> R {
        f(&self.membership.lock())
    }

    // =========================================================================
    // Coordinators and endpoints
    // =========================================================================

    /// Record a coordinator presence.
    ///
    /// Returns `Ok(true)` for the first coordinator, `Ok(false)` for one
    /// already known. A second distinct coordinator is a misconfiguration.
    pub fn record_coordinator(&self, peer_id: PeerId) -> Result<bool, MembershipError> {
        let mut routing = self.routing.write();
        if routing.coordinators.contains(&peer_id) {
            return Ok(false);
        }
        match routing.coordinators.first().cloned() {
            None => {
                routing.coordinators.push(peer_id);
                Ok(true)
            }
            Some(first) => {
                routing.coordinators.push(peer_id.clone());
                routing.misconfigured = true;
                Err(MembershipError::MultipleCoordinators {
                    first,
                    second: peer_id,
                })
            }
        }
    }

    pub fn coordinators(&self) -> Vec<PeerId> {
        self.routing.read().coordinators.clone()
    }

    /// True once more than one coordinator has been observed.
    pub fn misconfigured(&self) -> bool {
        self.routing.read().misconfigured
    }

    /// Bind the coordinator RPC endpoint. Only the single known coordinator is accepted.
    pub fn bind_coordinator_endpoint(&self, endpoint: Endpoint) -> bool {
        let mut routing = self.routing.write();
        if routing.coordinators.len() != 1 || routing.coordinators[0] != endpoint.peer_id {
            return false;
        }
        routing.coordinator_rpc = Some(endpoint);
        true
    }

    pub fn coordinator_endpoint(&self) -> Option<Endpoint> {
        self.routing.read().coordinator_rpc.clone()
    }

    /// This peer's own endpoint for `service`, once initialized.
    pub fn local_endpoint(&self, service: ServiceName) -> Option<Endpoint> {
        self.routing
            .read()
            .local_endpoints
            .iter()
            .filter_map(|owned| owned.advertisement.as_endpoint())
            .find(|endpoint| endpoint.service == service)
    }

    /// Bulk-data endpoint of a live member.
    pub fn data_endpoint_for(&self, peer_id: &PeerId) -> Result<Endpoint, MembershipError> {
        if !self.is_alive(peer_id) {
            return Err(MembershipError::PeerNotFound(peer_id.clone()));
        }
        Ok(Endpoint::well_known(peer_id.clone(), ServiceName::Data))
    }

    /// Republish `service`'s endpoint without expiration.
    pub fn pin_endpoint(&self, service: ServiceName) -> Result<(), MembershipError> {
        let advertisement = {
            let mut routing = self.routing.write();
            let owned = routing
                .local_endpoints
                .iter_mut()
                .find(|owned| {
                    owned
                        .advertisement
                        .as_endpoint()
                        .is_some_and(|ep| ep.service == service)
                })
                .ok_or(MembershipError::NotInitialized)?;
            owned.ttl = None;
            owned.advertisement.clone()
        };
        self.directory.publish(advertisement, None)?;
        Ok(())
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Fire-and-forget discovery. Failures are logged and dropped.
    pub fn request_advertisements(&self, query: DiscoveryQuery, listener: Arc<dyn DiscoveryListener>) {
        if !self.is_running() {
            debug!(filter = ?query.filter, "discovery skipped, peer not running");
            return;
        }
        if let Err(e) = self.directory.query_async(query, listener) {
            warn!(error = %e, "discovery request failed");
        }
    }

    /// Refresh presence and endpoint records.
    pub fn republish(&self) -> Result<(), MembershipError> {
        let ctx = self.context()?;
        self.directory.publish(
            Advertisement::presence(ctx.peer_id().clone(), self.role),
            Some(self.config.advertisement_ttl()),
        )?;
        let endpoints = self.routing.read().local_endpoints.clone();
        for owned in endpoints {
            self.directory.publish(owned.advertisement, owned.ttl)?;
        }
        Ok(())
    }
}

impl MembershipApi for Peer {
    fn is_alive(&self, peer_id: &PeerId) -> bool {
        self.membership.lock().contains(peer_id)
    }

    fn resolve_endpoint(&self, peer_id: &PeerId) -> Result<Endpoint, MembershipError> {
        {
            let table = self.membership.lock();
            if table.contains(peer_id) {
                return table
                    .endpoint(peer_id)
                    .cloned()
                    .ok_or_else(|| MembershipError::EndpointUnresolved(peer_id.clone()));
            }
        }
        if self.is_self(peer_id) {
            if let Some(own) = self.local_endpoint(ServiceName::Rpc) {
                return Ok(own);
            }
        }
        match self.coordinator_endpoint() {
            Some(endpoint) if &endpoint.peer_id == peer_id => Ok(endpoint),
            _ => Err(MembershipError::PeerNotFound(peer_id.clone())),
        }
    }

    fn members(&self) -> Vec<PeerId> {
        self.membership.lock().members()
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("role", &self.role)
            .field("peer_id", &self.peer_id())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
