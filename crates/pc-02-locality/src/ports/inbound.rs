//! # Driving Ports (Inbound API)

use pc_01_membership::PeerId;

/// Locality queries used when placing replicas.
///
/// # Example
///
/// ```rust,ignore
/// use pc_02_locality::ports::PlacementTopology;
///
/// // Prefer a replica target outside the writer's own domain.
/// fn remote_target<T: PlacementTopology>(topology: &T, writer_domain: &str) -> Option<PeerId> {
///     topology.choose_random(&format!("~{writer_domain}"))
/// }
/// ```
pub trait PlacementTopology: Send + Sync {
    /// Uniform pick among members of the domains `spec` selects.
    ///
    /// `spec` is a domain id, or `~id` for every domain except `id`.
    /// Returns `None` if no member matches or `spec` is empty.
    fn choose_random(&self, spec: &str) -> Option<PeerId>;

    /// 1 same domain, 2 if exactly one side is in the default domain, 3 otherwise.
    fn distance(&self, a: &PeerId, b: &PeerId) -> u8;

    fn is_on_same_domain(&self, a: &PeerId, b: &PeerId) -> bool;

    fn contains(&self, peer_id: &PeerId) -> bool;
}
