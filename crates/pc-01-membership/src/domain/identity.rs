//! Peer identity: id, role and Ed25519 key pair.

use super::entities::{PeerId, PeerRole};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Derive a stable peer id from a login name and role seed.
///
/// Same inputs always yield the same id: lowercase hex of
/// `SHA-256(login_name || seed)`.
pub fn derive_peer_id(login_name: &str, seed: &str) -> PeerId {
    let mut hasher = Sha256::new();
    hasher.update(login_name.as_bytes());
    hasher.update(seed.as_bytes());
    PeerId::new(hex::encode(hasher.finalize()))
}

/// Identity of the local peer. Immutable once minted.
pub struct PeerIdentity {
    peer_id: PeerId,
    role: PeerRole,
    signing_key: SigningKey,
}

impl PeerIdentity {
    pub fn new(peer_id: PeerId, role: PeerRole, signing_key: SigningKey) -> Self {
        Self {
            peer_id,
            role,
            signing_key,
        }
    }

    /// Mint a fresh identity with a random key pair.
    pub fn generate(peer_id: PeerId, role: PeerRole) -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self::new(peer_id, role, signing_key)
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.verifying_key().verify(message, signature).is_ok()
    }

    /// Public half of the identity, as written to the certificate file.
    pub fn certificate(&self) -> Certificate {
        Certificate {
            peer_id: self.peer_id.clone(),
            role: self.role,
            public_key: hex::encode(self.verifying_key().to_bytes()),
        }
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerIdentity")
            .field("peer_id", &self.peer_id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Public identity record persisted as `<peer_id>.crt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub peer_id: PeerId,
    pub role: PeerRole,
    /// Hex-encoded Ed25519 verifying key.
    pub public_key: String,
}

impl Certificate {
    /// True if `signing_key` is the secret half of this certificate.
    pub fn matches(&self, signing_key: &SigningKey) -> bool {
        hex::encode(signing_key.verifying_key().to_bytes()) == self.public_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_id_is_deterministic() {
        let a = derive_peer_id("alice", "storage");
        let b = derive_peer_id("alice", "storage");
        let c = derive_peer_id("alice", "coordinator");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_sign_and_verify() {
        let identity = PeerIdentity::generate(PeerId::new("p1"), PeerRole::Storage);
        let sig = identity.sign(b"presence");
        assert!(identity.verify(b"presence", &sig));
        assert!(!identity.verify(b"tampered", &sig));
    }

    #[test]
    fn test_certificate_matches_own_key_only() {
        let identity = PeerIdentity::generate(PeerId::new("p1"), PeerRole::Storage);
        let other = SigningKey::generate(&mut rand::thread_rng());
        let cert = identity.certificate();
        assert!(cert.matches(&SigningKey::from_bytes(&identity.secret_bytes())));
        assert!(!cert.matches(&other));
    }

    #[test]
    fn test_debug_hides_key() {
        let identity = PeerIdentity::generate(PeerId::new("p1"), PeerRole::Storage);
        let rendered = format!("{identity:?}");
        assert!(rendered.contains("p1"));
        assert!(!rendered.contains("signing_key"));
    }
}
