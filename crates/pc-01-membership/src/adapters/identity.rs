//! Identity stores.
//!
//! On-disk layout under the instance root:
//!
//! ```text
//! <root>/cert/<peer_id>.crt   public certificate (JSON)
//! <root>/keystore             AEAD-sealed secret keys (JSON)
//! <root>/cm/                  overlay cache, wiped on every open
//! ```

use crate::domain::{
    derive_peer_id, Certificate, IdentityConfig, MembershipError, PeerId, PeerIdentity, PeerRole,
};
use crate::ports::IdentityStore;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use ed25519_dalek::SigningKey;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const CERT_DIR: &str = "cert";
const CERT_EXTENSION: &str = "crt";
const KEYSTORE_FILE: &str = "keystore";
const CACHE_DIR: &str = "cm";

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyStoreFile {
    entries: BTreeMap<String, KeyStoreEntry>,
}

/// Secret key sealed with XChaCha20-Poly1305 under a password-derived key.
/// The peer id is bound as associated data.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyStoreEntry {
    /// PBKDF2 salt, hex.
    salt: String,
    /// PBKDF2-HMAC-SHA256 iterations used for this entry.
    rounds: u32,
    /// 24-byte nonce, hex.
    nonce: String,
    /// Ciphertext and tag, hex.
    sealed_key: String,
}

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
#[cfg(not(test))]
const KDF_ROUNDS: u32 = 100_000;
#[cfg(test)]
const KDF_ROUNDS: u32 = 1_000;

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    bytes
}

fn sealing_key(password: &str, salt: &[u8], rounds: u32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key[..]);
    key
}

impl KeyStoreEntry {
    fn seal(
        password: &str,
        peer_id: &PeerId,
        secret: &Zeroizing<[u8; 32]>,
    ) -> Result<Self, MembershipError> {
        let salt = random_bytes::<SALT_LEN>();
        let nonce = random_bytes::<NONCE_LEN>();
        let key = sealing_key(password, &salt, KDF_ROUNDS);
        let cipher = XChaCha20Poly1305::new((&*key).into());
        let payload = Payload {
            msg: secret.as_slice(),
            aad: peer_id.as_str().as_bytes(),
        };
        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), payload)
            .map_err(|e| MembershipError::KeySealing(e.to_string()))?;
        Ok(Self {
            salt: hex::encode(salt),
            rounds: KDF_ROUNDS,
            nonce: hex::encode(nonce),
            sealed_key: hex::encode(sealed),
        })
    }

    /// `Ok(None)` when the password (or the bound peer id) does not open the entry.
    fn open(
        &self,
        password: &str,
        peer_id: &PeerId,
    ) -> Result<Option<Zeroizing<[u8; 32]>>, String> {
        let salt = hex::decode(&self.salt).map_err(|e| format!("salt: {e}"))?;
        let nonce: [u8; NONCE_LEN] = hex::decode(&self.nonce)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| "nonce is not 24 bytes".to_string())?;
        let sealed = hex::decode(&self.sealed_key).map_err(|e| format!("sealed key: {e}"))?;

        let key = sealing_key(password, &salt, self.rounds);
        let cipher = XChaCha20Poly1305::new((&*key).into());
        let payload = Payload {
            msg: sealed.as_slice(),
            aad: peer_id.as_str().as_bytes(),
        };
        let Ok(plain) = cipher.decrypt(XNonce::from_slice(&nonce), payload) else {
            return Ok(None);
        };
        let plain = Zeroizing::new(plain);
        let secret: [u8; 32] = plain
            .as_slice()
            .try_into()
            .map_err(|_| "sealed key is not 32 bytes".to_string())?;
        Ok(Some(Zeroizing::new(secret)))
    }
}

/// File-backed identity store with a password-protected keystore.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    root: PathBuf,
    login_name: String,
    password: String,
}

impl FileIdentityStore {
    #[must_use]
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            root: config.instance_root(),
            login_name: config.effective_login_name(),
            password: config.password.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cert_dir(&self) -> PathBuf {
        self.root.join(CERT_DIR)
    }

    fn keystore_path(&self) -> PathBuf {
        self.root.join(KEYSTORE_FILE)
    }

    fn wipe_cache(&self) -> Result<(), MembershipError> {
        match fs::remove_dir_all(self.root.join(CACHE_DIR)) {
            Ok(()) => {
                debug!(root = %self.root.display(), "removed stale overlay cache");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn certificate_files(&self) -> Result<Vec<PathBuf>, MembershipError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.cert_dir())? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == CERT_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_keystore(&self) -> Result<KeyStoreFile, MembershipError> {
        match fs::read_to_string(self.keystore_path()) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(KeyStoreFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_keystore(&self, keystore: &KeyStoreFile) -> Result<(), MembershipError> {
        fs::write(self.keystore_path(), serde_json::to_vec_pretty(keystore)?)?;
        Ok(())
    }

    fn mint(&self, seed: &str, role: PeerRole) -> Result<PeerIdentity, MembershipError> {
        let peer_id = derive_peer_id(&self.login_name, seed);
        let identity = PeerIdentity::generate(peer_id.clone(), role);

        let cert_path = self
            .cert_dir()
            .join(format!("{}.{CERT_EXTENSION}", peer_id.as_str()));
        fs::write(&cert_path, serde_json::to_vec_pretty(&identity.certificate())?)?;

        let mut keystore = self.read_keystore()?;
        let secret = Zeroizing::new(identity.secret_bytes());
        keystore.entries.insert(
            peer_id.as_str().to_string(),
            KeyStoreEntry::seal(&self.password, &peer_id, &secret)?,
        );
        self.write_keystore(&keystore)?;

        info!(peer_id = %peer_id, role = %role, "minted new peer identity");
        Ok(identity)
    }

    fn load(&self, cert_path: &Path, role: PeerRole) -> Result<PeerIdentity, MembershipError> {
        let malformed = |reason: String| MembershipError::MalformedIdentity {
            path: cert_path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(cert_path)?;
        let cert: Certificate =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        let stem = cert_path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(PeerId::parse)
            .ok_or_else(|| malformed("file name is not a peer id".into()))?;
        if stem != cert.peer_id {
            return Err(malformed(format!(
                "file name {stem} does not match certificate id {}",
                cert.peer_id
            )));
        }

        let keystore = self.read_keystore()?;
        let entry = keystore
            .entries
            .get(cert.peer_id.as_str())
            .ok_or_else(|| MembershipError::KeyMaterialMissing {
                peer_id: cert.peer_id.clone(),
            })?;
        let secret = entry
            .open(&self.password, &cert.peer_id)
            .map_err(malformed)?
            .ok_or_else(|| MembershipError::KeyStoreLocked {
                peer_id: cert.peer_id.clone(),
            })?;
        let signing_key = SigningKey::from_bytes(&secret);
        if !cert.matches(&signing_key) {
            return Err(malformed("keystore key does not match certificate".into()));
        }

        if cert.role != role {
            warn!(
                peer_id = %cert.peer_id,
                stored = %cert.role,
                requested = %role,
                "persisted identity has a different role; keeping stored role"
            );
        }

        debug!(peer_id = %cert.peer_id, "loaded peer identity");
        Ok(PeerIdentity::new(cert.peer_id, cert.role, signing_key))
    }
}

impl IdentityStore for FileIdentityStore {
    fn load_or_create_identity(
        &self,
        seed: &str,
        role: PeerRole,
    ) -> Result<PeerIdentity, MembershipError> {
        self.wipe_cache()?;
        fs::create_dir_all(self.cert_dir())?;

        let certificates = self.certificate_files()?;
        match certificates.as_slice() {
            [] => self.mint(seed, role),
            [single] => self.load(single, role),
            many => Err(MembershipError::ConflictingIdentity {
                count: many.len(),
                dir: self.cert_dir().display().to_string(),
            }),
        }
    }
}

// ============================================================================
// EphemeralIdentityStore - no persistence
// ============================================================================

/// Identity store that mints a derived id with a fresh key on every call.
///
/// For tests and in-process clusters where nothing should touch disk.
#[derive(Debug, Clone)]
pub struct EphemeralIdentityStore {
    login_name: String,
}

impl EphemeralIdentityStore {
    #[must_use]
    pub fn new(login_name: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
        }
    }
}

impl IdentityStore for EphemeralIdentityStore {
    fn load_or_create_identity(
        &self,
        seed: &str,
        role: PeerRole,
    ) -> Result<PeerIdentity, MembershipError> {
        Ok(PeerIdentity::generate(
            derive_peer_id(&self.login_name, seed),
            role,
        ))
    }
}
