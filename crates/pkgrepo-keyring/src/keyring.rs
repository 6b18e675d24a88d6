//! The two-ring [`KeyRing`]: trusted and general public key sets, import,
//! export, enumeration, and file verification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::error::{KeyringError, KeyringResult, SignatureErrorKind};
use crate::key::{is_safe_id, DetachedSignature, KeyData, PublicKey};
use crate::store::RingStore;

/// Which logical ring an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ring {
    Trusted,
    General,
}

struct RingState {
    store: RingStore,
    keys: Mutex<HashMap<String, KeyData>>,
}

impl RingState {
    fn open(dir: impl Into<PathBuf>) -> KeyringResult<Self> {
        let store = RingStore::open(dir)?;
        let keys = store.load()?;
        Ok(Self {
            store,
            keys: Mutex::new(keys),
        })
    }

    fn persist(&self) -> KeyringResult<()> {
        let keys = self.keys.lock().expect("keyring mutex poisoned");
        self.store.save(&keys)
    }
}

/// Trusted and general key rings, each durable under its own directory.
///
/// Import into the trusted ring also registers the key into the general
/// ring.
pub struct KeyRing {
    trusted: RingState,
    general: RingState,
}

impl KeyRing {
    /// Open (creating directories as needed) the two rings rooted at
    /// `trusted_dir`/`general_dir`.
    pub fn open(trusted_dir: impl AsRef<Path>, general_dir: impl AsRef<Path>) -> KeyringResult<Self> {
        Ok(Self {
            trusted: RingState::open(trusted_dir.as_ref())?,
            general: RingState::open(general_dir.as_ref())?,
        })
    }

    fn ring_state(&self, ring: Ring) -> &RingState {
        match ring {
            Ring::Trusted => &self.trusted,
            Ring::General => &self.general,
        }
    }

    /// Import `key`. If `trusted` is set, the key is added to both rings.
    pub fn import_key(&self, key: KeyData, trusted: bool) -> KeyringResult<()> {
        if !is_safe_id(&key.meta.key_id) {
            return Err(KeyringError::UnsafeId(key.meta.key_id.clone()));
        }
        {
            let mut general = self.general.keys.lock().expect("keyring mutex poisoned");
            general.insert(key.meta.key_id.clone(), key.clone());
        }
        self.general.persist()?;

        if trusted {
            let mut trusted_keys = self.trusted.keys.lock().expect("keyring mutex poisoned");
            trusted_keys.insert(key.meta.key_id.clone(), key.clone());
            drop(trusted_keys);
            self.trusted.persist()?;
            info!(key_id = %key.meta.key_id, "imported key into trusted ring");
        } else {
            debug!(key_id = %key.meta.key_id, "imported key into general ring");
        }
        Ok(())
    }

    /// Remove a key from `ring`.
    pub fn delete_key(&self, id: &str, trusted: bool) -> KeyringResult<()> {
        let ring = if trusted { Ring::Trusted } else { Ring::General };
        let state = self.ring_state(ring);
        {
            let mut keys = state.keys.lock().expect("keyring mutex poisoned");
            if keys.remove(id).is_none() {
                return Err(KeyringError::NotFound(id.to_string()));
            }
        }
        state.persist()
    }

    /// Whether a key with `id` exists in `ring` (exact id match, not
    /// subkey-aware — see [`Self::provides_key`] for that).
    pub fn public_key_exists(&self, id: &str, ring: Ring) -> bool {
        self.ring_state(ring)
            .keys
            .lock()
            .expect("keyring mutex poisoned")
            .contains_key(id)
    }

    /// Whether any key in `ring` provides `id` as a primary or subkey id.
    pub fn provides_key(&self, id: &str, ring: Ring) -> bool {
        self.ring_state(ring)
            .keys
            .lock()
            .expect("keyring mutex poisoned")
            .values()
            .any(|k| k.provides(id))
    }

    /// Export a copy of key material for `id` from `ring`.
    pub fn export_key(&self, id: &str, ring: Ring) -> KeyringResult<KeyData> {
        self.ring_state(ring)
            .keys
            .lock()
            .expect("keyring mutex poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| KeyringError::NotFound(id.to_string()))
    }

    /// Read the signing key id out of a detached-signature sidecar's
    /// bytes.
    pub fn read_signature_key_id(&self, signature_path: &Path, signature_bytes: &[u8]) -> KeyringResult<String> {
        DetachedSignature::parse(signature_bytes)
            .map(|sig| sig.key_id)
            .map_err(|e| KeyringError::CannotReadSignature {
                path: signature_path.to_path_buf(),
                detail: e.to_string(),
            })
    }

    /// Verify `file_bytes` against `signature_bytes` using whichever key in
    /// `ring` the signature names. Returns `Ok(true)` only if the key is
    /// present in `ring` and the signature is cryptographically valid.
    pub fn verify_file(&self, file_bytes: &[u8], signature_bytes: &[u8], ring: Ring) -> KeyringResult<bool> {
        let sig = DetachedSignature::parse(signature_bytes)?;
        let keys = self.ring_state(ring).keys.lock().expect("keyring mutex poisoned");
        let Some(key) = keys.values().find(|k| k.provides(&sig.key_id)) else {
            return Ok(false);
        };
        use ed25519_dalek::Verifier;
        Ok(key.verifying_key.verify(file_bytes, &sig.signature).is_ok())
    }

    /// Whether `id` is present (primary or subkey) in the trusted ring.
    pub fn is_key_trusted(&self, id: &str) -> bool {
        self.provides_key(id, Ring::Trusted)
    }

    /// Whether `id` is present (primary or subkey) in either ring.
    pub fn is_key_known(&self, id: &str) -> bool {
        self.provides_key(id, Ring::Trusted) || self.provides_key(id, Ring::General)
    }

    /// Metadata for every key in the trusted ring.
    pub fn trusted_keys(&self) -> Vec<PublicKey> {
        self.trusted
            .keys
            .lock()
            .expect("keyring mutex poisoned")
            .values()
            .map(|k| k.meta.clone())
            .collect()
    }

    /// Metadata for every key in the general ring.
    pub fn general_keys(&self) -> Vec<PublicKey> {
        self.general
            .keys
            .lock()
            .expect("keyring mutex poisoned")
            .values()
            .map(|k| k.meta.clone())
            .collect()
    }

    /// Find a key providing `id`, preferring the trusted ring, applying the
    /// trusted-ring refresh rule along the way.
    pub fn resolve_signing_key(&self, id: &str) -> KeyringResult<Option<(KeyData, bool)>> {
        self.refresh_trusted_from_general(id)?;

        if let Some(key) = self
            .trusted
            .keys
            .lock()
            .expect("keyring mutex poisoned")
            .values()
            .find(|k| k.provides(id))
            .cloned()
        {
            return Ok(Some((key, true)));
        }
        if let Some(key) = self
            .general
            .keys
            .lock()
            .expect("keyring mutex poisoned")
            .values()
            .find(|k| k.provides(id))
            .cloned()
        {
            return Ok(Some((key, false)));
        }
        Ok(None)
    }

    /// Refresh a trusted key from the general ring only on a
    /// strictly-newer `created` timestamp for the *same fingerprint*.
    /// A general-ring entry that only adds subkeys, without a newer
    /// `created` on the same fingerprint, is left alone — it is a new-key
    /// candidate for the untrusted-key acceptance flow, not a silent
    /// update.
    fn refresh_trusted_from_general(&self, id: &str) -> KeyringResult<()> {
        let general_match = self
            .general
            .keys
            .lock()
            .expect("keyring mutex poisoned")
            .values()
            .find(|k| k.provides(id))
            .cloned();
        let Some(general_key) = general_match else {
            return Ok(());
        };

        let mut trusted_keys = self.trusted.keys.lock().expect("keyring mutex poisoned");
        let Some(trusted_key) = trusted_keys.get(&general_key.meta.key_id) else {
            return Ok(());
        };
        if trusted_key.meta.fingerprint == general_key.meta.fingerprint
            && general_key.meta.created > trusted_key.meta.created
        {
            info!(key_id = %general_key.meta.key_id, "refreshing trusted key from general ring");
            trusted_keys.insert(general_key.meta.key_id.clone(), general_key.clone());
            drop(trusted_keys);
            self.trusted.persist()?;
        } else {
            warn!(
                key_id = %general_key.meta.key_id,
                "general ring entry differs from trusted key without a newer same-fingerprint timestamp; \
                 treating as a new-key candidate"
            );
        }
        Ok(())
    }

    /// `signature()`-kind error helper for callers that need to surface
    /// the `SignatureError` taxonomy from a workflow step.
    pub fn signature_error(kind: SignatureErrorKind) -> KeyringError {
        KeyringError::signature(kind)
    }
}
