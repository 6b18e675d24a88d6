//! Key material model: `PublicKey` / `KeyData`.
//!
//! libzypp's `KeyRing` wraps full OpenPGP keys; this crate deliberately
//! swaps that for Ed25519 `VerifyingKey` wrapped in the same
//! `{fingerprint, key-id, subkey ids, name, created}` shape, grounded in
//! how `assay-registry::trust` models a `TrustStore` entry around
//! `ed25519_dalek::VerifyingKey` plus `pkcs8`-encoded key ids.

use ed25519_dalek::{Signature, VerifyingKey};
use pkcs8::{DecodePublicKey, EncodePublicKey};
use sha2::{Digest, Sha256};

use crate::error::{KeyringError, KeyringResult};

/// Minimum length (hex characters) a key id must have to be treated as
/// "safe" rather than a GPG-style short id. Full fingerprints in this
/// crate are 64 hex characters (SHA-256 of the key's DER encoding); this
/// threshold only needs to reject GPG-style 8/16-character short ids
/// smuggled in through a buddy-keys list or a signature sidecar.
pub const MIN_SAFE_ID_LEN: usize = 32;

/// Whether `id` is long enough to be trusted as a full key identifier
/// rather than a collision-prone short id.
pub fn is_safe_id(id: &str) -> bool {
    id.len() >= MIN_SAFE_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A public key's identifying metadata, without the key material itself —
/// what [`crate::KeyRing`] enumeration returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// Full fingerprint: SHA-256 of the key's DER encoding, hex-encoded.
    pub fingerprint: String,
    /// The safe (long) id this key is looked up by. Equal to
    /// [`Self::fingerprint`] for a primary key.
    pub key_id: String,
    /// Additional ids (subkeys, or historical ids this key material also
    /// answers to) that [`crate::KeyRing::provides_key`] also matches.
    pub subkey_ids: Vec<String>,
    /// Human-readable name/comment, as supplied at import time.
    pub name: String,
    /// Unix timestamp the key was created/imported at.
    pub created: i64,
}

/// A public key together with its verifying key material, as imported,
/// exported, or matched against a signature.
#[derive(Debug, Clone)]
pub struct KeyData {
    pub meta: PublicKey,
    pub verifying_key: VerifyingKey,
}

impl KeyData {
    /// Wrap `verifying_key` with metadata, computing the fingerprint from
    /// its DER encoding.
    pub fn new(name: impl Into<String>, verifying_key: VerifyingKey, created: i64) -> KeyringResult<Self> {
        let der = verifying_key
            .to_public_key_der()
            .map_err(|e| KeyringError::Malformed(e.to_string()))?;
        let fingerprint = hex::encode(Sha256::digest(der.as_bytes()));
        Ok(Self {
            meta: PublicKey {
                fingerprint: fingerprint.clone(),
                key_id: fingerprint,
                subkey_ids: Vec::new(),
                name: name.into(),
                created,
            },
            verifying_key,
        })
    }

    /// Decode a key from its DER-encoded `SubjectPublicKeyInfo` bytes, as
    /// fetched from a `gpgkey=` URL or the pubkey cache.
    pub fn from_der(der: &[u8], name: impl Into<String>, created: i64) -> KeyringResult<Self> {
        let verifying_key =
            VerifyingKey::from_public_key_der(der).map_err(|e| KeyringError::Malformed(e.to_string()))?;
        Self::new(name, verifying_key, created)
    }

    /// Re-encode this key's material as DER, for export or on-disk
    /// persistence.
    pub fn to_der(&self) -> KeyringResult<Vec<u8>> {
        self.verifying_key
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| KeyringError::Malformed(e.to_string()))
    }

    /// Whether `id` names this key's primary id or one of its subkey ids.
    pub fn provides(&self, id: &str) -> bool {
        self.meta.key_id == id || self.meta.subkey_ids.iter().any(|s| s == id)
    }
}

/// A detached signature sidecar: the wire format internal to this core
/// — first line is the hex-encoded signing key id,
/// second line is the base64-encoded Ed25519 signature over the signed
/// file's raw bytes. No GPG packet parsing is performed.
#[derive(Debug, Clone)]
pub struct DetachedSignature {
    pub key_id: String,
    pub signature: Signature,
}

impl DetachedSignature {
    /// Parse a detached-signature sidecar's raw bytes.
    pub fn parse(bytes: &[u8]) -> KeyringResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| KeyringError::Malformed(e.to_string()))?;
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let key_id = lines
            .next()
            .ok_or_else(|| KeyringError::Malformed("empty signature file".to_string()))?
            .to_string();
        let sig_b64 = lines
            .next()
            .ok_or_else(|| KeyringError::Malformed("signature file missing signature line".to_string()))?;

        use base64::{engine::general_purpose::STANDARD, Engine};
        let sig_bytes = STANDARD
            .decode(sig_b64)
            .map_err(|e| KeyringError::Malformed(format!("invalid base64 signature: {e}")))?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|e| KeyringError::Malformed(format!("invalid signature bytes: {e}")))?;

        Ok(Self { key_id, signature })
    }
}
