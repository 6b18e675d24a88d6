//! The `Signature{..}` error taxonomy plus this crate's own I/O
//! and malformed-data failures.

use std::path::PathBuf;

/// Kinds of signature failure in this crate's closed `SignatureError` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureErrorKind {
    /// The signing key could not be found in either ring, and no repo
    /// context could supply one.
    NoKey,
    /// A key was found but the signature bytes did not verify against it.
    BadSignature,
    /// The signature sidecar is not in a format this crate understands.
    UnknownType,
    /// A key was found and the signature verified, but the key is not in
    /// the trusted ring and the user declined to trust it.
    Untrusted,
    /// No signature file was present at all.
    NoSignature,
    /// The signature or content file could not be read.
    FileError,
}

/// Errors surfaced by [`crate::KeyRing`] operations.
#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    /// Underlying filesystem I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted key/index data did not parse.
    #[error("malformed keyring data: {0}")]
    Malformed(String),

    /// A lookup found no key with the given id in the requested ring.
    #[error("no key '{0}' in this ring")]
    NotFound(String),

    /// A key id shorter than the minimum safe length was rejected.
    #[error("key id '{0}' is too short to be trusted (short ids are rejected)")]
    UnsafeId(String),

    /// The detached signature sidecar could not be read or parsed.
    #[error("cannot read signature at {path}: {detail}")]
    CannotReadSignature { path: PathBuf, detail: String },

    /// A signature-checking operation produced one of this crate's
    /// `SignatureError` kinds.
    #[error("signature error: {kind:?}")]
    Signature { kind: SignatureErrorKind },
}

impl KeyringError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn signature(kind: SignatureErrorKind) -> Self {
        Self::Signature { kind }
    }
}

/// Result alias for keyring operations.
pub type KeyringResult<T> = Result<T, KeyringError>;
