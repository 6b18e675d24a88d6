//! The `PackageError` taxonomy for individual package retrieval:
//! wraps the leaf crates' errors plus the checksum/delta/user-decision
//! failures unique to [`crate::PackageProvider::provide`].

use std::path::PathBuf;

use pkgrepo_keyring::KeyringError;
use pkgrepo_provider::ProviderError;

/// Errors surfaced by [`crate::PackageProvider::provide`].
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// A `Provider` call failed (network/IO at the transport layer).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The package's or delta's signature failed verification.
    #[error(transparent)]
    Keyring(#[from] KeyringError),

    /// Underlying filesystem I/O error not already wrapped by a leaf crate.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The delivered file's digest did not match the recorded checksum, and
    /// the user declined (or no reporter was asked) to accept it anyway.
    #[error("checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: String, got: String },

    /// Delta reconstruction was attempted but the platform helper could not
    /// produce a usable result.
    #[error("delta reconstruction failed: {detail}")]
    DeltaApplyFailed { detail: String },

    /// The user declined to proceed with `operation`.
    #[error("user rejected: {operation}")]
    UserRejected { operation: String },

    /// The user explicitly aborted `operation`.
    #[error("aborted by user: {operation}")]
    UserAbort { operation: String },

    /// The outer retry loop gave up after its retry budget was exhausted.
    #[error("giving up on '{operation}' after {attempts} attempt(s)")]
    RetriesExhausted { operation: String, attempts: u32 },

    /// The reporter asked the user to retry a failed signature check
    /// (`ProblemResponse::Retry`); feeds back into the outer retry loop
    /// rather than aborting the whole `provide` call.
    #[error("retrying signature check for '{operation}': {detail}")]
    SignatureRetry { operation: String, detail: String },
}

impl PackageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code this error should map to in a CLI front end: `1` generic,
    /// `2` bad arguments, `3` not found, `4` already exists, `5` locked,
    /// `6` signature rejected, `7` cancelled.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Provider(_) => 1,
            Self::Keyring(_) => 6,
            Self::Io { .. } => 1,
            Self::ChecksumMismatch { .. } => 6,
            Self::DeltaApplyFailed { .. } => 1,
            Self::UserRejected { .. } => 1,
            Self::UserAbort { .. } => 7,
            Self::RetriesExhausted { .. } => 1,
            Self::SignatureRetry { .. } => 6,
        }
    }

    /// Whether retrying the same `provide` call might succeed without
    /// operator intervention. Signature and user-decision failures are
    /// deliberately excluded: the outer retry loop "captures network/IO and
    /// file-check exceptions separately from the signature sub-exception"
    /// and must not re-prompt for a decision already made. `SignatureRetry`
    /// is the one signature failure that is retryable, since it only
    /// exists because the user (via `ProblemResponse::Retry`) asked for
    /// exactly that.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Io { .. } | Self::ChecksumMismatch { .. } | Self::SignatureRetry { .. } => true,
            Self::Keyring(_)
            | Self::DeltaApplyFailed { .. }
            | Self::UserRejected { .. }
            | Self::UserAbort { .. }
            | Self::RetriesExhausted { .. } => false,
        }
    }
}

/// Result alias for package retrieval operations.
pub type PackageResult<T> = Result<T, PackageError>;
