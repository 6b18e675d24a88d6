//! The `ManagerError` taxonomy: wraps the leaf crates' errors plus the
//! manager-level failures (`SystemLocked`, `UserRejected`, `UserAbort`).

use std::path::PathBuf;

use pkgrepo_core::CoreError;
use pkgrepo_keyring::KeyringError;
use pkgrepo_mirrorlist::MirrorListError;
use pkgrepo_provider::ProviderError;
use pkgrepo_repoinfo::{RepoError, ServiceError};

/// Errors surfaced by [`crate::RepoManager`] and [`crate::CredentialManager`]
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// A repository-level failure.
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// A service-level failure, except
    /// `PluginInformational` which is warning-only and never constructed
    /// here as an error.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A `Provider` call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A mirrorlist fetch/parse failed and the repo has no baseUrls to fall
    /// back to.
    #[error(transparent)]
    MirrorList(#[from] MirrorListError),

    /// A keyring/signature operation failed.
    #[error(transparent)]
    Keyring(#[from] KeyringError),

    /// A `Context`/config/lock failure from `pkgrepo-core`, other than
    /// `CoreError::SystemLocked` which is promoted to `Self::SystemLocked`
    /// instead (see the `From<CoreError>` impl below).
    #[error(transparent)]
    Core(CoreError),

    /// Underlying filesystem I/O error not already wrapped by a leaf crate.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root is held by another live process.
    #[error("root is locked by process {pid:?} ({name})")]
    SystemLocked { pid: Option<u32>, name: String },

    /// A cached file's recorded digest did not match what was downloaded.
    #[error("checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: String, got: String },

    /// A `.repo`/`.service` file or cache entry failed to parse.
    #[error("parse error in {path}: {detail}")]
    ParseError { path: PathBuf, detail: String },

    /// The user declined to proceed with `operation`.
    #[error("user rejected: {operation}")]
    UserRejected { operation: String },

    /// The user explicitly aborted `operation`.
    #[error("aborted by user: {operation}")]
    UserAbort { operation: String },
}

/// Promotes `CoreError::SystemLocked` to `ManagerError::SystemLocked`
/// directly, rather than leaving it buried inside a transparent `Core(..)`
/// wrapper a caller would have to match through twice.
impl From<CoreError> for ManagerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SystemLocked { pid, name } => Self::SystemLocked { pid, name },
            other => Self::Core(other),
        }
    }
}

impl ManagerError {
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
            Self::Repo(RepoError::NotFound { .. }) | Self::Service(ServiceError::NotFound { .. }) => 3,
            Self::Repo(RepoError::AlreadyExists { .. }) | Self::Service(ServiceError::AlreadyExists { .. }) => 4,
            Self::Repo(RepoError::NoAlias | RepoError::InvalidAlias { .. } | RepoError::NoUrl { .. } | RepoError::UnknownType { .. })
            | Self::Service(
                ServiceError::NoAlias
                | ServiceError::InvalidAlias { .. }
                | ServiceError::NoUrl { .. }
                | ServiceError::PluginImmutable { .. },
            ) => 2,
            Self::Repo(_) | Self::Service(_) => 1,
            Self::Provider(_) | Self::MirrorList(_) => 1,
            Self::Keyring(_) => 6,
            Self::Core(_) => 1,
            Self::Io { .. } | Self::ParseError { .. } => 1,
            Self::SystemLocked { .. } => 5,
            Self::ChecksumMismatch { .. } => 6,
            Self::UserRejected { .. } => 1,
            Self::UserAbort { .. } => 7,
        }
    }

    /// Whether retrying the same operation might succeed without operator
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::MirrorList(MirrorListError::Provider(e)) => e.is_retryable(),
            Self::SystemLocked { .. } => true,
            Self::Core(CoreError::LockFailed { .. }) => true,
            _ => false,
        }
    }
}

/// Result alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;
