//! The `Core{..}` error taxonomy: context lifecycle, configuration, locking,
//! and workflow-engine failures.

use std::path::PathBuf;

use pkgrepo_provider::ProviderError;

/// Errors that can occur while bringing up or using a [`crate::Context`].
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// `Context::init_target` was called on a context whose target is
    /// already initialized for a different root.
    #[error("target already initialized at {existing}")]
    AlreadyInitialized {
        /// The root the context was already initialized against.
        existing: PathBuf,
    },

    /// An operation that requires an initialized target was attempted
    /// before one.
    #[error("target is not initialized")]
    NotInitialized,

    /// The process-level exclusion lock could not be acquired for a reason
    /// other than contention with another live process (I/O failure, or a
    /// call site asserting a lock it does not actually hold).
    #[error("could not acquire exclusive lock on {path}: {detail}")]
    LockFailed {
        /// Path to the lock file.
        path: PathBuf,
        /// Human-readable detail.
        detail: String,
    },

    /// The root is held by another live process.
    #[error("root is locked by process {pid:?} ({name})")]
    SystemLocked {
        /// Pid of the process holding the lock, if it could be read.
        pid: Option<u32>,
        /// Name of the process holding the lock (`"unknown"` if it could
        /// not be resolved).
        name: String,
    },

    /// A config file could not be read or contained an invalid value.
    #[error("configuration error in {path}: {detail}")]
    Config {
        /// Path to the offending config file.
        path: PathBuf,
        /// Human-readable detail.
        detail: String,
    },

    /// Underlying filesystem I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the operation was attempted against.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A [`pkgrepo_provider::Provider`] call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl CoreError {
    /// Exit code this error should map to in a CLI front end: `1` generic,
    /// `2` bad arguments, `3` not found, `4` already exists, `5` locked,
    /// `6` signature rejected, `7` cancelled.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AlreadyInitialized { .. } => 4,
            Self::NotInitialized => 3,
            Self::Config { .. } => 2,
            Self::LockFailed { .. } | Self::SystemLocked { .. } => 5,
            Self::Io { .. } | Self::Provider(_) => 1,
        }
    }

    /// Whether retrying the same operation might succeed without operator
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LockFailed { .. } | Self::SystemLocked { .. } => true,
            Self::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for `pkgrepo-core` operations.
pub type CoreResult<T> = Result<T, CoreError>;
