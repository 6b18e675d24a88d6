//! The `MirrorListError` taxonomy.

use std::path::PathBuf;

use pkgrepo_provider::ProviderError;

/// Errors returned while fetching, parsing, or caching a mirrorlist
/// document.
#[derive(Debug, thiserror::Error)]
pub enum MirrorListError {
    /// Fetching the mirrorlist/metalink document failed and the caller has
    /// no base URLs to fall back to.
    #[error("could not obtain a usable mirror list for {url}: {detail}")]
    ParseError {
        /// The source URL the document was fetched from.
        url: String,
        /// Human-readable detail.
        detail: String,
    },

    /// Underlying filesystem I/O error while reading/writing the cache.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the operation was attempted against.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A provider-level failure occurred while fetching the document.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl MirrorListError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for mirrorlist operations.
pub type MirrorListResult<T> = Result<T, MirrorListError>;
