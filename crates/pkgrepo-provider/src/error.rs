//! Error taxonomy for the Provider abstraction.

use url::Url;

/// Kinds of network failure a [`crate::Provider`] can surface.
///
/// Mirrors the `NetworkError` variants in the core error taxonomy so callers
/// further up the stack (mirrorlist, repo manager, package provider) can
/// match on a stable, closed set regardless of the concrete transport a
/// caller plugs in behind the trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Remote resource does not exist (HTTP 404 or equivalent).
    NotFound,
    /// Remote resource exists but access is forbidden.
    Forbidden,
    /// Authentication was required and missing/rejected.
    Unauthorized,
    /// Remote resource is temporarily unavailable (e.g. 503).
    TempUnavailable,
    /// Authentication attempt failed (credentials rejected).
    AuthFailed,
    /// The URL scheme has no registered handler.
    UnsupportedScheme,
    /// Transport returned a malformed or unexpected response.
    ResponseError,
}

/// Errors returned by [`crate::Provider`]/[`crate::AsyncProvider`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A network-level failure occurred fetching `url`.
    #[error("network error fetching {url}: {kind:?}")]
    Network {
        /// The URL that failed.
        url: Url,
        /// The classified failure kind.
        kind: NetworkErrorKind,
    },

    /// Local filesystem I/O failed while staging the destination file.
    #[error("io error at {path}: {detail}")]
    Io {
        /// Path the I/O failure occurred at.
        path: String,
        /// Human-readable detail (from the underlying `std::io::Error`).
        detail: String,
    },

    /// The operation's deadline was reached before completion.
    #[error("deadline exceeded")]
    Timeout,

    /// The operation's cancellation token was triggered.
    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Build an [`ProviderError::Io`] from a path and an [`std::io::Error`].
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            detail: err.to_string(),
        }
    }

    /// Whether retrying the same fetch might succeed without operator
    /// intervention (a transient network condition, as opposed to a
    /// permanent rejection like `Forbidden` or `UnsupportedScheme`).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { kind, .. } => matches!(
                kind,
                NetworkErrorKind::TempUnavailable | NetworkErrorKind::ResponseError
            ),
            Self::Timeout => true,
            Self::Io { .. } | Self::Cancelled => false,
        }
    }
}

/// Convenience result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
