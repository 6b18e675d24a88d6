//! The Provider abstraction: the only way this core touches bytes from a URL.
//!
//! Providing a general-purpose HTTP client is an explicit non-goal (spec
//! §1); callers implement [`Provider`]/[`AsyncProvider`] against whatever
//! transport they already have (curl, reqwest, an FTP stack, a test double)
//! and everything above this crate — mirrorlist parsing, repo metadata
//! refresh, package download — consumes only these traits.

use std::path::{Path, PathBuf};

use crate::cancellation::CancellationToken;
use crate::deadline::Deadline;
use crate::error::ProviderResult;

/// An optional HTTP(S)-style basic auth callback: given a URL, return
/// `(username, password)` if this provider should authenticate the request.
pub trait AuthCallback: Send + Sync {
    /// Resolve credentials for `url`, if any are known.
    fn credentials_for(&self, url: &url::Url) -> Option<(String, String)>;
}

/// Per-request options threaded through every provide call.
#[derive(Clone, Default)]
pub struct ProvideOptions {
    /// Deadline for the whole operation.
    pub deadline: Deadline,
    /// Cooperative cancellation token.
    pub cancel: CancellationToken,
    /// Optional auth callback (credential manager, typically).
    pub auth: Option<std::sync::Arc<dyn AuthCallback>>,
}

/// A file that was materialized on local disk by a provider.
#[derive(Debug, Clone)]
pub struct ProvidedFile {
    /// Local path the content was written to.
    pub path: PathBuf,
    /// Size in bytes, if known without a re-stat.
    pub size: Option<u64>,
}

/// Synchronous media acquisition capability.
///
/// Implementations run to completion on the calling thread; this is the
/// interface the synchronous Workflow Engine executor uses.
pub trait Provider: Send + Sync {
    /// Fetch `url` and write it to `dest`, returning metadata about what was
    /// written. `dest`'s parent directory must already exist.
    fn provide_file(
        &self,
        url: &url::Url,
        dest: &Path,
        opts: &ProvideOptions,
    ) -> ProviderResult<ProvidedFile>;

    /// Fetch `url` entirely into memory. Used for small payloads (mirrorlists,
    /// detached signatures, repomd.xml).
    fn provide_to_memory(&self, url: &url::Url, opts: &ProvideOptions) -> ProviderResult<Vec<u8>>;
}

/// Asynchronous media acquisition capability; the async Workflow Engine
/// executor's counterpart to [`Provider`].
#[async_trait::async_trait]
pub trait AsyncProvider: Send + Sync {
    /// Async counterpart of [`Provider::provide_file`].
    async fn provide_file(
        &self,
        url: &url::Url,
        dest: &Path,
        opts: &ProvideOptions,
    ) -> ProviderResult<ProvidedFile>;

    /// Async counterpart of [`Provider::provide_to_memory`].
    async fn provide_to_memory(
        &self,
        url: &url::Url,
        opts: &ProvideOptions,
    ) -> ProviderResult<Vec<u8>>;
}
