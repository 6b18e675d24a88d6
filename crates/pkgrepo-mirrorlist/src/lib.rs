//! Mirror document acquisition: fetch-or-reuse-cache, parse, and filter a
//! repository's mirrorlist/metalink/JSON document.
//!
//! This crate owns the mirror document's lifecycle end to end but has no
//! opinion on mirror *selection* (picking the "best" mirror among several)
//! or on falling back to a repo's plain `baseurl=` list when the document
//! can't be obtained at all — both are a [`pkgrepo_manager`]-layer decision
//! once that crate has a `RepoInfo` in hand; this crate surfaces
//! [`MirrorListError`] and lets the caller choose what to do next.

mod cache;
mod error;
mod model;
mod parse;

use std::path::Path;
use std::time::Duration;

use pkgrepo_provider::{ProvideOptions, Provider};
use url::Url;

pub use error::{MirrorListError, MirrorListResult};
pub use model::{MirrorEntry, MirrorList, MirrorListFormat};

/// Obtain the mirror list for `source_url`, reusing a fresh on-disk cache
/// under `metadata_dir` when one exists, and fetching + re-caching it
/// through `provider` otherwise.
///
/// `refresh_delay` is the repo's configured minimum cache age before a
/// refetch is attempted. Mirrors are returned in source-document order,
/// already filtered of dropped URL schemes and trailing `repomd.xml`
/// suffixes (see [`parse::parse`]).
pub fn obtain(
    provider: &dyn Provider,
    source_url: &Url,
    metadata_dir: &Path,
    refresh_delay: Duration,
    opts: &ProvideOptions,
) -> MirrorListResult<MirrorList> {
    if let Some(cached) = cache::load(metadata_dir, source_url, refresh_delay)? {
        tracing::debug!(url = %source_url, entries = cached.list.len(), "reusing cached mirror list");
        return Ok(cached.list);
    }

    tracing::debug!(url = %source_url, "fetching mirror list");
    let content = provider.provide_to_memory(source_url, opts)?;
    let format = MirrorListFormat::detect(&content);
    let list = parse::parse(&content, format).map_err(|detail| MirrorListError::ParseError {
        url: source_url.to_string(),
        detail,
    })?;

    cache::store(metadata_dir, source_url, format, &content, &list)?;
    Ok(list)
}

/// Async counterpart of [`obtain`], for callers running the async Workflow
/// Engine executor.
pub async fn obtain_async(
    provider: &dyn pkgrepo_provider::AsyncProvider,
    source_url: &Url,
    metadata_dir: &Path,
    refresh_delay: Duration,
    opts: &ProvideOptions,
) -> MirrorListResult<MirrorList> {
    if let Some(cached) = cache::load(metadata_dir, source_url, refresh_delay)? {
        tracing::debug!(url = %source_url, entries = cached.list.len(), "reusing cached mirror list");
        return Ok(cached.list);
    }

    tracing::debug!(url = %source_url, "fetching mirror list");
    let content = provider.provide_to_memory(source_url, opts).await?;
    let format = MirrorListFormat::detect(&content);
    let list = parse::parse(&content, format).map_err(|detail| MirrorListError::ParseError {
        url: source_url.to_string(),
        detail,
    })?;

    cache::store(metadata_dir, source_url, format, &content, &list)?;
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgrepo_provider::{NetworkErrorKind, ProviderError};
    use tempfile::tempdir;

    struct StaticProvider {
        content: Vec<u8>,
    }

    impl Provider for StaticProvider {
        fn provide_file(
            &self,
            _url: &Url,
            _dest: &Path,
            _opts: &ProvideOptions,
        ) -> pkgrepo_provider::ProviderResult<pkgrepo_provider::ProvidedFile> {
            unimplemented!("not exercised by these tests")
        }

        fn provide_to_memory(
            &self,
            _url: &Url,
            _opts: &ProvideOptions,
        ) -> pkgrepo_provider::ProviderResult<Vec<u8>> {
            Ok(self.content.clone())
        }
    }

    struct FailingProvider;

    impl Provider for FailingProvider {
        fn provide_file(
            &self,
            _url: &Url,
            _dest: &Path,
            _opts: &ProvideOptions,
        ) -> pkgrepo_provider::ProviderResult<pkgrepo_provider::ProvidedFile> {
            unimplemented!("not exercised by these tests")
        }

        fn provide_to_memory(
            &self,
            url: &Url,
            _opts: &ProvideOptions,
        ) -> pkgrepo_provider::ProviderResult<Vec<u8>> {
            Err(ProviderError::Network {
                url: url.clone(),
                kind: NetworkErrorKind::NotFound,
            })
        }
    }

    #[test]
    fn fetches_and_caches_on_first_call() {
        let dir = tempdir().unwrap();
        let provider = StaticProvider {
            content: b"https://a.example/\nhttps://b.example/\n".to_vec(),
        };
        let source = Url::parse("https://example.com/mirrorlist").unwrap();

        let list = obtain(&provider, &source, dir.path(), Duration::from_secs(600), &ProvideOptions::default()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(dir.path().join("mirrorlist.txt").exists());
        assert!(dir.path().join("mirrorlist.cookie").exists());
    }

    #[test]
    fn reuses_cache_without_calling_provider_again() {
        let dir = tempdir().unwrap();
        let provider = StaticProvider {
            content: b"https://a.example/\n".to_vec(),
        };
        let source = Url::parse("https://example.com/mirrorlist").unwrap();
        let opts = ProvideOptions::default();

        let first = obtain(&provider, &source, dir.path(), Duration::from_secs(600), &opts).unwrap();

        let failing = FailingProvider;
        let second = obtain(&failing, &source, dir.path(), Duration::from_secs(600), &opts).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn propagates_provider_failure_when_no_cache() {
        let dir = tempdir().unwrap();
        let failing = FailingProvider;
        let source = Url::parse("https://example.com/mirrorlist").unwrap();

        let result = obtain(&failing, &source, dir.path(), Duration::from_secs(600), &ProvideOptions::default());
        assert!(matches!(result, Err(MirrorListError::Provider(_))));
    }
}
