//! Test doubles for [`crate::Provider`]/[`crate::AsyncProvider`].
//!
//! Since this crate deliberately has no real transport,
//! these doubles are not dev-only: they are the reference implementation
//! every other crate's test suite builds on, the way a production client
//! trait elsewhere in the ecosystem gets mocked with `wiremock` — here the
//! mock sits one layer further out, at the crate boundary itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use url::Url;

use crate::error::{NetworkErrorKind, ProviderError, ProviderResult};
use crate::provider::{AsyncProvider, ProvideOptions, Provider, ProvidedFile};

/// A provider that fails every request with [`ProviderError::Network`]
/// `NotFound`. Useful for exercising fallback paths (e.g. mirrorlist fetch
/// failure falling back to baseUrls).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProvider;

impl Provider for NullProvider {
    fn provide_file(&self, url: &Url, _dest: &Path, _opts: &ProvideOptions) -> ProviderResult<ProvidedFile> {
        Err(ProviderError::Network {
            url: url.clone(),
            kind: NetworkErrorKind::NotFound,
        })
    }

    fn provide_to_memory(&self, url: &Url, _opts: &ProvideOptions) -> ProviderResult<Vec<u8>> {
        Err(ProviderError::Network {
            url: url.clone(),
            kind: NetworkErrorKind::NotFound,
        })
    }
}

#[async_trait::async_trait]
impl AsyncProvider for NullProvider {
    async fn provide_file(&self, url: &Url, dest: &Path, opts: &ProvideOptions) -> ProviderResult<ProvidedFile> {
        Provider::provide_file(self, url, dest, opts)
    }

    async fn provide_to_memory(&self, url: &Url, opts: &ProvideOptions) -> ProviderResult<Vec<u8>> {
        Provider::provide_to_memory(self, url, opts)
    }
}

/// An in-memory provider backed by a `Url -> bytes` map, for tests that need
/// deterministic content without touching the network.
#[derive(Debug, Clone, Default)]
pub struct MapProvider {
    entries: Arc<Mutex<HashMap<Url, Vec<u8>>>>,
}

impl MapProvider {
    /// Create an empty map provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the content served for `url`.
    pub fn insert(&self, url: Url, content: impl Into<Vec<u8>>) {
        self.entries.lock().unwrap().insert(url, content.into());
    }

    fn get(&self, url: &Url) -> ProviderResult<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::Network {
                url: url.clone(),
                kind: NetworkErrorKind::NotFound,
            })
    }
}

impl Provider for MapProvider {
    fn provide_file(&self, url: &Url, dest: &Path, _opts: &ProvideOptions) -> ProviderResult<ProvidedFile> {
        let content = self.get(url)?;
        std::fs::write(dest, &content).map_err(|e| ProviderError::io(dest.display().to_string(), e))?;
        Ok(ProvidedFile {
            path: PathBuf::from(dest),
            size: Some(content.len() as u64),
        })
    }

    fn provide_to_memory(&self, url: &Url, _opts: &ProvideOptions) -> ProviderResult<Vec<u8>> {
        self.get(url)
    }
}

#[async_trait::async_trait]
impl AsyncProvider for MapProvider {
    async fn provide_file(&self, url: &Url, dest: &Path, opts: &ProvideOptions) -> ProviderResult<ProvidedFile> {
        Provider::provide_file(self, url, dest, opts)
    }

    async fn provide_to_memory(&self, url: &Url, opts: &ProvideOptions) -> ProviderResult<Vec<u8>> {
        Provider::provide_to_memory(self, url, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_provider_fails_not_found() {
        let p = NullProvider;
        let url = Url::parse("https://example.com/x").unwrap();
        let err = p
            .provide_to_memory(&url, &ProvideOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Network {
                kind: NetworkErrorKind::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn map_provider_serves_registered_content() {
        let p = MapProvider::new();
        let url = Url::parse("https://example.com/repodata/repomd.xml").unwrap();
        p.insert(url.clone(), b"<repomd/>".to_vec());
        let bytes = p.provide_to_memory(&url, &ProvideOptions::default()).unwrap();
        assert_eq!(bytes, b"<repomd/>");
    }

    #[test]
    fn map_provider_missing_url_is_not_found() {
        let p = MapProvider::new();
        let url = Url::parse("https://example.com/missing").unwrap();
        let err = p.provide_to_memory(&url, &ProvideOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Network {
                kind: NetworkErrorKind::NotFound,
                ..
            }
        ));
    }
}
