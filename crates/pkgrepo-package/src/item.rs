//! The value types [`crate::PackageProvider::provide`] is built around: a
//! package to fetch, its optional delta candidates, and the checksum type
//! shared by both.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use url::Url;

/// A SHA-256 content digest, hex-encoded. Mirrors `pkgrepo_manager::RepoStatus`'s
/// fingerprint shape, applied here to individual package payloads instead of
/// a whole metadata tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum(String);

impl Checksum {
    /// Digest `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Build from an already hex-encoded digest (e.g. as read from repo
    /// metadata), lower-cased for comparison.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single package to retrieve, resolved to a concrete download URL and
/// destination location within the owning repository's package cache.
#[derive(Debug, Clone)]
pub struct PackageItem {
    /// Alias of the repository this package belongs to, for reporting and
    /// key resolution.
    pub repo_alias: String,
    /// Display name (e.g. `bash-5.2-2.1.x86_64.rpm`), used in prompts.
    pub name: String,
    /// Resolved URL the full package is downloaded from.
    pub url: Url,
    /// Location under the repo's package path this item is cached at.
    pub location: PathBuf,
    /// Content checksum recorded in repository metadata, if any. Checked
    /// against every path that produces bytes (cache hit, delta result, or
    /// full download).
    pub expected_checksum: Option<Checksum>,
    /// A location already known to hold a verified copy of this package
    /// (e.g. a prior `provide` call, or disk state the caller already
    /// checked). When set and the file still exists, [`crate::PackageProvider`]
    /// returns it directly.
    pub cached_path: Option<PathBuf>,
}

impl PackageItem {
    pub fn new(repo_alias: impl Into<String>, name: impl Into<String>, url: Url, location: impl Into<PathBuf>) -> Self {
        Self {
            repo_alias: repo_alias.into(),
            name: name.into(),
            url,
            location: location.into(),
            expected_checksum: None,
            cached_path: None,
        }
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.expected_checksum = Some(checksum);
        self
    }

    pub fn with_cached_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cached_path = Some(path.into());
        self
    }
}

/// A candidate delta (binary patch) that, applied to an already-installed
/// edition, reconstructs this package without downloading it in full.
#[derive(Debug, Clone)]
pub struct DeltaCandidate {
    /// The installed edition (name-version-release-arch string) this delta
    /// applies on top of.
    pub base_edition: String,
    /// URL the (small) delta payload is downloaded from.
    pub delta_url: Url,
    /// Checksum of the fully reconstructed package the delta should
    /// produce, used by [`crate::DeltaApplier::quick_check`] to validate the
    /// delta before committing to the (more expensive) apply step.
    pub result_checksum: Checksum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_produce_same_checksum() {
        assert_eq!(Checksum::from_bytes(b"content"), Checksum::from_bytes(b"content"));
    }

    #[test]
    fn from_hex_lowercases() {
        assert_eq!(Checksum::from_hex("ABCD").as_str(), "abcd");
    }
}
