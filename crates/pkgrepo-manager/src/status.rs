//! `RepoStatus`: the fingerprint a refresh compares against the cached
//! metadata to decide whether a repository actually changed, and the solv
//! cache's recorded tool version.

use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{ManagerError, ManagerResult};

/// The current tool version this core stamps into (and checks against) a
/// compiled solv cache. Bumping this forces every existing solv cache to be
/// rebuilt on next load.
pub const TOOL_VERSION: &str = "2";

const STATUS_FILE_NAME: &str = "cookie";
const TOOLVERSION_FILE_NAME: &str = "toolversion";

/// A fingerprint of a repository's remote metadata, used to decide whether
/// a refresh actually changed anything worth re-downloading/re-indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus(String);

impl RepoStatus {
    /// Fingerprint `bytes` (typically `repomd.xml`'s content, or a
    /// mirrorlist's content for repos without one).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the fingerprint last recorded for a repository's metadata
    /// directory, if any.
    pub fn read(metadata_dir: &Path) -> Option<Self> {
        std::fs::read_to_string(metadata_dir.join(STATUS_FILE_NAME))
            .ok()
            .map(|s| Self(s.trim().to_string()))
    }

    /// Persist this fingerprint for `metadata_dir`.
    pub fn write(&self, metadata_dir: &Path) -> ManagerResult<()> {
        write_atomic(&metadata_dir.join(STATUS_FILE_NAME), self.0.as_bytes())
    }
}

/// Whether the solv cache at `solv_cache_dir` was built with the current
/// [`TOOL_VERSION`]. A missing or mismatched version means the cache must
/// be discarded and rebuilt.
pub fn solv_tool_version_matches(solv_cache_dir: &Path) -> bool {
    std::fs::read_to_string(solv_cache_dir.join(TOOLVERSION_FILE_NAME))
        .map(|s| s.trim() == TOOL_VERSION)
        .unwrap_or(false)
}

/// Record the current [`TOOL_VERSION`] alongside a freshly built solv
/// cache.
pub fn record_solv_tool_version(solv_cache_dir: &Path) -> ManagerResult<()> {
    write_atomic(&solv_cache_dir.join(TOOLVERSION_FILE_NAME), TOOL_VERSION.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> ManagerResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ManagerError::io(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp).map_err(|e| ManagerError::io(&tmp, e))?;
    file.write_all(bytes).map_err(|e| ManagerError::io(&tmp, e))?;
    drop(file);
    std::fs::rename(&tmp, path).map_err(|e| ManagerError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn same_bytes_produce_same_fingerprint() {
        let a = RepoStatus::from_bytes(b"repomd contents");
        let b = RepoStatus::from_bytes(b"repomd contents");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_produce_different_fingerprints() {
        let a = RepoStatus::from_bytes(b"one");
        let b = RepoStatus::from_bytes(b"two");
        assert_ne!(a, b);
    }

    #[test]
    fn status_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let status = RepoStatus::from_bytes(b"repomd contents");
        status.write(dir.path()).unwrap();
        assert_eq!(RepoStatus::read(dir.path()), Some(status));
    }

    #[test]
    fn missing_or_mismatched_tool_version_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(!solv_tool_version_matches(dir.path()));

        std::fs::write(dir.path().join(TOOLVERSION_FILE_NAME), "1").unwrap();
        assert!(!solv_tool_version_matches(dir.path()));

        record_solv_tool_version(dir.path()).unwrap();
        assert!(solv_tool_version_matches(dir.path()));
    }
}
