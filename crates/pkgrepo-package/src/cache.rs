//! The top-level package cache: a content-addressed
//! store shared across repositories, distinct from each repo's own package
//! path (`%PKG%`). Consulted "when the configured package cache path
//! differs from the default" — i.e. only when the deployment opted into a
//! shared cache at all.

use std::path::{Path, PathBuf};

use crate::item::Checksum;

/// A content-addressed directory of already-downloaded, already-verified
/// package files, keyed by [`Checksum`]. Entries here are assumed verified:
/// they were only ever stored after a full download passed its signature
/// and checksum checks.
#[derive(Debug, Clone)]
pub struct TopLevelCache {
    root: PathBuf,
}

impl TopLevelCache {
    /// Open a top-level cache rooted at `root`. Returns `None` if the
    /// deployment has no override configured, in which case step 2 of
    /// `provide` is skipped entirely.
    pub fn new(root: Option<PathBuf>) -> Option<Self> {
        root.map(|root| Self { root })
    }

    fn entry_path(&self, checksum: &Checksum) -> PathBuf {
        let digest = checksum.as_str();
        let prefix = &digest[..digest.len().min(2)];
        self.root.join(prefix).join(digest)
    }

    /// Look up a cached, previously-verified file for `checksum`.
    pub fn lookup(&self, checksum: &Checksum) -> Option<PathBuf> {
        let path = self.entry_path(checksum);
        path.is_file().then_some(path)
    }

    /// Materialize the cached entry for `checksum` at `dest`, hard-linking
    /// when possible (same filesystem) and falling back to a copy.
    pub fn materialize(&self, checksum: &Checksum, dest: &Path) -> std::io::Result<()> {
        let cached = self.entry_path(checksum);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if std::fs::hard_link(&cached, dest).is_err() {
            std::fs::copy(&cached, dest)?;
        }
        Ok(())
    }

    /// Record `source` (already verified) under `checksum` for future
    /// lookups.
    pub fn store(&self, checksum: &Checksum, source: &Path) -> std::io::Result<()> {
        let dest = self.entry_path(checksum);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if std::fs::hard_link(source, &dest).is_err() {
            std::fs::copy(source, &dest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_stored_entry() {
        let dir = tempdir().unwrap();
        let cache = TopLevelCache::new(Some(dir.path().join("cache"))).unwrap();
        let src_dir = tempdir().unwrap();
        let src = src_dir.path().join("bash.rpm");
        std::fs::write(&src, b"rpm bytes").unwrap();

        let checksum = Checksum::from_bytes(b"rpm bytes");
        assert!(cache.lookup(&checksum).is_none());
        cache.store(&checksum, &src).unwrap();
        assert!(cache.lookup(&checksum).is_some());

        let dest_dir = tempdir().unwrap();
        let dest = dest_dir.path().join("bash.rpm");
        cache.materialize(&checksum, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"rpm bytes");
    }

    #[test]
    fn missing_root_means_no_override() {
        assert!(TopLevelCache::new(None).is_none());
    }
}
