//! [`ManagedPackageFile`]: the RAII handle `PackageProvider::provide` hands
//! back.
//!
//! Mirrors the "owner-holds-strong, borrower-holds-id" re-architecture spec
//! §9 prescribes for the original's reference-counted `ManagedFile`/attached
//! media handles: here the handle owns the path outright and its `Drop`
//! plays the role of the original's disposer callback.

use std::path::{Path, PathBuf};

/// A package file on disk that is deleted on drop unless `keep_packages`
/// was set for its repository.
#[derive(Debug)]
pub struct ManagedPackageFile {
    path: PathBuf,
    keep: bool,
}

impl ManagedPackageFile {
    /// Wrap `path`, which will be deleted when this handle is dropped unless
    /// `keep` is true.
    pub fn new(path: impl Into<PathBuf>, keep: bool) -> Self {
        Self {
            path: path.into(),
            keep,
        }
    }

    /// The path this handle manages.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this handle will leave its file in place on drop.
    pub fn keeps(&self) -> bool {
        self.keep
    }

    /// Detach the path from disposal, returning it. Used when a caller wants
    /// to take ownership of the file's lifetime itself (e.g. moving it
    /// somewhere else before the handle drops).
    pub fn into_path(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ManagedPackageFile {
    fn drop(&mut self) {
        if self.keep || self.path.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove transient package file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn drops_file_when_not_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg.rpm");
        std::fs::write(&path, b"data").unwrap();
        {
            let _handle = ManagedPackageFile::new(&path, false);
        }
        assert!(!path.exists());
    }

    #[test]
    fn keeps_file_when_keep_is_true() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg.rpm");
        std::fs::write(&path, b"data").unwrap();
        {
            let _handle = ManagedPackageFile::new(&path, true);
        }
        assert!(path.exists());
    }

    #[test]
    fn into_path_detaches_disposal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg.rpm");
        std::fs::write(&path, b"data").unwrap();
        let handle = ManagedPackageFile::new(&path, false);
        let returned = handle.into_path();
        assert_eq!(returned, path);
        assert!(path.exists());
    }
}
