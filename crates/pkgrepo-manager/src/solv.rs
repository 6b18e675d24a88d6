//! `SolvBuilder`: the pluggable hook that turns a repository's parsed
//! metadata directory into a compiled solv cache.
//!
//! This core has no opinion on the solv binary format itself — parsing and
//! emitting it is an explicit non-goal — so the actual
//! compilation step is factored behind this trait, the same way `Provider`
//! factors out transport and `KeyContext` factors out repo metadata access.

use std::path::Path;

use crate::error::ManagerResult;

/// Compiles `metadata_dir` (an already-refreshed `rpm-md`/`yast2`/plaindir
/// tree) into `solv_dir`.
pub trait SolvBuilder: Send + Sync {
    /// Build or rebuild the solv cache. Implementations should write
    /// atomically (temp file/dir + rename) the same way the rest of this
    /// crate's cache writers do.
    fn build(&self, metadata_dir: &Path, solv_dir: &Path) -> ManagerResult<()>;
}

/// A [`SolvBuilder`] that performs no real compilation, writing only a
/// placeholder marker file. Useful for tests and for embedding this crate
/// where solv compilation is handled by a separate process entirely.
pub struct NullSolvBuilder;

impl SolvBuilder for NullSolvBuilder {
    fn build(&self, _metadata_dir: &Path, solv_dir: &Path) -> ManagerResult<()> {
        std::fs::create_dir_all(solv_dir).map_err(|e| crate::error::ManagerError::io(solv_dir, e))?;
        let marker = solv_dir.join("solv");
        std::fs::write(&marker, b"").map_err(|e| crate::error::ManagerError::io(&marker, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn null_builder_writes_placeholder() {
        let dir = tempdir().unwrap();
        let solv_dir = dir.path().join("solv");
        NullSolvBuilder.build(dir.path(), &solv_dir).unwrap();
        assert!(solv_dir.join("solv").exists());
    }
}
