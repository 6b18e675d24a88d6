//! Persisting `validRepoSignature` as a `.repo_gpgcheck` symlink.
//!
//! The tri-state outcome of the last signature check against a repository
//! is recorded durably as a symlink whose *target* (never read as a real
//! path) encodes the state, rather than as a file whose contents need to be
//! opened and parsed. This survives a crash between "decide" and "persist"
//! atomically: `symlink` is a single filesystem operation, and replacing an
//! existing link is a create-then-rename under the hood on every platform
//! this crate cares about.

use std::io;
use std::path::Path;

use crate::tribool::TriBool;

const LINK_NAME: &str = ".repo_gpgcheck";

/// Read the persisted signature-validation state for a repository whose
/// cache directory is `repo_cache_dir`. Returns [`TriBool::Indeterminate`]
/// when no record exists yet (a repository that has never been refreshed).
pub fn read(repo_cache_dir: &Path) -> TriBool {
    match std::fs::read_link(repo_cache_dir.join(LINK_NAME)) {
        Ok(target) => TriBool::parse(&target.to_string_lossy()),
        Err(_) => TriBool::Indeterminate,
    }
}

/// Persist `state` as the `.repo_gpgcheck` symlink under `repo_cache_dir`,
/// replacing any existing link.
pub fn write(repo_cache_dir: &Path, state: TriBool) -> io::Result<()> {
    let link = repo_cache_dir.join(LINK_NAME);
    let tmp = repo_cache_dir.join(format!(".{}.tmp", LINK_NAME));
    let _ = std::fs::remove_file(&tmp);

    #[cfg(unix)]
    std::os::unix::fs::symlink(state.as_symlink_target(), &tmp)?;
    #[cfg(not(unix))]
    std::fs::write(&tmp, state.as_symlink_target())?;

    std::fs::rename(&tmp, &link)
}

/// Remove any persisted signature state, returning the repository to
/// "never validated" ([`TriBool::Indeterminate`]) on the next [`read`].
pub fn clear(repo_cache_dir: &Path) -> io::Result<()> {
    match std::fs::remove_file(repo_cache_dir.join(LINK_NAME)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unwritten_state_reads_as_indeterminate() {
        let dir = tempdir().unwrap();
        assert_eq!(read(dir.path()), TriBool::Indeterminate);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        write(dir.path(), TriBool::Yes).unwrap();
        assert_eq!(read(dir.path()), TriBool::Yes);

        write(dir.path(), TriBool::No).unwrap();
        assert_eq!(read(dir.path()), TriBool::No);
    }

    #[test]
    fn clear_resets_to_indeterminate() {
        let dir = tempdir().unwrap();
        write(dir.path(), TriBool::Yes).unwrap();
        clear(dir.path()).unwrap();
        assert_eq!(read(dir.path()), TriBool::Indeterminate);
    }
}
