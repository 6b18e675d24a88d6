//! Pluggable hooks for the two capabilities delta reconstruction needs but
//! this core cannot provide itself: knowing what editions are installed
//! and applying a binary delta
//! (the delta format/tooling is external, the same way solv compilation is
//! factored behind `pkgrepo_manager::SolvBuilder`).

use std::path::Path;

use crate::error::PackageResult;
use crate::item::Checksum;

/// Answers whether a given edition of a package is currently installed, so
/// delta reconstruction knows which candidate (if any) it can rebuild from.
pub trait InstalledEditions: Send + Sync {
    /// Whether `edition` of the package named by `repo_alias`'s delta
    /// candidate is installed.
    fn is_installed(&self, repo_alias: &str, edition: &str) -> bool;
}

/// An [`InstalledEditions`] that reports nothing installed, so delta
/// reconstruction is never attempted. The correct default wherever this core
/// is embedded without its own package database.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInstalledEditions;

impl InstalledEditions for NoInstalledEditions {
    fn is_installed(&self, _repo_alias: &str, _edition: &str) -> bool {
        false
    }
}

/// The platform-specific helper that turns a downloaded delta plus its
/// installed base edition into a full package file.
pub trait DeltaApplier: Send + Sync {
    /// Validate that `delta_path`, once applied, would produce a file
    /// matching `result_checksum`, without doing the (more expensive) full
    /// apply. Whether this passes gates whether reconstruction is
    /// attempted at all.
    fn quick_check(&self, delta_path: &Path, result_checksum: &Checksum) -> bool;

    /// Apply `delta_path` and write the reconstructed package to
    /// `output_path`.
    fn apply(&self, delta_path: &Path, output_path: &Path) -> PackageResult<()>;
}

/// A [`DeltaApplier`] with no real delta tooling behind it: `quick_check`
/// always fails, so the delta path is never taken and `provide` falls
/// through to a full download. The correct default wherever this core is
/// embedded without a platform delta-apply helper installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDeltaApplier;

impl DeltaApplier for NullDeltaApplier {
    fn quick_check(&self, _delta_path: &Path, _result_checksum: &Checksum) -> bool {
        false
    }

    fn apply(&self, _delta_path: &Path, _output_path: &Path) -> PackageResult<()> {
        Err(crate::error::PackageError::DeltaApplyFailed {
            detail: "no delta-apply helper configured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_installed_editions_reports_nothing_installed() {
        assert!(!NoInstalledEditions.is_installed("oss", "bash-5.2-2.1.x86_64"));
    }

    #[test]
    fn null_applier_never_quick_checks_true() {
        let checksum = Checksum::from_bytes(b"anything");
        assert!(!NullDeltaApplier.quick_check(Path::new("/tmp/delta"), &checksum));
    }
}
