//! `Context`: the root handle every other crate threads through. Owns the
//! loaded [`Config`], the resolved [`RepoVariables`], the
//! [`pkgrepo_provider::Provider`] backing all I/O, and — once
//! [`Context::init_target`] has run — the process-level exclusion lock on
//! the target root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgrepo_provider::Provider;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::lock::{ExclusionLock, LockProbe};
use crate::variables::RepoVariables;

/// Describes the system a `Context` is operating against, once
/// [`Context::init_target`] has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    /// Root directory the target is rooted at (`/` for the running
    /// system, or an arbitrary path for an offline/chroot target).
    pub root: PathBuf,
    /// `$releasever` as read from the target.
    pub releasever: String,
    /// `$arch` as read from the target.
    pub arch: String,
}

/// The root handle for a working set of repositories, services, keys, and
/// cached packages.
///
/// A `Context` is cheap to construct (`new`) but does nothing with the
/// filesystem until [`Self::init_target`] is called — this mirrors
/// libzypp's `ZYpp`/`Target` split, where simply asking "what's the
/// config?" must not require taking the exclusion lock.
pub struct Context {
    config: Config,
    provider: Arc<dyn Provider>,
    target: Option<TargetInfo>,
    variables: Option<RepoVariables>,
    lock: Option<ExclusionLock>,
}

impl Context {
    /// Build a context from an already-loaded config and a provider for
    /// all I/O this context (and anything built on top of it) will need.
    pub fn new(config: Config, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            provider,
            target: None,
            variables: None,
            lock: None,
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The provider backing this context's I/O.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// The target, if [`Self::init_target`] has been called.
    pub fn target(&self) -> Option<&TargetInfo> {
        self.target.as_ref()
    }

    /// The resolved repo variables, if [`Self::init_target`] has been
    /// called.
    pub fn variables(&self) -> Option<&RepoVariables> {
        self.variables.as_ref()
    }

    /// Initialize (or idempotently re-confirm) the target at `root`,
    /// acquiring the process-level exclusion lock unless
    /// [`Config::readonly_hack`] is set.
    ///
    /// Calling this again with the same `root` is a no-op success (spec:
    /// idempotent `initTarget`). Calling it with a *different* root while
    /// already initialized is an error — a `Context` is bound to one
    /// target for its lifetime.
    pub fn init_target(&mut self, root: &Path, releasever: &str, arch: &str) -> CoreResult<()> {
        if let Some(existing) = &self.target {
            return if existing.root == root {
                Ok(())
            } else {
                Err(CoreError::AlreadyInitialized {
                    existing: existing.root.clone(),
                })
            };
        }

        let lock = ExclusionLock::acquire(root, self.config.lock_timeout, self.config.readonly_hack)?;

        self.target = Some(TargetInfo {
            root: root.to_path_buf(),
            releasever: releasever.to_string(),
            arch: arch.to_string(),
        });
        self.variables = Some(RepoVariables::new(releasever, arch));
        self.lock = lock;
        tracing::info!(root = %root.display(), releasever, arch, "target initialized");
        Ok(())
    }

    /// Tear down the target: release the exclusion lock and forget the
    /// resolved variables. The context may be re-initialized against a new
    /// root afterwards.
    pub fn finish_target(&mut self) {
        self.target = None;
        self.variables = None;
        self.lock = None;
        tracing::info!("target finished");
    }

    /// Acquire a scoped reference to the exclusion lock for an operation
    /// that needs to assert exclusivity explicitly (most callers rely on
    /// the lock already held since `init_target`; this is for call sites
    /// that want to fail loudly if it somehow isn't).
    pub fn lock_resource(&self) -> CoreResult<()> {
        if self.target.is_none() {
            return Err(CoreError::NotInitialized);
        }
        if self.lock.is_none() && !self.config.readonly_hack {
            return Err(CoreError::LockFailed {
                path: PathBuf::new(),
                detail: "no exclusion lock held by this context".to_string(),
            });
        }
        Ok(())
    }

    /// Read-only probe of whether `root` is currently locked by another
    /// process, without touching this context's own state.
    pub fn probe_lock(root: &Path) -> LockProbe {
        ExclusionLock::probe_only(root)
    }

    /// Release the lock and clear target state; equivalent to
    /// [`Self::finish_target`], provided under this name for symmetry
    /// with `init_target`.
    pub fn close(&mut self) {
        self.finish_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgrepo_provider::NullProvider;
    use tempfile::tempdir;

    fn ctx() -> Context {
        Context::new(Config::default(), Arc::new(NullProvider))
    }

    #[test]
    fn init_target_is_idempotent_for_the_same_root() {
        let dir = tempdir().unwrap();
        let mut context = ctx();
        context.init_target(dir.path(), "15.6", "x86_64").unwrap();
        context.init_target(dir.path(), "15.6", "x86_64").unwrap();
        assert_eq!(context.target().unwrap().root, dir.path());
    }

    #[test]
    fn init_target_rejects_a_second_distinct_root() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let mut context = ctx();
        context.init_target(dir_a.path(), "15.6", "x86_64").unwrap();
        let err = context.init_target(dir_b.path(), "15.6", "x86_64").unwrap_err();
        assert!(matches!(err, CoreError::AlreadyInitialized { .. }));
    }

    #[test]
    fn finish_target_allows_reinitializing_elsewhere() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let mut context = ctx();
        context.init_target(dir_a.path(), "15.6", "x86_64").unwrap();
        context.finish_target();
        context.init_target(dir_b.path(), "15.6", "x86_64").unwrap();
        assert_eq!(context.target().unwrap().root, dir_b.path());
    }

    #[test]
    fn lock_resource_fails_before_init() {
        let context = ctx();
        assert!(matches!(context.lock_resource(), Err(CoreError::NotInitialized)));
    }
}
