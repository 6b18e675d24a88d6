//! The shared runtime for the pkgrepo workspace: [`Context`] (the root
//! handle every other crate threads through), [`Config`], [`RepoVariables`],
//! the process-level [`ExclusionLock`], the [`Expected`] workflow engine,
//! and the [`Reporter`]/[`ProgressObserver`] user-facing surfaces.
//!
//! Everything here is agnostic to *which* repository/key/package is being
//! worked on — that's `pkgrepo-repoinfo`, `pkgrepo-keyring`, and
//! `pkgrepo-manager`'s job. This crate only provides the ambient plumbing
//! those crates build on.

mod config;
mod context;
mod error;
mod lock;
mod report;
mod variables;
mod workflow;

pub use config::{Config, IpResolve};
pub use context::{Context, TargetInfo};
pub use error::{CoreError, CoreResult};
pub use lock::{ExclusionLock, LockProbe};
pub use report::{
    AutoImportedKey, KeyTrustDecision, NonInteractiveReporter, PackageKeyPrompt, Problem,
    ProblemResponse, ProgressObserver, Reporter, ScriptedReporter, UnknownKeyPrompt,
    UnsignedFilePrompt, UntrustedKeyPrompt, VerificationFailedPrompt,
};
pub use variables::RepoVariables;
pub use workflow::{AsyncExecutor, Executor, Expected, SyncExecutor};
