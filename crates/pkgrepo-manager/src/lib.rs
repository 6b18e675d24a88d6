//! Repository/service lifecycle management and URL credential persistence.
//!
//! This crate is the orchestration layer: it owns the `.repo`/`.service`
//! file store ([`repo_store`]), drives metadata refresh and cache
//! lifecycle ([`RepoManager`]), and persists per-URL credentials
//! ([`CredentialManager`]) independently of it. It depends on every leaf
//! crate in the workspace (`pkgrepo-core`, `pkgrepo-repoinfo`,
//! `pkgrepo-provider`, `pkgrepo-keyring`, `pkgrepo-mirrorlist`) but none of
//! them depend back on it.

mod credentials;
mod error;
mod manager;
mod repo_store;
mod solv;
mod status;

pub use credentials::{Credential, CredentialManager};
pub use error::{ManagerError, ManagerResult};
pub use manager::{RefreshOutcome, RefreshPolicy, RepoManager, SYSTEM_ALIAS};
pub use repo_store::{is_repo_file_name, is_service_file_name};
pub use solv::{NullSolvBuilder, SolvBuilder};
pub use status::{RepoStatus, TOOL_VERSION};
