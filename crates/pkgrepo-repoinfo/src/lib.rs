//! Repository and service metadata: the `RepoInfo`/`ServiceInfo` data model
//! and the `.repo`/`.service` INI codec that reads and writes it.
//!
//! This crate is a leaf: it has no knowledge of a manager, a cache root
//! layout beyond the `/%AUTO%` derivation rule, or how a `baseurl=` gets
//! fetched. Variable substitution ( `$releasever`, `$arch`, ... ) is
//! abstracted behind [`VariableResolver`] so this crate never depends on
//! `pkgrepo-core`, which depends on this one.

mod base;
mod error;
mod ini;
mod repo_type;
mod repoinfo;
mod serviceinfo;
mod signature_state;
mod tribool;

pub use base::{escape_alias, validate_alias, InfoBase};
pub use error::{RepoError, ServiceError};
pub use ini::{index_by_name, parse as parse_ini, write as write_ini, IniSection};
pub use repo_type::{RepoType, UnknownRepoType};
pub use repoinfo::{MirrorKind, RepoInfo, VariableResolver, NO_PRIORITY};
pub use serviceinfo::{RepoState, ServiceInfo, ServiceType};
pub use signature_state::{
    clear as clear_signature_state, read as read_signature_state, write as write_signature_state,
};
pub use tribool::TriBool;
