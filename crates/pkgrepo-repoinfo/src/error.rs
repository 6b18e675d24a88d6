//! The `Repo{..}`/`Service{..}` error taxonomy.

/// Errors describing why a repository operation could not complete.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RepoError {
    /// Alias was empty.
    #[error("repository alias must not be empty")]
    NoAlias,

    /// Alias failed validation (empty, or starts with `.`, or already taken).
    #[error("invalid repository alias '{alias}': {reason}")]
    InvalidAlias {
        /// The offending alias.
        alias: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Repository has neither a base URL nor a mirrorlist/metalink URL.
    #[error("repository '{alias}' has no base URL, mirrorlist, or metalink")]
    NoUrl {
        /// The repository's alias.
        alias: String,
    },

    /// No solv cache exists for this repository.
    #[error("repository '{alias}' has no cached solv file")]
    NotCached {
        /// The repository's alias.
        alias: String,
    },

    /// Repository type could not be determined/is unsupported.
    #[error("repository '{alias}' has unknown or unsupported type")]
    UnknownType {
        /// The repository's alias.
        alias: String,
    },

    /// A repository with this alias is already known.
    #[error("repository '{alias}' already exists")]
    AlreadyExists {
        /// The conflicting alias.
        alias: String,
    },

    /// No repository with this alias is known.
    #[error("repository '{alias}' not found")]
    NotFound {
        /// The alias that was looked up.
        alias: String,
    },

    /// Repository metadata on disk is corrupt/inconsistent.
    #[error("repository '{alias}' metadata is broken: {detail}")]
    MetadataBroken {
        /// The repository's alias.
        alias: String,
        /// Human-readable detail.
        detail: String,
    },
}

/// Errors describing why a service operation could not complete.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Alias was empty.
    #[error("service alias must not be empty")]
    NoAlias,

    /// Alias failed validation.
    #[error("invalid service alias '{alias}': {reason}")]
    InvalidAlias {
        /// The offending alias.
        alias: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A service with this alias is already known.
    #[error("service '{alias}' already exists")]
    AlreadyExists {
        /// The conflicting alias.
        alias: String,
    },

    /// Service has no URL.
    #[error("service '{alias}' has no URL")]
    NoUrl {
        /// The service's alias.
        alias: String,
    },

    /// Attempted to mutate a plugin-backed service, which is immutable.
    #[error("service '{alias}' is plugin-backed and cannot be modified")]
    PluginImmutable {
        /// The service's alias.
        alias: String,
    },

    /// Warning-only: a plugin service reported informational status. This
    /// variant must never be treated as a failed operation by callers.
    #[error("service '{alias}' plugin reported: {message}")]
    PluginInformational {
        /// The service's alias.
        alias: String,
        /// The informational message.
        message: String,
    },

    /// No service with this alias is known.
    #[error("service '{alias}' not found")]
    NotFound {
        /// The alias that was looked up.
        alias: String,
    },
}
