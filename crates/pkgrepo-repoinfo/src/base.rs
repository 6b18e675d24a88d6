//! Fields shared between `RepoInfo` and `ServiceInfo`, since `ServiceInfo`
//! extends the same common base.

/// Validate an alias: non-empty, does not start with `.`.
///
/// Uniqueness within a context is enforced by the owning manager, not here —
/// this crate has no notion of "the set of known repos".
pub fn validate_alias(alias: &str) -> Result<(), &'static str> {
    if alias.is_empty() {
        return Err("alias must not be empty");
    }
    if alias.starts_with('.') {
        return Err("alias must not start with '.'");
    }
    Ok(())
}

/// Turn an alias into a filesystem-safe name for cache directories/files,
/// matching libzypp's `RepoInfoBase::escaped_alias()`.
pub fn escape_alias(alias: &str) -> String {
    alias
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Fields common to repositories and services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoBase {
    /// Unique, non-empty, non-dot-prefixed identifier.
    pub alias: String,
    /// Human-readable display name (defaults to `alias` when unset).
    pub name: String,
    /// Whether this entry is enabled.
    pub enabled: bool,
    /// Whether this entry is auto-refreshed.
    pub autorefresh: bool,
}

impl InfoBase {
    /// Construct a base with the given alias, `name` defaulting to the
    /// alias, enabled, and autorefresh off (the `.repo`/`.service` file
    /// defaults when keys are omitted).
    pub fn new(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            name: alias.clone(),
            alias,
            enabled: true,
            autorefresh: false,
        }
    }

    /// The filesystem-safe form of [`Self::alias`].
    pub fn escaped_alias(&self) -> String {
        escape_alias(&self.alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_dot_prefixed() {
        assert!(validate_alias("").is_err());
        assert!(validate_alias(".hidden").is_err());
        assert!(validate_alias("ok").is_ok());
    }

    #[test]
    fn escapes_unsafe_characters() {
        assert_eq!(escape_alias("repo/with spaces"), "repo_with_spaces");
        assert_eq!(escape_alias("fine-name_1.0"), "fine-name_1.0");
    }
}
