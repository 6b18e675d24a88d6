//! `RepoInfo`: the in-memory representation of a single `.repo` entry.

use std::path::PathBuf;

use url::Url;

use crate::base::InfoBase;
use crate::error::RepoError;
use crate::ini::IniSection;
use crate::repo_type::RepoType;
use crate::tribool::TriBool;

/// Sentinel used by [`RepoInfo::priority`] to mean "no explicit priority was
/// set" — the repository sorts last.
pub const NO_PRIORITY: u32 = u32::MAX;

/// Which of the two supported indirection formats a repository's
/// `mirrorlist=`/`metalink=` URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorKind {
    /// `metalink=` — an rpm-md metalink document.
    Metalink,
    /// `mirrorlist=` — a plain-text or legacy mirrorlist document.
    Mirrorlist,
}

/// Resolves `$releasever`/`$arch`/`$basearch`-style variables embedded in
/// repository URLs.
///
/// Implemented by `pkgrepo_core::RepoVariables`; declared here, rather than
/// in `pkgrepo-core`, so that `RepoInfo` can expose resolved URL views
/// without this crate depending on `pkgrepo-core` (which depends on this
/// crate for `RepoInfo` itself).
pub trait VariableResolver {
    /// Substitute all known variables in `raw`; an unrecognized
    /// `$name`/`${name}` reference expands to the empty string.
    fn resolve(&self, raw: &str) -> String;
}

/// A single repository entry, as read from (or destined to be written to) a
/// `.repo` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    base: InfoBase,

    /// Sort priority; lower sorts first. [`NO_PRIORITY`] means unset.
    pub priority: u32,

    /// Metadata format.
    pub repo_type: RepoType,

    /// Path to the `.repo` file this entry was loaded from, if any.
    pub path: Option<PathBuf>,

    /// Alias of the owning service, if this repository was added by one.
    pub service: Option<String>,

    /// `$releasever`-equivalent override scoped to this repository alone.
    pub target_distribution: Option<String>,

    /// Raw, unresolved `baseurl=` entries (may contain `$releasever` etc).
    pub base_urls: Vec<String>,

    /// Raw `mirrorlist=`/`metalink=` URL and which of the two it is.
    pub mirror_list_url: Option<(String, MirrorKind)>,

    /// Raw `gpgkey=` entries.
    pub gpg_key_urls: Vec<String>,

    /// Whether repository metadata signatures are checked.
    pub gpgcheck: TriBool,
    /// The last-validated outcome, persisted via the `.repo_gpgcheck`
    /// symlink; distinct from the configured `gpgcheck` flag.
    pub repo_gpgcheck: TriBool,
    /// Whether individual package signatures are checked.
    pub pkg_gpgcheck: TriBool,

    /// Whether downloaded packages are kept in the package cache after
    /// installation.
    pub keep_packages: bool,

    /// Cache root for parsed metadata (`%RAW%`).
    pub metadata_path: Option<PathBuf>,
    /// Cache root for downloaded packages (`%PKG%`).
    pub packages_path: Option<PathBuf>,
    /// Cache root for the compiled solv file (`%SLV%`).
    pub solv_cache_path: Option<PathBuf>,

    /// `content=` keywords this repository advertises, if declared.
    pub content_keywords: Option<Vec<String>>,
}

impl RepoInfo {
    /// Construct a minimal, disabled-by-default-false repository with only
    /// an alias set; everything else takes the `.repo` file defaults.
    pub fn new(alias: impl Into<String>) -> Result<Self, RepoError> {
        let base = InfoBase::new(alias);
        crate::base::validate_alias(&base.alias).map_err(|reason| RepoError::InvalidAlias {
            alias: base.alias.clone(),
            reason: reason.to_string(),
        })?;
        Ok(Self {
            base,
            priority: NO_PRIORITY,
            repo_type: RepoType::None,
            path: None,
            service: None,
            target_distribution: None,
            base_urls: Vec::new(),
            mirror_list_url: None,
            gpg_key_urls: Vec::new(),
            gpgcheck: TriBool::Indeterminate,
            repo_gpgcheck: TriBool::Indeterminate,
            pkg_gpgcheck: TriBool::Indeterminate,
            keep_packages: false,
            metadata_path: None,
            packages_path: None,
            solv_cache_path: None,
            content_keywords: None,
        })
    }

    /// The repository's alias.
    pub fn alias(&self) -> &str {
        &self.base.alias
    }

    /// The repository's display name.
    pub fn name(&self) -> &str {
        &self.base.name
    }

    /// Whether the repository is enabled.
    pub fn enabled(&self) -> bool {
        self.base.enabled
    }

    /// Whether the repository autorefreshes.
    pub fn autorefresh(&self) -> bool {
        self.base.autorefresh
    }

    /// Set the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.base.name = name.into();
    }

    /// Set enabled/disabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.base.enabled = enabled;
    }

    /// Set autorefresh.
    pub fn set_autorefresh(&mut self, autorefresh: bool) {
        self.base.autorefresh = autorefresh;
    }

    /// The filesystem-safe form of the alias, used to derive cache paths.
    pub fn escaped_alias(&self) -> String {
        self.base.escaped_alias()
    }

    /// Whether this repository has any usable source of metadata: a base
    /// URL, or a mirrorlist/metalink URL.
    pub fn has_url(&self) -> bool {
        !self.base_urls.is_empty() || self.mirror_list_url.is_some()
    }

    /// Derive the `%RAW%`/`%SLV%`/`%PKG%` cache paths from `cache_root` when
    /// they have not been explicitly set, per the `/%AUTO%` convention
    ///: `<root>/<escaped_alias>`.
    pub fn auto_populate_cache_paths(&mut self, cache_root: &std::path::Path) {
        let dir = cache_root.join(self.escaped_alias());
        if self.metadata_path.is_none() {
            self.metadata_path = Some(dir.join("raw"));
        }
        if self.solv_cache_path.is_none() {
            self.solv_cache_path = Some(dir.join("solv"));
        }
        if self.packages_path.is_none() {
            self.packages_path = Some(dir.join("packages"));
        }
    }

    /// Resolve every [`Self::base_urls`] entry against `resolver`, parsing
    /// the result as a URL. Entries that fail to parse after substitution
    /// are silently dropped, matching libzypp's tolerant `RepoInfo::baseUrls`
    /// iteration (a malformed single mirror must not abort the whole list).
    pub fn resolved_base_urls(&self, resolver: &dyn VariableResolver) -> Vec<Url> {
        self.base_urls
            .iter()
            .filter_map(|raw| Url::parse(&resolver.resolve(raw)).ok())
            .collect()
    }

    /// Resolve [`Self::mirror_list_url`] against `resolver`.
    pub fn resolved_mirror_list_url(&self, resolver: &dyn VariableResolver) -> Option<Url> {
        self.mirror_list_url
            .as_ref()
            .and_then(|(raw, _)| Url::parse(&resolver.resolve(raw)).ok())
    }

    /// Validate invariants that are only checkable once the entry is fully
    /// populated (as opposed to the alias-only check in [`Self::new`]):
    /// a repository must have at least one URL to be addable.
    pub fn validate(&self) -> Result<(), RepoError> {
        if !self.has_url() {
            return Err(RepoError::NoUrl {
                alias: self.alias().to_string(),
            });
        }
        Ok(())
    }

    /// Decode a `[alias]` section of a parsed `.repo` file. The section
    /// name is the alias.
    pub fn from_ini_section(section: &IniSection) -> Result<Self, RepoError> {
        let mut repo = Self::new(section.name.clone())?;

        if let Some(name) = section.get("name") {
            repo.set_name(name);
        }
        if let Some(v) = section.get("enabled") {
            repo.set_enabled(v.trim() != "0");
        }
        if let Some(v) = section.get("autorefresh") {
            repo.set_autorefresh(v.trim() != "0");
        }
        if let Some(v) = section.get("priority") {
            repo.priority = v.trim().parse().unwrap_or(NO_PRIORITY);
        }
        if let Some(v) = section.get("type") {
            repo.repo_type = v.parse().unwrap_or(RepoType::None);
        }
        repo.base_urls = section.get_all("baseurl");
        if let Some(url) = section.get("metalink") {
            repo.mirror_list_url = Some((url.to_string(), MirrorKind::Metalink));
        } else if let Some(url) = section.get("mirrorlist") {
            repo.mirror_list_url = Some((url.to_string(), MirrorKind::Mirrorlist));
        }
        repo.gpg_key_urls = section.get_all("gpgkey");
        if let Some(v) = section.get("gpgcheck") {
            repo.gpgcheck = TriBool::parse(v);
        }
        if let Some(v) = section.get("repo_gpgcheck") {
            repo.repo_gpgcheck = TriBool::parse(v);
        }
        if let Some(v) = section.get("pkg_gpgcheck") {
            repo.pkg_gpgcheck = TriBool::parse(v);
        }
        if let Some(v) = section.get("keeppackages") {
            repo.keep_packages = v.trim() != "0";
        }
        if let Some(v) = section.get("path") {
            repo.path = Some(PathBuf::from(v));
        }
        if let Some(v) = section.get("targettype") {
            repo.target_distribution = Some(v.to_string());
        }
        let keywords = section.get_all("content");
        if !keywords.is_empty() {
            repo.content_keywords = Some(keywords);
        }

        Ok(repo)
    }

    /// Encode this repository as a `[alias]` section for `.repo` file
    /// output. Indeterminate `TriBool` flags are omitted entirely so a
    /// file round-tripped through this codec does not pin values the
    /// original left for the config default to decide.
    pub fn to_ini_section(&self) -> IniSection {
        let mut section = IniSection {
            name: self.base.alias.clone(),
            entries: Vec::new(),
        };
        section.push("name", &self.base.name);
        section.push("enabled", if self.base.enabled { "1" } else { "0" });
        section.push("autorefresh", if self.base.autorefresh { "1" } else { "0" });
        if self.priority != NO_PRIORITY {
            section.push("priority", self.priority.to_string());
        }
        if let Some(value) = self.repo_type.as_ini_value() {
            section.push("type", value);
        }
        section.push_multi("baseurl", &self.base_urls);
        if let Some((url, kind)) = &self.mirror_list_url {
            match kind {
                MirrorKind::Metalink => section.push("metalink", url),
                MirrorKind::Mirrorlist => section.push("mirrorlist", url),
            }
        }
        section.push_multi("gpgkey", &self.gpg_key_urls);
        if let Some(v) = self.gpgcheck.as_ini_value() {
            section.push("gpgcheck", v);
        }
        if let Some(v) = self.repo_gpgcheck.as_ini_value() {
            section.push("repo_gpgcheck", v);
        }
        if let Some(v) = self.pkg_gpgcheck.as_ini_value() {
            section.push("pkg_gpgcheck", v);
        }
        section.push("keeppackages", if self.keep_packages { "1" } else { "0" });
        if let Some(path) = &self.path {
            section.push("path", path.to_string_lossy());
        }
        if let Some(target) = &self.target_distribution {
            section.push("targettype", target);
        }
        if let Some(keywords) = &self.content_keywords {
            section.push_multi("content", keywords);
        }
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity;
    impl VariableResolver for Identity {
        fn resolve(&self, raw: &str) -> String {
            raw.replace("$releasever", "15.6").replace("$basearch", "x86_64")
        }
    }

    #[test]
    fn rejects_invalid_alias() {
        assert!(RepoInfo::new("").is_err());
        assert!(RepoInfo::new(".hidden").is_err());
    }

    #[test]
    fn validate_requires_a_url() {
        let repo = RepoInfo::new("oss").unwrap();
        assert!(matches!(repo.validate(), Err(RepoError::NoUrl { .. })));
    }

    #[test]
    fn resolves_variables_in_base_urls() {
        let mut repo = RepoInfo::new("oss").unwrap();
        repo.base_urls
            .push("https://example.com/$releasever/$basearch".to_string());
        let resolved = repo.resolved_base_urls(&Identity);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].as_str(), "https://example.com/15.6/x86_64");
    }

    #[test]
    fn drops_urls_that_fail_to_parse_after_substitution() {
        let mut repo = RepoInfo::new("oss").unwrap();
        repo.base_urls.push("not a url".to_string());
        repo.base_urls
            .push("https://example.com/$releasever".to_string());
        assert_eq!(repo.resolved_base_urls(&Identity).len(), 1);
    }

    #[test]
    fn round_trips_through_ini_section() {
        let mut repo = RepoInfo::new("oss").unwrap();
        repo.set_name("openSUSE OSS");
        repo.priority = 50;
        repo.repo_type = RepoType::RpmMd;
        repo.base_urls = vec![
            "https://a.example/repo".to_string(),
            "https://b.example/repo".to_string(),
        ];
        repo.gpgcheck = TriBool::Yes;
        repo.keep_packages = true;

        let section = repo.to_ini_section();
        let decoded = RepoInfo::from_ini_section(&section).unwrap();
        assert_eq!(decoded, repo);
    }

    #[test]
    fn auto_populate_only_fills_unset_paths() {
        let mut repo = RepoInfo::new("oss").unwrap();
        repo.solv_cache_path = Some(PathBuf::from("/custom/solv"));
        repo.auto_populate_cache_paths(std::path::Path::new("/var/cache/pkgrepo"));
        assert_eq!(repo.solv_cache_path, Some(PathBuf::from("/custom/solv")));
        assert_eq!(
            repo.metadata_path,
            Some(PathBuf::from("/var/cache/pkgrepo/oss/raw"))
        );
    }
}

/// Property: `parse(dumpAsIni(r)) == r` for every `RepoInfo` this core can
/// emit. Fields that the codec deliberately omits when
/// indeterminate (`TriBool::Indeterminate`, `RepoType::None`,
/// `NO_PRIORITY`) are exactly the codec's own defaults, so the round trip
/// holds without needing a lossy-field allowance list.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn alias_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_.-]{0,15}".prop_filter("must not start with '.'", |s| !s.starts_with('.'))
    }

    fn tribool_strategy() -> impl Strategy<Value = TriBool> {
        prop_oneof![Just(TriBool::Yes), Just(TriBool::No), Just(TriBool::Indeterminate)]
    }

    fn repo_type_strategy() -> impl Strategy<Value = RepoType> {
        prop_oneof![
            Just(RepoType::None),
            Just(RepoType::RpmMd),
            Just(RepoType::Yast2),
            Just(RepoType::PlainDir),
        ]
    }

    fn url_list_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("https://[a-z]{3,8}\\.example/[a-z]{0,8}", 0..4)
    }

    fn repo_info_strategy() -> impl Strategy<Value = RepoInfo> {
        (
            alias_strategy(),
            "[a-zA-Z0-9 ]{0,24}",
            any::<bool>(),
            any::<bool>(),
            prop_oneof![Just(NO_PRIORITY), 1u32..=99u32],
            repo_type_strategy(),
            url_list_strategy(),
            url_list_strategy(),
            tribool_strategy(),
            tribool_strategy(),
            tribool_strategy(),
            any::<bool>(),
        )
            .prop_map(
                |(alias, name, enabled, autorefresh, priority, repo_type, base_urls, gpg_key_urls, gpgcheck, repo_gpgcheck, pkg_gpgcheck, keep_packages)| {
                    let mut repo = RepoInfo::new(alias).unwrap();
                    repo.set_name(name);
                    repo.set_enabled(enabled);
                    repo.set_autorefresh(autorefresh);
                    repo.priority = priority;
                    repo.repo_type = repo_type;
                    repo.base_urls = base_urls;
                    repo.gpg_key_urls = gpg_key_urls;
                    repo.gpgcheck = gpgcheck;
                    repo.repo_gpgcheck = repo_gpgcheck;
                    repo.pkg_gpgcheck = pkg_gpgcheck;
                    repo.keep_packages = keep_packages;
                    repo
                },
            )
    }

    proptest! {
        #[test]
        fn ini_round_trip(repo in repo_info_strategy()) {
            let section = repo.to_ini_section();
            let decoded = RepoInfo::from_ini_section(&section).unwrap();
            prop_assert_eq!(decoded, repo);
        }
    }
}
