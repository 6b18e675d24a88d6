//! `ServiceInfo`: a repository index service, capable of adding/removing
//! repositories it owns on refresh.

use std::collections::{BTreeMap, BTreeSet};

use url::Url;

use crate::base::InfoBase;
use crate::error::ServiceError;
use crate::ini::IniSection;

/// The per-repository state a service remembers across a disable/enable
/// cycle (`{enabled, autorefresh, priority}` keyed by alias), so that
/// re-enabling a service can restore what its repositories looked like
/// before it was disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoState {
    pub enabled: bool,
    pub autorefresh: bool,
    pub priority: u32,
}

/// How a service's repository set was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    /// A plain repoindex service (the only kind this crate constructs
    /// directly).
    RepoIndex,
    /// Backed by an external plugin; immutable from here.
    Plugin,
}

/// A single `.service` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    base: InfoBase,
    service_type: ServiceType,

    /// The service's index URL.
    pub url: Option<Url>,

    /// Repository aliases this service is known to have added, tracked so
    /// a subsequent refresh can detect ones it no longer lists.
    pub repos: BTreeSet<String>,

    /// One-shot `repostoenable=`/`repostodisable=` sets read from the
    /// `.service` file on the *next* refresh only, then cleared.
    pub repos_to_enable: BTreeSet<String>,
    pub repos_to_disable: BTreeSet<String>,

    /// Refresh interval in seconds; `0` means "every refresh".
    pub ttl: u64,
    /// Unix timestamp of the last successful refresh, if any.
    pub last_refresh: Option<i64>,
    /// Last-known per-repository state, restored onto repositories this
    /// service owns when the service transitions disabled -> enabled.
    pub repo_states: BTreeMap<String, RepoState>,
}

impl ServiceInfo {
    /// Construct a repoindex-backed service.
    pub fn new(alias: impl Into<String>, url: Url) -> Result<Self, ServiceError> {
        let base = InfoBase::new(alias);
        crate::base::validate_alias(&base.alias).map_err(|reason| ServiceError::InvalidAlias {
            alias: base.alias.clone(),
            reason: reason.to_string(),
        })?;
        Ok(Self {
            base,
            service_type: ServiceType::RepoIndex,
            url: Some(url),
            repos: BTreeSet::new(),
            repos_to_enable: BTreeSet::new(),
            repos_to_disable: BTreeSet::new(),
            ttl: 0,
            last_refresh: None,
            repo_states: BTreeMap::new(),
        })
    }

    /// Construct a plugin-backed service, which cannot be modified through
    /// [`Self::set_url`]/[`Self::set_name`] after construction.
    pub fn new_plugin(alias: impl Into<String>) -> Result<Self, ServiceError> {
        let base = InfoBase::new(alias);
        crate::base::validate_alias(&base.alias).map_err(|reason| ServiceError::InvalidAlias {
            alias: base.alias.clone(),
            reason: reason.to_string(),
        })?;
        Ok(Self {
            base,
            service_type: ServiceType::Plugin,
            url: None,
            repos: BTreeSet::new(),
            repos_to_enable: BTreeSet::new(),
            repos_to_disable: BTreeSet::new(),
            ttl: 0,
            last_refresh: None,
            repo_states: BTreeMap::new(),
        })
    }

    pub fn alias(&self) -> &str {
        &self.base.alias
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn enabled(&self) -> bool {
        self.base.enabled
    }

    pub fn autorefresh(&self) -> bool {
        self.base.autorefresh
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn escaped_alias(&self) -> String {
        self.base.escaped_alias()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.base.enabled = enabled;
    }

    pub fn set_autorefresh(&mut self, autorefresh: bool) {
        self.base.autorefresh = autorefresh;
    }

    /// Rename the service. Rejected for plugin-backed services.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ServiceError> {
        self.reject_if_plugin()?;
        self.base.name = name.into();
        Ok(())
    }

    /// Point the service at a new URL. Rejected for plugin-backed services.
    pub fn set_url(&mut self, url: Url) -> Result<(), ServiceError> {
        self.reject_if_plugin()?;
        self.url = Some(url);
        Ok(())
    }

    fn reject_if_plugin(&self) -> Result<(), ServiceError> {
        if self.service_type == ServiceType::Plugin {
            return Err(ServiceError::PluginImmutable {
                alias: self.alias().to_string(),
            });
        }
        Ok(())
    }

    /// Record the repository set this service currently declares, returning
    /// the aliases that were present before but are absent now (these are
    /// the ones a refresh should remove).
    pub fn replace_repos(&mut self, new_repos: BTreeSet<String>) -> BTreeSet<String> {
        let removed: BTreeSet<String> = self.repos.difference(&new_repos).cloned().collect();
        self.repos = new_repos;
        removed
    }

    /// Consume and clear the one-shot enable/disable sets, returning them.
    /// These apply only to the refresh that reads them.
    pub fn take_one_shot_sets(&mut self) -> (BTreeSet<String>, BTreeSet<String>) {
        (
            std::mem::take(&mut self.repos_to_enable),
            std::mem::take(&mut self.repos_to_disable),
        )
    }

    /// Record `state` as the last-known state for `alias`, so a future
    /// disable -> enable transition can restore it.
    pub fn record_repo_state(&mut self, alias: impl Into<String>, state: RepoState) {
        self.repo_states.insert(alias.into(), state);
    }

    /// The last-recorded state for `alias`, if any.
    pub fn repo_state(&self, alias: &str) -> Option<RepoState> {
        self.repo_states.get(alias).copied()
    }

    /// Decode a `[alias]` section of a parsed `.service` file. A missing or
    /// unparsable `url=` demotes the service to plugin-backed rather than
    /// failing the whole file load, matching `ServiceType::Plugin`'s role
    /// as the catch-all for services this crate cannot drive itself.
    pub fn from_ini_section(section: &IniSection) -> Result<Self, ServiceError> {
        let url = section.get("url").and_then(|u| Url::parse(u).ok());
        let mut svc = match url {
            Some(url) => Self::new(section.name.clone(), url)?,
            None => Self::new_plugin(section.name.clone())?,
        };

        if let Some(name) = section.get("name") {
            // set_name only fails for plugin services; a plugin service's
            // `.service` file is never expected to carry a `name=` override.
            let _ = svc.set_name(name);
        }
        if let Some(v) = section.get("enabled") {
            svc.set_enabled(v.trim() != "0");
        }
        if let Some(v) = section.get("autorefresh") {
            svc.set_autorefresh(v.trim() != "0");
        }
        svc.repos = section.get_all("repos").into_iter().collect();
        svc.repos_to_enable = section.get_all("repostoenable").into_iter().collect();
        svc.repos_to_disable = section.get_all("repostodisable").into_iter().collect();
        if let Some(v) = section.get("ttl") {
            svc.ttl = v.trim().parse().unwrap_or(0);
        }
        if let Some(v) = section.get("lrf") {
            svc.last_refresh = v.trim().parse().ok();
        }

        for (key, value) in &section.entries {
            let Some(rest) = key.strip_prefix("repo_") else {
                continue;
            };
            let (alias, field) = match rest.rsplit_once('_') {
                Some((alias, field)) => (alias, field),
                None => continue,
            };
            let state = svc.repo_states.entry(alias.to_string()).or_insert(RepoState {
                enabled: true,
                autorefresh: false,
                priority: crate::repoinfo::NO_PRIORITY,
            });
            match field {
                "enabled" => state.enabled = value.trim() != "0",
                "autorefresh" => state.autorefresh = value.trim() != "0",
                "priority" => state.priority = value.trim().parse().unwrap_or(crate::repoinfo::NO_PRIORITY),
                _ => {}
            }
        }

        Ok(svc)
    }

    /// Encode this service as a `[alias]` section for `.service` file
    /// output.
    pub fn to_ini_section(&self) -> IniSection {
        let mut section = IniSection {
            name: self.base.alias.clone(),
            entries: Vec::new(),
        };
        section.push("name", &self.base.name);
        section.push("enabled", if self.base.enabled { "1" } else { "0" });
        section.push("autorefresh", if self.base.autorefresh { "1" } else { "0" });
        if let Some(url) = &self.url {
            section.push("url", url.as_str());
        }
        let repos: Vec<String> = self.repos.iter().cloned().collect();
        section.push_multi("repos", &repos);
        let to_enable: Vec<String> = self.repos_to_enable.iter().cloned().collect();
        section.push_multi("repostoenable", &to_enable);
        let to_disable: Vec<String> = self.repos_to_disable.iter().cloned().collect();
        section.push_multi("repostodisable", &to_disable);
        section.push("ttl", self.ttl.to_string());
        if let Some(lrf) = self.last_refresh {
            section.push("lrf", lrf.to_string());
        }
        for (alias, state) in &self.repo_states {
            section.push(format!("repo_{alias}_enabled"), if state.enabled { "1" } else { "0" });
            section.push(format!("repo_{alias}_autorefresh"), if state.autorefresh { "1" } else { "0" });
            if state.priority != crate::repoinfo::NO_PRIORITY {
                section.push(format!("repo_{alias}_priority"), state.priority.to_string());
            }
        }
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn plugin_services_reject_mutation() {
        let mut svc = ServiceInfo::new_plugin("dvd").unwrap();
        assert!(matches!(
            svc.set_url(url("https://example.com/repo")),
            Err(ServiceError::PluginImmutable { .. })
        ));
        assert!(matches!(
            svc.set_name("DVD"),
            Err(ServiceError::PluginImmutable { .. })
        ));
    }

    #[test]
    fn replace_repos_reports_removed_aliases() {
        let mut svc = ServiceInfo::new("main", url("https://example.com/service")).unwrap();
        svc.replace_repos(["a", "b"].into_iter().map(String::from).collect());
        let removed = svc.replace_repos(["b", "c"].into_iter().map(String::from).collect());
        assert_eq!(removed, BTreeSet::from(["a".to_string()]));
        assert_eq!(svc.repos, BTreeSet::from(["b".to_string(), "c".to_string()]));
    }

    #[test]
    fn round_trips_through_ini_section() {
        let mut svc = ServiceInfo::new("main", url("https://example.com/service")).unwrap();
        svc.replace_repos(["a", "b"].into_iter().map(String::from).collect());
        let section = svc.to_ini_section();
        let decoded = ServiceInfo::from_ini_section(&section).unwrap();
        assert_eq!(decoded, svc);
    }

    #[test]
    fn missing_url_decodes_as_plugin_backed() {
        let mut section = IniSection {
            name: "dvd".to_string(),
            entries: Vec::new(),
        };
        section.push("enabled", "1");
        let svc = ServiceInfo::from_ini_section(&section).unwrap();
        assert_eq!(svc.service_type(), ServiceType::Plugin);
    }

    #[test]
    fn round_trips_ttl_lrf_and_repo_states() {
        let mut svc = ServiceInfo::new("main", url("https://example.com/service")).unwrap();
        svc.ttl = 3600;
        svc.last_refresh = Some(1_700_000_000);
        svc.record_repo_state(
            "oss",
            RepoState {
                enabled: false,
                autorefresh: true,
                priority: 42,
            },
        );
        let section = svc.to_ini_section();
        let decoded = ServiceInfo::from_ini_section(&section).unwrap();
        assert_eq!(decoded, svc);
        assert_eq!(
            decoded.repo_state("oss"),
            Some(RepoState {
                enabled: false,
                autorefresh: true,
                priority: 42,
            })
        );
    }

    #[test]
    fn one_shot_sets_are_cleared_after_being_taken() {
        let mut svc = ServiceInfo::new("main", url("https://example.com/service")).unwrap();
        svc.repos_to_enable.insert("a".to_string());
        let (enable, disable) = svc.take_one_shot_sets();
        assert_eq!(enable, BTreeSet::from(["a".to_string()]));
        assert!(disable.is_empty());
        let (enable_again, _) = svc.take_one_shot_sets();
        assert!(enable_again.is_empty());
    }
}
