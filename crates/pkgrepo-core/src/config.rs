//! `Config`: INI-plus-environment configuration, read once at
//! [`crate::Context`] construction.
//!
//! Values are layered lowest-to-highest: compiled-in default, `zypp.conf`
//! `[main]` section, then a handful of `ZYPP_*` environment overrides used
//! for scripted/CI runs. This crate does not watch the file for changes;
//! config is a snapshot for the lifetime of the `Context`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

const ENV_CONF_PATH: &str = "ZYPP_CONF";
const ENV_READONLY_HACK: &str = "ZYPP_READONLY_HACK";
const ENV_LOCK_TIMEOUT: &str = "ZYPP_LOCK_TIMEOUT";
const ENV_CURL_IPRESOLVE: &str = "ZYPP_MEDIA_CURL_IPRESOLVE";
const ENV_CURL_DEBUG: &str = "ZYPP_MEDIA_CURL_DEBUG";

/// Which IP protocol a provider implementation should prefer, surfaced from
/// `ZYPP_MEDIA_CURL_IPRESOLVE` for providers that shell out to curl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpResolve {
    #[default]
    Whatever,
    V4Only,
    V6Only,
}

/// Runtime configuration shared by every crate in this workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root directory repository/service `.repo`/`.service` files live
    /// under (`/etc/zypp/repos.d` equivalent).
    pub repos_dir: PathBuf,
    /// Root directory `.service` files live under.
    pub services_dir: PathBuf,
    /// Root of the on-disk cache (parsed metadata, solv files, packages).
    pub cache_root: PathBuf,
    /// Root of the trusted/general keyring storage.
    pub keyring_root: PathBuf,
    /// Directory holding global (system-wide) stored credentials.
    pub global_credentials_dir: PathBuf,
    /// Directory holding the current user's stored credentials.
    pub user_credentials_dir: PathBuf,
    /// Directory `credentials=<file>` query parameters resolve relative
    /// names under.
    pub credentials_dir: PathBuf,

    /// Top-level package cache, distinct from a repo's own `packagesPath`.
    pub package_cache_path: PathBuf,
    /// Root directory trusted/untrusted public key files are fetched into
    /// before import, used by the signature workflow's
    /// provide-and-import-from-repository step.
    pub pubkey_cache_path: PathBuf,
    /// Default root for per-repository compiled solv caches.
    pub solv_cache_root: PathBuf,
    /// Default root for per-repository parsed metadata caches.
    pub metadata_cache_root: PathBuf,
    /// Default root per-repository package caches live under — distinct
    /// from [`Self::package_cache_path`], the optional top-level cache a
    /// `PackageProvider` checks first.
    pub package_cache_root: PathBuf,

    /// How long cached metadata is considered fresh before a refresh is
    /// attempted, absent an explicit `refresh` request.
    pub repo_refresh_delay: Duration,
    /// Default for `RepoInfo::gpgcheck` when a `.repo` file omits it.
    pub gpgcheck_default: bool,
    /// Default for `RepoInfo::repo_gpgcheck` when a `.repo` file omits it.
    pub repo_gpgcheck_default: bool,
    /// Default for `RepoInfo::pkg_gpgcheck` when a `.repo` file omits it.
    pub pkg_gpgcheck_default: bool,

    /// Maximum retry attempts for a single download before surfacing an
    /// error to the caller.
    pub download_max_retries: u32,

    /// `ZYPP_READONLY_HACK`: skip the exclusion lock entirely.
    pub readonly_hack: bool,
    /// How long to wait for the exclusion lock before giving up. `None`
    /// means wait forever (`ZYPP_LOCK_TIMEOUT` negative or unset maps to a
    /// generous built-in default, not literally forever, unless the caller
    /// opts in via [`Self::lock_timeout`] being explicitly `None`).
    pub lock_timeout: Option<Duration>,

    /// Preferred IP protocol for curl-backed providers.
    pub curl_ip_resolve: IpResolve,
    /// Verbose curl protocol logging, for providers that wrap curl.
    pub curl_debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        let cache_root = PathBuf::from("/var/cache/pkgrepo");
        Self {
            repos_dir: PathBuf::from("/etc/pkgrepo/repos.d"),
            services_dir: PathBuf::from("/etc/pkgrepo/services.d"),
            keyring_root: PathBuf::from("/etc/pkgrepo/keyring"),
            global_credentials_dir: PathBuf::from("/etc/pkgrepo/credentials.d"),
            user_credentials_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/root"))
                .join(".pkgrepo/credentials.d"),
            credentials_dir: PathBuf::from("/etc/pkgrepo/credentials.d"),
            package_cache_path: cache_root.join("packages"),
            pubkey_cache_path: cache_root.join("pubkeys"),
            solv_cache_root: cache_root.join("solv"),
            metadata_cache_root: cache_root.join("raw"),
            package_cache_root: cache_root.join("packages"),
            cache_root,
            repo_refresh_delay: Duration::from_secs(10 * 60),
            gpgcheck_default: true,
            repo_gpgcheck_default: true,
            pkg_gpgcheck_default: true,
            download_max_retries: 3,
            readonly_hack: false,
            lock_timeout: Some(Duration::from_secs(60)),
            curl_ip_resolve: IpResolve::default(),
            curl_debug: false,
        }
    }
}

impl Config {
    /// Build a [`Config`] by layering defaults, the `zypp.conf`-style INI
    /// file at `path` (if it exists), and environment overrides.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let mut config = Self::default();

        let conf_path = path
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(ENV_CONF_PATH).map(PathBuf::from));

        if let Some(conf_path) = &conf_path {
            if conf_path.exists() {
                let text = std::fs::read_to_string(conf_path)
                    .map_err(|e| CoreError::io(conf_path.clone(), e))?;
                config.apply_ini(&text, conf_path)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_ini(&mut self, text: &str, path: &Path) -> CoreResult<()> {
        for section in pkgrepo_repoinfo_ini_compat(text) {
            if section.0 != "main" {
                continue;
            }
            for (key, value) in section.1 {
                self.apply_main_key(&key, &value, path)?;
            }
        }
        Ok(())
    }

    fn apply_main_key(&mut self, key: &str, value: &str, path: &Path) -> CoreResult<()> {
        let parse_bool = |v: &str| v.trim() != "0" && !v.trim().eq_ignore_ascii_case("false");
        match key {
            "reposdir" => self.repos_dir = PathBuf::from(value),
            "servicesdir" => self.services_dir = PathBuf::from(value),
            "cachedir" => self.cache_root = PathBuf::from(value),
            "credentials.global.dir" => self.global_credentials_dir = PathBuf::from(value),
            "credentials.user.dir" => self.user_credentials_dir = PathBuf::from(value),
            "credentials.dir" => self.credentials_dir = PathBuf::from(value),
            "pkgcachedir" => self.package_cache_path = PathBuf::from(value),
            "pubkeycachedir" => self.pubkey_cache_path = PathBuf::from(value),
            "solvcachedir" => self.solv_cache_root = PathBuf::from(value),
            "metadatacachedir" => self.metadata_cache_root = PathBuf::from(value),
            "repo.refresh.delay" => {
                let minutes: u64 = value.trim().parse().map_err(|_| CoreError::Config {
                    path: path.to_path_buf(),
                    detail: format!("invalid repo.refresh.delay '{value}'"),
                })?;
                self.repo_refresh_delay = Duration::from_secs(minutes * 60);
            }
            "gpgcheck" => self.gpgcheck_default = parse_bool(value),
            "repo_gpgcheck" => self.repo_gpgcheck_default = parse_bool(value),
            "pkg_gpgcheck" => self.pkg_gpgcheck_default = parse_bool(value),
            "download.max_retries" => {
                self.download_max_retries = value.trim().parse().map_err(|_| CoreError::Config {
                    path: path.to_path_buf(),
                    detail: format!("invalid download.max_retries '{value}'"),
                })?;
            }
            // Unknown keys are forward-compatible no-ops: a newer config
            // file read by an older binary should not fail outright.
            _ => tracing::debug!(%key, "ignoring unrecognized config key"),
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_READONLY_HACK) {
            self.readonly_hack = v.trim() != "0";
        }
        if let Ok(v) = std::env::var(ENV_LOCK_TIMEOUT) {
            match v.trim().parse::<i64>() {
                Ok(n) if n < 0 => self.lock_timeout = None,
                Ok(n) => self.lock_timeout = Some(Duration::from_secs(n as u64)),
                Err(_) => tracing::warn!(value = %v, "ignoring malformed ZYPP_LOCK_TIMEOUT"),
            }
        }
        if let Ok(v) = std::env::var(ENV_CURL_IPRESOLVE) {
            self.curl_ip_resolve = match v.trim() {
                "4" => IpResolve::V4Only,
                "6" => IpResolve::V6Only,
                _ => IpResolve::Whatever,
            };
        }
        if let Ok(v) = std::env::var(ENV_CURL_DEBUG) {
            self.curl_debug = v.trim() != "0";
        }
    }
}

/// Minimal INI reader for `zypp.conf`-style files: `[section]` headers and
/// `key = value` pairs, no continuation lines (unlike `.repo`/`.service`
/// files, `zypp.conf` values are always single-line).
fn pkgrepo_repoinfo_ini_compat(text: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            sections.push((trimmed[1..trimmed.len() - 1].to_string(), Vec::new()));
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            if let Some(section) = sections.last_mut() {
                section.1.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.gpgcheck_default);
        assert_eq!(config.download_max_retries, 3);
    }

    #[test]
    fn load_applies_ini_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[main]\ngpgcheck = 0\ndownload.max_retries = 7\n").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert!(!config.gpgcheck_default);
        assert_eq!(config.download_max_retries, 7);
    }

    #[test]
    fn missing_conf_file_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/zypp.conf"))).unwrap();
        assert_eq!(config, Config::default());
    }
}
