//! On-disk `.repo`/`.service` file scanning and rewriting: `<knownReposPath>/*.repo` (allowing the collision suffix
//! `.repo_N`) and `<knownServicesPath>/*.service`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pkgrepo_repoinfo::{parse_ini, write_ini, IniSection, RepoInfo, ServiceInfo};

use crate::error::{ManagerError, ManagerResult};

/// Whether `file_name` is a `.repo` file this manager owns, including the
/// `.repo_N` collision-avoidance suffix.
pub fn is_repo_file_name(file_name: &str) -> bool {
    has_suffix_or_numbered_variant(file_name, ".repo")
}

/// Whether `file_name` is a `.service` file this manager owns.
pub fn is_service_file_name(file_name: &str) -> bool {
    has_suffix_or_numbered_variant(file_name, ".service")
}

fn has_suffix_or_numbered_variant(file_name: &str, suffix: &str) -> bool {
    if file_name.ends_with(suffix) {
        return true;
    }
    let marker = format!("{suffix}_");
    match file_name.rfind(&marker) {
        Some(pos) => file_name[pos + marker.len()..]
            .chars()
            .all(|c| c.is_ascii_digit())
            && !file_name[pos + marker.len()..].is_empty(),
        None => false,
    }
}

/// One `.repo` file on disk together with the repositories parsed out of
/// it, in file order.
pub struct RepoFile {
    pub path: PathBuf,
    pub repos: Vec<RepoInfo>,
}

/// Scan `dir` for every `.repo`/`.repo_N` file, parsing each into its
/// constituent repositories. Missing `dir` is treated as empty (a fresh
/// root with no known repositories yet), not an error.
pub fn scan_repo_files(dir: &Path) -> ManagerResult<Vec<RepoFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ManagerError::io(dir, e))? {
        let entry = entry.map_err(|e| ManagerError::io(dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !is_repo_file_name(name) {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ManagerError::io(&path, e))?;
        let mut repos = Vec::new();
        for section in parse_ini(&text) {
            match RepoInfo::from_ini_section(&section) {
                Ok(repo) => repos.push(repo),
                Err(e) => tracing::warn!(file = %path.display(), error = %e, "skipping unparsable repo section"),
            }
        }
        files.push(RepoFile { path, repos });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// One `.service` file on disk together with its single service entry.
pub struct ServiceFile {
    pub path: PathBuf,
    pub service: ServiceInfo,
}

/// Scan `dir` for every `.service` file. Each file holds exactly one
/// service section, matching how [`generate_service_file_path`] names new
/// files and how libzypp's service store is laid out in practice.
pub fn scan_service_files(dir: &Path) -> ManagerResult<Vec<ServiceFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ManagerError::io(dir, e))? {
        let entry = entry.map_err(|e| ManagerError::io(dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !is_service_file_name(name) {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ManagerError::io(&path, e))?;
        let Some(section) = parse_ini(&text).into_iter().next() else {
            continue;
        };
        match ServiceInfo::from_ini_section(&section) {
            Ok(service) => files.push(ServiceFile { path, service }),
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "skipping unparsable service file"),
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Scan a plugin services directory: every regular file's name is an
/// alias, its content irrelevant (the plugin itself, not a `.service`
/// INI), producing immutable [`ServiceInfo::new_plugin`] entries.
pub fn scan_plugin_services(dir: &Path) -> ManagerResult<Vec<ServiceInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut services = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ManagerError::io(dir, e))? {
        let entry = entry.map_err(|e| ManagerError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match ServiceInfo::new_plugin(name) {
            Ok(service) => services.push(service),
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "skipping invalid plugin service name"),
        }
    }
    Ok(services)
}

/// Pick a non-colliding `.repo` file path for a brand-new repository named
/// `alias`, under `dir`: `<alias>.repo`, then `<alias>.repo_1`,
/// `<alias>.repo_2`, ....
pub fn generate_repo_file_path(dir: &Path, alias: &str) -> PathBuf {
    generate_unique_path(dir, alias, "repo")
}

/// Pick a non-colliding `.service` file path for a brand-new service.
pub fn generate_service_file_path(dir: &Path, alias: &str) -> PathBuf {
    generate_unique_path(dir, alias, "service")
}

fn generate_unique_path(dir: &Path, alias: &str, extension: &str) -> PathBuf {
    let safe = pkgrepo_repoinfo::escape_alias(alias);
    let first = dir.join(format!("{safe}.{extension}"));
    if !first.exists() {
        return first;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{safe}.{extension}_{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Rewrite `path` to contain exactly `repos`, in order. An empty `repos`
/// deletes the file entirely.
pub fn write_repo_file(path: &Path, repos: &[RepoInfo]) -> ManagerResult<()> {
    if repos.is_empty() {
        return remove_if_exists(path);
    }
    let sections: Vec<IniSection> = repos.iter().map(RepoInfo::to_ini_section).collect();
    write_atomic(path, write_ini(&sections).as_bytes())
}

/// Rewrite `path` to contain `service`, or delete it if `service` is
/// `None` (the service was removed).
pub fn write_service_file(path: &Path, service: Option<&ServiceInfo>) -> ManagerResult<()> {
    match service {
        None => remove_if_exists(path),
        Some(service) => write_atomic(path, write_ini(&[service.to_ini_section()]).as_bytes()),
    }
}

fn remove_if_exists(path: &Path) -> ManagerResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ManagerError::io(path, e)),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> ManagerResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ManagerError::io(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| ManagerError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| ManagerError::io(path, e))
}

/// Index a set of scanned repo files by alias, for the manager's startup
/// load. The last file encountered for a duplicated alias wins, matching
/// [`pkgrepo_repoinfo::index_by_name`]'s tolerant re-read semantics.
pub fn index_repos_by_alias(files: &[RepoFile]) -> BTreeMap<String, (PathBuf, RepoInfo)> {
    let mut map = BTreeMap::new();
    for file in files {
        for repo in &file.repos {
            map.insert(repo.alias().to_string(), (file.path.clone(), repo.clone()));
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn matches_plain_and_numbered_repo_files() {
        assert!(is_repo_file_name("oss.repo"));
        assert!(is_repo_file_name("oss.repo_1"));
        assert!(is_repo_file_name("oss.repo_42"));
        assert!(!is_repo_file_name("oss.service"));
        assert!(!is_repo_file_name("oss.repo_"));
    }

    #[test]
    fn generates_numbered_path_on_collision() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("oss.repo"), "").unwrap();
        let path = generate_repo_file_path(dir.path(), "oss");
        assert_eq!(path, dir.path().join("oss.repo_1"));
    }

    #[test]
    fn write_repo_file_deletes_when_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("oss.repo");
        std::fs::write(&path, "[oss]\nname = OSS\n").unwrap();
        write_repo_file(&path, &[]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn scan_round_trips_multi_repo_file() {
        let dir = tempdir().unwrap();
        let a = RepoInfo::new("a").unwrap();
        let mut b = RepoInfo::new("b").unwrap();
        b.base_urls.push("https://example.com/b".to_string());
        let path = dir.path().join("shared.repo");
        write_repo_file(&path, &[a, b]).unwrap();

        let files = scan_repo_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].repos.len(), 2);
        assert_eq!(files[0].repos[1].base_urls, vec!["https://example.com/b".to_string()]);
    }
}
