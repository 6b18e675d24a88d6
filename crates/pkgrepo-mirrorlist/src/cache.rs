//! Disk cache for a parsed mirror document.
//!
//! The cache lives next to a repository's metadata directory as
//! `mirrorlist.{xml|json|txt}` plus a sibling `mirrorlist.cookie` holding
//! the hex SHA-256 of the source URL the cached content was produced from.
//! A cache is stale when the cookie no longer matches the current source
//! URL, or when its age exceeds the configured refresh delay *and* the
//! directory is still writable (a read-only cache directory is used as-is
//! forever rather than re-fetched on every call).

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{MirrorListError, MirrorListResult};
use crate::model::{MirrorList, MirrorListFormat};

const COOKIE_NAME: &str = "mirrorlist.cookie";

fn cookie_for(url: &Url) -> String {
    hex::encode(Sha256::digest(url.as_str().as_bytes()))
}

fn cache_file_name(format: MirrorListFormat) -> String {
    format!("mirrorlist.{}", format.cache_extension())
}

/// Whether `dir` is a directory this process can write into. A directory
/// that doesn't exist yet is considered writable (it will be created on
/// first write); anything else falls back to a best-effort metadata check.
fn is_writable(dir: &Path) -> bool {
    if !dir.exists() {
        return true;
    }
    std::fs::metadata(dir)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// A cached mirror document: its parsed entries, the format it was stored
/// as, and the paths it lives at.
pub struct CachedMirrorList {
    pub list: MirrorList,
    pub format: MirrorListFormat,
}

/// Read a previously cached mirror document for `source_url` under
/// `metadata_dir`, if one exists, its cookie matches `source_url`, and it
/// is not older than `refresh_delay` (or the directory is not writable, in
/// which case age is ignored and a present cache is always reused).
///
/// Returns `Ok(None)` for "no usable cache" (absent, stale, or cookie
/// mismatch) rather than an error — the caller decides what to do next
/// (typically: fetch and refresh).
pub fn load(metadata_dir: &Path, source_url: &Url, refresh_delay: Duration) -> MirrorListResult<Option<CachedMirrorList>> {
    let cookie_path = metadata_dir.join(COOKIE_NAME);
    let stored_cookie = match std::fs::read_to_string(&cookie_path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MirrorListError::io(cookie_path, e)),
    };
    if stored_cookie.trim() != cookie_for(source_url) {
        tracing::debug!("mirrorlist cookie mismatch, cache is stale");
        return Ok(None);
    }

    for format in [MirrorListFormat::Metalink, MirrorListFormat::Json, MirrorListFormat::Text] {
        let path = metadata_dir.join(cache_file_name(format));
        let Ok(metadata) = std::fs::metadata(&path) else {
            continue;
        };
        let writable = is_writable(metadata_dir);
        if writable {
            let age = SystemTime::now()
                .duration_since(metadata.modified().map_err(|e| MirrorListError::io(&path, e))?)
                .unwrap_or(Duration::ZERO);
            if age > refresh_delay {
                tracing::debug!(path = %path.display(), "mirrorlist cache older than refresh delay");
                return Ok(None);
            }
        }

        let content = std::fs::read(&path).map_err(|e| MirrorListError::io(&path, e))?;
        match crate::parse::parse(&content, format) {
            Ok(list) => return Ok(Some(CachedMirrorList { list, format })),
            Err(detail) => {
                // A cached file that fails to parse is corrupt: delete it
                // and the cookie, forcing a refetch.
                tracing::warn!(path = %path.display(), detail, "cached mirrorlist failed to parse, discarding");
                let _ = std::fs::remove_file(&path);
                let _ = std::fs::remove_file(&cookie_path);
                return Ok(None);
            }
        }
    }
    Ok(None)
}

/// Persist `list` (already parsed as `format`) to `metadata_dir`, along
/// with a fresh cookie for `source_url`. An empty list is still written
/// —
/// any stale cache files for *other* formats are removed so a later format
/// switch doesn't leave two caches disagreeing with each other.
pub fn store(
    metadata_dir: &Path,
    source_url: &Url,
    format: MirrorListFormat,
    raw_content: &[u8],
    list: &MirrorList,
) -> MirrorListResult<()> {
    std::fs::create_dir_all(metadata_dir).map_err(|e| MirrorListError::io(metadata_dir, e))?;

    for other in [MirrorListFormat::Metalink, MirrorListFormat::Json, MirrorListFormat::Text] {
        if other as u8 != format as u8 {
            let _ = std::fs::remove_file(metadata_dir.join(cache_file_name(other)));
        }
    }

    let cache_path = metadata_dir.join(cache_file_name(format));
    std::fs::write(&cache_path, raw_content).map_err(|e| MirrorListError::io(&cache_path, e))?;

    let cookie_path = metadata_dir.join(COOKIE_NAME);
    std::fs::write(&cookie_path, cookie_for(source_url)).map_err(|e| MirrorListError::io(&cookie_path, e))?;

    tracing::debug!(entries = list.len(), path = %cache_path.display(), "wrote mirrorlist cache");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn no_cache_returns_none() {
        let dir = tempdir().unwrap();
        let result = load(dir.path(), &url("https://example.com/mirrorlist"), Duration::from_secs(600)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let source = url("https://example.com/mirrorlist");
        let content = b"https://a.example/\n";
        let list = crate::parse::parse(content, MirrorListFormat::Text).unwrap();
        store(dir.path(), &source, MirrorListFormat::Text, content, &list).unwrap();

        let cached = load(dir.path(), &source, Duration::from_secs(600)).unwrap().unwrap();
        assert_eq!(cached.list, list);
    }

    #[test]
    fn cookie_mismatch_invalidates_cache() {
        let dir = tempdir().unwrap();
        let content = b"https://a.example/\n";
        let list = crate::parse::parse(content, MirrorListFormat::Text).unwrap();
        store(dir.path(), &url("https://example.com/one"), MirrorListFormat::Text, content, &list).unwrap();

        let result = load(dir.path(), &url("https://example.com/two"), Duration::from_secs(600)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn corrupt_cache_file_is_discarded() {
        let dir = tempdir().unwrap();
        let source = url("https://example.com/mirrorlist");
        std::fs::write(dir.path().join(COOKIE_NAME), cookie_for(&source)).unwrap();
        std::fs::write(dir.path().join("mirrorlist.json"), b"not json at all {").unwrap();

        let result = load(dir.path(), &source, Duration::from_secs(600)).unwrap();
        assert!(result.is_none());
        assert!(!dir.path().join("mirrorlist.json").exists());
    }
}
