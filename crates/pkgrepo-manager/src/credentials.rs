//! `CredentialManager`: URL-keyed credential persistence,
//! grounded in `examples/original_source/zypp-media/ng/auth/credentialmanager.cc`.
//!
//! Global and user credential sets are loaded once at construction
//! (`init_globalCredentials`/`init_userCredentials`); a `credentials=<file>`
//! query parameter instead routes through a separate, always-fresh,
//! uncached read (`getCredFromFile`) since that file might change out from
//! under a long-lived process.

use std::io::Write;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use pkgrepo_repoinfo::{parse_ini, write_ini, IniSection};
use url::Url;

use crate::error::{ManagerError, ManagerResult};

const QUERY_CREDENTIALS_KEY: &str = "credentials";

#[cfg(unix)]
const GLOBAL_FILE_MODE: u32 = 0o640;
#[cfg(unix)]
const USER_FILE_MODE: u32 = 0o600;

/// One stored set of URL credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The URL pattern this credential applies to. Lookups match this
    /// pattern's scheme/host/port/path as a prefix of the request URL,
    /// ignoring userinfo and query on both sides.
    pub url_pattern: Url,
    /// Username, when the credential is scoped to one.
    pub username: Option<String>,
    pub password: String,
    pub auth_type: String,
}

impl Credential {
    fn matches(&self, request: &Url) -> bool {
        if self.url_pattern.scheme() != request.scheme() || self.url_pattern.host_str() != request.host_str() {
            return false;
        }
        if self.url_pattern.port_or_known_default() != request.port_or_known_default() {
            return false;
        }
        if !request.path().starts_with(self.url_pattern.path()) {
            return false;
        }
        if let Some(requested_user) = request_username(request) {
            if self.username.as_deref() != Some(requested_user.as_str()) {
                return false;
            }
        }
        true
    }
}

fn request_username(url: &Url) -> Option<String> {
    let user = url.username();
    (!user.is_empty()).then(|| user.to_string())
}

/// One of the two long-lived credential sets (global/user), or a one-off
/// per-credential file resolved through `credentials=`.
struct CredentialFile {
    path: PathBuf,
    #[cfg_attr(not(unix), allow(dead_code))]
    mode: u32,
    credentials: Vec<Credential>,
    dirty: bool,
}

impl CredentialFile {
    fn load(path: PathBuf, mode: u32) -> ManagerResult<Self> {
        let credentials = if path.exists() {
            let _lock = LockedFile::open_shared(&path)?;
            let text = std::fs::read_to_string(&path).map_err(|e| ManagerError::io(&path, e))?;
            decode_sections(&text)
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            mode,
            credentials,
            dirty: false,
        })
    }

    fn find(&self, url: &Url) -> Option<Credential> {
        self.credentials.iter().find(|c| c.matches(url)).cloned()
    }

    fn insert(&mut self, credential: Credential) {
        if let Some(existing) = self
            .credentials
            .iter_mut()
            .find(|c| c.url_pattern == credential.url_pattern && c.username == credential.username)
        {
            *existing = credential;
        } else {
            self.credentials.push(credential);
        }
        self.dirty = true;
    }

    fn save_if_dirty(&mut self) -> ManagerResult<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ManagerError::io(parent, e))?;
        }
        let _lock = LockedFile::open_exclusive(&self.path)?;
        let text = encode_sections(&self.credentials, true);
        write_atomic(&self.path, text.as_bytes(), self.mode)?;
        self.dirty = false;
        Ok(())
    }
}

/// A per-credential file named by a `credentials=<file>` query parameter.
/// URLs are never stored in these files: the file's identity
/// *is* the URL association, carried by the query parameter that named it,
/// so only `username`/`password`/`authtype` are persisted.
fn load_custom_credential(path: &Path) -> ManagerResult<Option<(Option<String>, String, String)>> {
    if !path.exists() {
        return Ok(None);
    }
    let _lock = LockedFile::open_shared(path)?;
    let text = std::fs::read_to_string(path).map_err(|e| ManagerError::io(path, e))?;
    let sections = parse_ini(&text);
    let Some(section) = sections.into_iter().next() else {
        return Ok(None);
    };
    let username = section.get("username").map(str::to_string);
    let password = section.get("password").unwrap_or_default().to_string();
    let auth_type = section.get("authtype").unwrap_or("basic").to_string();
    Ok(Some((username, password, auth_type)))
}

/// Manages the global, per-user, and ad hoc per-credential URL credential
/// stores.
pub struct CredentialManager {
    global: CredentialFile,
    user: CredentialFile,
    /// Directory relative `credentials=<file>` names resolve under
    /// (`<configRoot>/credentials.d/`).
    credentials_dir: PathBuf,
}

impl CredentialManager {
    /// Load the global and user credential sets. This always succeeds
    /// even if neither file exists yet (an empty set).
    pub fn open(global_path: impl Into<PathBuf>, user_path: impl Into<PathBuf>, credentials_dir: impl Into<PathBuf>) -> ManagerResult<Self> {
        #[cfg(unix)]
        let (global_mode, user_mode) = (GLOBAL_FILE_MODE, USER_FILE_MODE);
        #[cfg(not(unix))]
        let (global_mode, user_mode) = (0, 0);

        Ok(Self {
            global: CredentialFile::load(global_path.into(), global_mode)?,
            user: CredentialFile::load(user_path.into(), user_mode)?,
            credentials_dir: credentials_dir.into(),
        })
    }

    /// Look up a credential for `url`. A `credentials=<file>` query
    /// parameter takes precedence and is read fresh every call; otherwise the user
    /// set is checked before the global set.
    pub fn get_cred(&self, url: &Url) -> ManagerResult<Option<Credential>> {
        if let Some(file_name) = url.query_pairs().find(|(k, _)| k == QUERY_CREDENTIALS_KEY).map(|(_, v)| v.into_owned()) {
            let path = resolve_credentials_file(&self.credentials_dir, &file_name);
            if let Some((username, password, auth_type)) = load_custom_credential(&path)? {
                return Ok(Some(Credential {
                    url_pattern: strip_auth_and_query(url),
                    username,
                    password,
                    auth_type,
                }));
            }
        }

        if let Some(cred) = self.user.find(url) {
            return Ok(Some(cred));
        }
        Ok(self.global.find(url))
    }

    /// Add or replace a credential in the global set.
    pub fn set_global_credential(&mut self, credential: Credential) {
        self.global.insert(credential);
    }

    /// Add or replace a credential in the per-user set.
    pub fn set_user_credential(&mut self, credential: Credential) {
        self.user.insert(credential);
    }

    /// Persist only the sets mutated since the last save.
    pub fn save(&mut self) -> ManagerResult<()> {
        self.global.save_if_dirty()?;
        self.user.save_if_dirty()?;
        Ok(())
    }
}

fn strip_auth_and_query(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    let _ = stripped.set_username("");
    let _ = stripped.set_password(None);
    stripped
}

fn resolve_credentials_file(credentials_dir: &Path, name: &str) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        credentials_dir.join(candidate)
    }
}

fn decode_sections(text: &str) -> Vec<Credential> {
    parse_ini(text)
        .into_iter()
        .filter_map(|section| {
            let url_pattern = Url::parse(section.get("url")?).ok()?;
            Some(Credential {
                url_pattern,
                username: section.get("username").map(str::to_string),
                password: section.get("password").unwrap_or_default().to_string(),
                auth_type: section.get("authtype").unwrap_or("basic").to_string(),
            })
        })
        .collect()
}

fn encode_sections(credentials: &[Credential], include_url: bool) -> String {
    let sections: Vec<IniSection> = credentials
        .iter()
        .enumerate()
        .map(|(i, cred)| {
            let mut section = IniSection {
                name: i.to_string(),
                entries: Vec::new(),
            };
            if include_url {
                section.push("url", cred.url_pattern.as_str());
            }
            if let Some(username) = &cred.username {
                section.push("username", username);
            }
            section.push("password", &cred.password);
            section.push("authtype", &cred.auth_type);
            section
        })
        .collect();
    write_ini(&sections)
}

fn write_atomic(path: &Path, bytes: &[u8], #[allow(unused_variables)] mode: u32) -> ManagerResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp).map_err(|e| ManagerError::io(&tmp, e))?;
        file.write_all(bytes).map_err(|e| ManagerError::io(&tmp, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(mode);
            file.set_permissions(perms).map_err(|e| ManagerError::io(&tmp, e))?;
        }
    }
    std::fs::rename(&tmp, path).map_err(|e| ManagerError::io(path, e))
}

/// An advisory-locked file handle held only for the duration of a
/// read/write.
struct LockedFile(std::fs::File);

impl LockedFile {
    fn open_shared(path: &Path) -> ManagerResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| ManagerError::io(path, e))?;
        FileExt::lock_shared(&file).map_err(|e| ManagerError::io(path, e))?;
        Ok(Self(file))
    }

    fn open_exclusive(path: &Path) -> ManagerResult<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ManagerError::io(path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| ManagerError::io(path, e))?;
        Ok(Self(file))
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}
