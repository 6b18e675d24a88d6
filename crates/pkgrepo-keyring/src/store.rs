//! On-disk persistence for one ring (trusted or general): an `index.json`
//! listing metadata plus one `<key_id>.der` file per key, grounded in how
//! `assay-registry::trust::TrustStore` persists its entries as a JSON index
//! next to the key material it indexes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KeyringError, KeyringResult};
use crate::key::{KeyData, PublicKey};

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    fingerprint: String,
    key_id: String,
    subkey_ids: Vec<String>,
    name: String,
    created: i64,
}

impl From<&PublicKey> for IndexEntry {
    fn from(meta: &PublicKey) -> Self {
        Self {
            fingerprint: meta.fingerprint.clone(),
            key_id: meta.key_id.clone(),
            subkey_ids: meta.subkey_ids.clone(),
            name: meta.name.clone(),
            created: meta.created,
        }
    }
}

impl From<IndexEntry> for PublicKey {
    fn from(e: IndexEntry) -> Self {
        PublicKey {
            fingerprint: e.fingerprint,
            key_id: e.key_id,
            subkey_ids: e.subkey_ids,
            name: e.name,
            created: e.created,
        }
    }
}

/// A directory holding one ring's `index.json` and `<key_id>.der` files.
pub struct RingStore {
    dir: PathBuf,
}

impl RingStore {
    /// Open (creating if needed) a ring store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> KeyringResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| KeyringError::io(&dir, e))?;
        Ok(Self { dir })
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join("index.json")
    }

    fn der_path(&self, key_id: &str) -> PathBuf {
        self.dir.join(format!("{key_id}.der"))
    }

    /// Load every key persisted in this store.
    pub fn load(&self) -> KeyringResult<HashMap<String, KeyData>> {
        let index_path = self.index_path();
        if !index_path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&index_path).map_err(|e| KeyringError::io(&index_path, e))?;
        let entries: Vec<IndexEntry> =
            serde_json::from_str(&raw).map_err(|e| KeyringError::Malformed(e.to_string()))?;

        let mut keys = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key_id = entry.key_id.clone();
            let der_path = self.der_path(&key_id);
            let der = fs::read(&der_path).map_err(|e| KeyringError::io(&der_path, e))?;
            let meta: PublicKey = entry.into();
            let mut key = KeyData::from_der(&der, meta.name.clone(), meta.created)?;
            key.meta = meta;
            keys.insert(key_id, key);
        }
        Ok(keys)
    }

    /// Persist every key in `keys`, replacing whatever was there before.
    pub fn save(&self, keys: &HashMap<String, KeyData>) -> KeyringResult<()> {
        let mut entries: Vec<IndexEntry> = keys.values().map(|k| IndexEntry::from(&k.meta)).collect();
        entries.sort_by(|a, b| a.key_id.cmp(&b.key_id));

        for key in keys.values() {
            let der = key.to_der()?;
            let path = self.der_path(&key.meta.key_id);
            write_atomic(&path, &der)?;
        }

        let json = serde_json::to_vec_pretty(&entries).map_err(|e| KeyringError::Malformed(e.to_string()))?;
        write_atomic(&self.index_path(), &json)?;

        let live: std::collections::HashSet<&str> = keys.keys().map(String::as_str).collect();
        if let Ok(read_dir) = fs::read_dir(&self.dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("der") {
                    continue;
                }
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                if !live.contains(stem) {
                    let _ = fs::remove_file(&path);
                }
            }
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> KeyringResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| KeyringError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| KeyringError::io(path, e))
}
