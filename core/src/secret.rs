//! Persistence for the single bearer token.
//!
//! Every backend stores exactly one value under `TOKEN_KEY`. Operations are
//! idempotent: clearing an absent token and setting the same token twice are
//! both no-ops from the caller's point of view.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use log::warn;
use tempfile::NamedTempFile;

use crate::error::SecretStoreError;

pub const TOKEN_KEY: &str = "auth_token";

const SECRETS_FILE: &str = "secrets.json";

pub trait SecretStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, SecretStoreError>;
    fn set(&self, token: &str) -> Result<(), SecretStoreError>;
    fn clear(&self) -> Result<(), SecretStoreError>;
}

/// Token held in process memory only. Lost on restart.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    token: Mutex<Option<String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self) -> Result<Option<String>, SecretStoreError> {
        Ok(self.slot().clone())
    }

    fn set(&self, token: &str) -> Result<(), SecretStoreError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SecretStoreError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Token persisted as a small JSON map in the app data directory, surviving
/// restarts until cleared.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Store rooted at `dir`; the directory is created on first write.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SECRETS_FILE),
        }
    }

    /// Store in the platform data directory for this app.
    pub fn in_app_data_dir() -> Result<Self, SecretStoreError> {
        let dirs = ProjectDirs::from("com", "todo-mobile", "todo-mobile")
            .ok_or(SecretStoreError::NoDataDir)?;
        Ok(Self::in_dir(dirs.data_dir()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SecretStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file and rename it over the old one, so a
    /// crash mid-write never leaves a truncated map behind.
    fn save(&self, map: &BTreeMap<String, String>) -> Result<(), SecretStoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(serde_json::to_string(map)?.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn discard_corrupt(&self, err: &serde_json::Error) {
        warn!("discarding unreadable {}: {err}", self.path.display());
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self) -> Result<Option<String>, SecretStoreError> {
        Ok(self.load()?.remove(TOKEN_KEY))
    }

    fn set(&self, token: &str) -> Result<(), SecretStoreError> {
        let mut map = match self.load() {
            Err(SecretStoreError::Json(err)) => {
                self.discard_corrupt(&err);
                BTreeMap::new()
            }
            other => other?,
        };
        map.insert(TOKEN_KEY.to_string(), token.to_string());
        self.save(&map)
    }

    /// Also succeeds on an unreadable file, which is removed.
    fn clear(&self) -> Result<(), SecretStoreError> {
        match self.load() {
            Ok(mut map) => {
                if map.remove(TOKEN_KEY).is_some() {
                    self.save(&map)?;
                }
                Ok(())
            }
            Err(SecretStoreError::Json(err)) => {
                self.discard_corrupt(&err);
                match fs::remove_file(&self.path) {
                    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
                    _ => Ok(()),
                }
            }
            Err(err) => Err(err),
        }
    }
}
