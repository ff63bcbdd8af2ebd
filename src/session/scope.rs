//! Credential persistence scopes
//!
//! A scope is a small key-value backend over the fixed [`CredentialKey`]
//! set. The token store holds two of them: a *remembered* scope that
//! survives restarts and an *ephemeral* scope that lives as long as the
//! process.
//!
//! - [`MemoryScope`] -- in-process map; the ephemeral scope.
//! - [`KeyringScope`] -- OS native credential store (Keychain, Secret
//!   Service, Windows Credential Manager).
//! - [`FileScope`] -- JSON file in the user's data directory, for hosts
//!   without a keyring.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{FleetdeskError, Result};
use crate::session::credential::CredentialKey;

/// Key-value contract shared by every persistence scope.
///
/// `get` returns `Ok(None)` for a missing key. `remove` on a missing key is
/// a no-op.
pub trait CredentialScope: Send + Sync + std::fmt::Debug {
    /// Reads the value stored under `key`.
    fn get(&self, key: CredentialKey) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: CredentialKey, value: &str) -> Result<()>;

    /// Removes `key`.
    fn remove(&self, key: CredentialKey) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// MemoryScope
// ---------------------------------------------------------------------------

/// Process-lifetime scope.
#[derive(Debug, Default)]
pub struct MemoryScope {
    entries: Mutex<HashMap<CredentialKey, String>>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialScope for MemoryScope {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(&key).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        lock(&self.entries).insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        lock(&self.entries).remove(&key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KeyringScope
// ---------------------------------------------------------------------------

/// Scope backed by the OS keyring, one entry per key.
///
/// Entries live under the service name passed to [`KeyringScope::new`]
/// with the key name as the account.
#[derive(Debug, Clone)]
pub struct KeyringScope {
    service: String,
}

impl KeyringScope {
    /// Default keyring service name.
    pub const DEFAULT_SERVICE: &'static str = "fleetdesk";

    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: CredentialKey) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key.as_str())
            .map_err(|e| FleetdeskError::Keyring(e).into())
    }
}

impl Default for KeyringScope {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SERVICE)
    }
}

impl CredentialScope for KeyringScope {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(FleetdeskError::Keyring(e).into()),
        }
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(FleetdeskError::Keyring)?;
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(FleetdeskError::Keyring(e).into()),
        }
    }
}

// ---------------------------------------------------------------------------
// FileScope
// ---------------------------------------------------------------------------

/// Scope persisted as a flat JSON object on disk.
///
/// The file is re-read on every access so that two processes sharing the
/// file observe each other's writes. A missing file reads as empty.
#[derive(Debug)]
pub struct FileScope {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileScope {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns `<data dir>/session.json` for the current user.
    ///
    /// # Errors
    ///
    /// Returns [`FleetdeskError::Storage`] when the platform has no home
    /// directory to derive a data directory from.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "fleetdesk", "fleetdesk").ok_or_else(
            || FleetdeskError::Storage("cannot determine user data directory".to_string()),
        )?;
        Ok(dirs.data_dir().join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                FleetdeskError::Storage(format!(
                    "corrupt session file {}: {}",
                    self.path.display(),
                    e
                ))
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(FleetdeskError::Io(e).into()),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        if entries.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(FleetdeskError::Io(e).into()),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl CredentialScope for FileScope {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        Ok(self.load()?.remove(key.as_str()))
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let _guard = lock(&self.write_lock);
        let mut entries = self.load()?;
        entries.insert(key.as_str().to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        let _guard = lock(&self.write_lock);
        let mut entries = self.load()?;
        if entries.remove(key.as_str()).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
