//! Token store over the remembered and ephemeral scopes
//!
//! The store is the single source of truth for the current session. Writes
//! always clear both scopes first, so a session is never split across them.
//! Reads probe the remembered scope before the ephemeral one.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::session::credential::{CredentialKey, SessionCredential};
use crate::session::scope::{CredentialScope, MemoryScope};

/// Which persistence scope holds the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Survives process restarts ("remember me").
    Remembered,
    /// Cleared when the process ends.
    Ephemeral,
}

impl ScopeKind {
    pub fn from_remember(remember: bool) -> Self {
        if remember {
            ScopeKind::Remembered
        } else {
            ScopeKind::Ephemeral
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKind::Remembered => f.write_str("remembered"),
            ScopeKind::Ephemeral => f.write_str("ephemeral"),
        }
    }
}

/// Reads and writes the session credential across two scopes.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fleetdesk::session::{MemoryScope, ScopeKind, SessionCredential, TokenStore};
///
/// let store = TokenStore::new(Arc::new(MemoryScope::new()), Arc::new(MemoryScope::new()));
/// store.write(&SessionCredential::new("a.b.c"), false).unwrap();
///
/// assert_eq!(store.access_token().unwrap().as_deref(), Some("a.b.c"));
/// assert_eq!(store.active_scope().unwrap(), Some(ScopeKind::Ephemeral));
/// ```
#[derive(Debug, Clone)]
pub struct TokenStore {
    remembered: Arc<dyn CredentialScope>,
    ephemeral: Arc<dyn CredentialScope>,
}

impl TokenStore {
    pub fn new(remembered: Arc<dyn CredentialScope>, ephemeral: Arc<dyn CredentialScope>) -> Self {
        Self {
            remembered,
            ephemeral,
        }
    }

    /// A store whose scopes both live in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryScope::new()), Arc::new(MemoryScope::new()))
    }

    fn scope(&self, kind: ScopeKind) -> &dyn CredentialScope {
        match kind {
            ScopeKind::Remembered => self.remembered.as_ref(),
            ScopeKind::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    /// Persists `credential` in the scope selected by `remember`.
    ///
    /// Both scopes are cleared first. Optional fields are written only when
    /// present.
    pub fn write(&self, credential: &SessionCredential, remember: bool) -> Result<()> {
        self.clear()?;

        let kind = ScopeKind::from_remember(remember);
        let scope = self.scope(kind);
        scope.set(CredentialKey::AccessToken, &credential.access_token)?;
        if let Some(ref refresh) = credential.refresh_token {
            scope.set(CredentialKey::RefreshToken, refresh)?;
        }
        if let Some(ref user) = credential.user {
            scope.set(CredentialKey::User, &serde_json::to_string(user)?)?;
        }
        if let Some(expires_in) = credential.expires_in {
            scope.set(CredentialKey::ExpiresIn, &expires_in.to_string())?;
        }

        tracing::debug!(scope = %kind, "Session credential written");
        Ok(())
    }

    /// Reads `key` from the remembered scope, falling back to ephemeral.
    pub fn read(&self, key: CredentialKey) -> Result<Option<String>> {
        if let Some(value) = self.remembered.get(key)? {
            return Ok(Some(value));
        }
        self.ephemeral.get(key)
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        self.read(CredentialKey::AccessToken)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.read(CredentialKey::RefreshToken)
    }

    /// Returns the stored user record. An unparseable record reads as absent.
    pub fn user(&self) -> Result<Option<Value>> {
        Ok(self
            .read(CredentialKey::User)?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    /// Returns the stored lifetime in seconds. An unparseable value reads as
    /// absent.
    pub fn expires_in(&self) -> Result<Option<u64>> {
        Ok(self
            .read(CredentialKey::ExpiresIn)?
            .and_then(|raw| raw.parse().ok()))
    }

    /// Reports which scope holds the access token, if any.
    pub fn active_scope(&self) -> Result<Option<ScopeKind>> {
        if self.remembered.get(CredentialKey::AccessToken)?.is_some() {
            return Ok(Some(ScopeKind::Remembered));
        }
        if self.ephemeral.get(CredentialKey::AccessToken)?.is_some() {
            return Ok(Some(ScopeKind::Ephemeral));
        }
        Ok(None)
    }

    /// Replaces the access token (and optionally a rotated refresh token)
    /// in the scope that already holds the session.
    ///
    /// When no session is stored, the refresh token's scope decides; with
    /// neither present the ephemeral scope is used.
    pub fn update_access_token(
        &self,
        access_token: &str,
        rotated_refresh: Option<&str>,
    ) -> Result<ScopeKind> {
        let kind = match self.active_scope()? {
            Some(kind) => kind,
            None if self.remembered.get(CredentialKey::RefreshToken)?.is_some() => {
                ScopeKind::Remembered
            }
            None => ScopeKind::Ephemeral,
        };

        let scope = self.scope(kind);
        scope.set(CredentialKey::AccessToken, access_token)?;
        if let Some(refresh) = rotated_refresh {
            scope.set(CredentialKey::RefreshToken, refresh)?;
        }

        tracing::debug!(scope = %kind, "Access token updated");
        Ok(kind)
    }

    /// Removes all four keys from both scopes.
    pub fn clear(&self) -> Result<()> {
        for key in CredentialKey::ALL {
            self.remembered.remove(key)?;
            self.ephemeral.remove(key)?;
        }
        Ok(())
    }
}
