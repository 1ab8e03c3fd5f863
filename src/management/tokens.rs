use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Which half of the credential pair an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn account(&self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.account())
    }
}

/// A secret store addressed by account name within one service namespace.
///
/// Implementations may block; [`TokenStore`] moves every call onto the
/// blocking pool.
pub trait SecretBackend: Send + Sync {
    fn get(&self, account: &str) -> Result<Option<String>>;
    fn set(&self, account: &str, value: &str) -> Result<()>;
    /// Deleting a missing entry is not an error.
    fn delete(&self, account: &str) -> Result<()>;
}

/// OS credential store (Keychain, Credential Manager, kernel keyutils).
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, account: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, account)?)
    }
}

impl SecretBackend for KeyringBackend {
    fn get(&self, account: &str) -> Result<Option<String>> {
        match self.entry(account)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, account: &str, value: &str) -> Result<()> {
        Ok(self.entry(account)?.set_password(value)?)
    }

    fn delete(&self, account: &str) -> Result<()> {
        match self.entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local secret store, used by tests and when no keyring is available.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    failing: Mutex<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock() {
            return Err(Error::Storage("secret store unavailable".to_string()));
        }
        Ok(())
    }
}

impl SecretBackend for MemoryBackend {
    fn get(&self, account: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries.lock().get(account).cloned())
    }

    fn set(&self, account: &str, value: &str) -> Result<()> {
        self.check()?;
        self.entries
            .lock()
            .insert(account.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, account: &str) -> Result<()> {
        self.check()?;
        self.entries.lock().remove(account);
        Ok(())
    }
}

/// Persists the access and refresh tokens.
///
/// Every failure is logged and swallowed: a store that cannot be read looks
/// exactly like a store holding no token.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn SecretBackend>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn SecretBackend>) -> Self {
        Self { backend }
    }

    pub fn keyring(service: impl Into<String>) -> Self {
        Self::new(Arc::new(KeyringBackend::new(service)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Replaces the stored value: the old entry is deleted before the new one
    /// is written so no stale duplicate survives.
    pub async fn save(&self, kind: TokenKind, value: &str) {
        let backend = Arc::clone(&self.backend);
        let value = value.to_string();
        let result = tokio::task::spawn_blocking(move || {
            backend.delete(kind.account())?;
            backend.set(kind.account(), &value)
        })
        .await;

        match result {
            Ok(Ok(())) => debug!(%kind, "token saved"),
            Ok(Err(e)) => warn!(%kind, error = %e, "failed to save token"),
            Err(e) => warn!(%kind, error = %e, "token save task failed"),
        }
    }

    pub async fn load(&self, kind: TokenKind) -> Option<String> {
        let backend = Arc::clone(&self.backend);
        let result = tokio::task::spawn_blocking(move || backend.get(kind.account())).await;

        match result {
            Ok(Ok(value)) => value.filter(|v| !v.is_empty()),
            Ok(Err(e)) => {
                warn!(%kind, error = %e, "failed to load token, treating as absent");
                None
            }
            Err(e) => {
                warn!(%kind, error = %e, "token load task failed");
                None
            }
        }
    }

    pub async fn clear(&self, kind: TokenKind) {
        let backend = Arc::clone(&self.backend);
        let result = tokio::task::spawn_blocking(move || backend.delete(kind.account())).await;

        match result {
            Ok(Ok(())) => debug!(%kind, "token cleared"),
            Ok(Err(e)) => warn!(%kind, error = %e, "failed to clear token"),
            Err(e) => warn!(%kind, error = %e, "token clear task failed"),
        }
    }
}
