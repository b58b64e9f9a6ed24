//! Scoped access token storage
//!
//! Two storage scopes hold at most one access token each: a session scope
//! that lives only as long as the process, and a persistent scope backed by
//! the OS keychain (Windows Credential Manager, macOS Keychain, Linux Secret
//! Service via the keyring crate). When both scopes hold a value, the
//! session scope wins.

use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use thiserror::Error;

/// Logical key both scopes store the access token under
pub const ACCESS_TOKEN_KEY: &str = "access-token";

/// Errors that can occur in a storage slot backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Keychain operation failed
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Storage lifetime tier for the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Cleared when the process ends
    Session,
    /// Survives restarts ("remember me")
    Persistent,
}

impl Scope {
    /// Scopes in the order they are consulted when resolving the active
    /// token. Session comes first: a session sign-in must shadow a stale
    /// remembered token.
    pub const PRIORITY: [Scope; 2] = [Scope::Session, Scope::Persistent];

    /// Returns the other scope
    pub fn other(self) -> Scope {
        match self {
            Scope::Session => Scope::Persistent,
            Scope::Persistent => Scope::Session,
        }
    }
}

/// A single token slot: one scope, at most one value
///
/// Implementations are synchronous key/value storage with no network access.
pub trait TokenSlot: Send + Sync {
    /// Reads the stored token, if any
    fn read(&self) -> Result<Option<String>, StoreError>;

    /// Stores a token, replacing any previous value
    fn write(&self, token: &str) -> Result<(), StoreError>;

    /// Removes the stored token; clearing an empty slot is a no-op
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process slot; contents vanish when the process ends
#[derive(Debug, Default)]
pub struct MemorySlot {
    value: Mutex<Option<String>>,
}

impl MemorySlot {
    /// Creates an empty slot
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn write(&self, token: &str) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// OS-keychain-backed slot for the persistent scope
///
/// Data is tied to the current OS user account and survives restarts.
pub struct KeyringSlot {
    service: String,
}

impl KeyringSlot {
    /// Creates a slot under the given keychain service name
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, ACCESS_TOKEN_KEY)?)
    }
}

impl TokenSlot for KeyringSlot {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring(e)),
        }
    }

    fn write(&self, token: &str) -> Result<(), StoreError> {
        self.entry()?.set_password(token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keyring(e)),
        }
    }
}

/// The sole durable holder of access tokens
///
/// Owns one slot per scope. Every other component borrows values from here
/// and must write back explicitly for changes to persist. Slot backend
/// failures degrade to "empty" so a broken keychain never takes down the
/// request pipeline.
pub struct TokenStore {
    session: Box<dyn TokenSlot>,
    persistent: Box<dyn TokenSlot>,
}

impl TokenStore {
    /// Creates a store with the production slots: an in-process session
    /// scope and a keychain-backed persistent scope
    pub fn new(service: impl Into<String>) -> Self {
        Self::with_slots(
            Box::new(MemorySlot::new()),
            Box::new(KeyringSlot::new(service)),
        )
    }

    /// Creates a store over custom slot backends
    pub fn with_slots(session: Box<dyn TokenSlot>, persistent: Box<dyn TokenSlot>) -> Self {
        Self {
            session,
            persistent,
        }
    }

    /// Creates a fully in-memory store
    ///
    /// Useful for tests and for embedders that do not want keychain access.
    pub fn in_memory() -> Self {
        Self::with_slots(Box::new(MemorySlot::new()), Box::new(MemorySlot::new()))
    }

    fn slot(&self, scope: Scope) -> &dyn TokenSlot {
        match scope {
            Scope::Session => self.session.as_ref(),
            Scope::Persistent => self.persistent.as_ref(),
        }
    }

    /// Reads the token held by one scope
    pub fn read(&self, scope: Scope) -> Option<String> {
        match self.slot(scope).read() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Failed to read {:?} token slot: {}", scope, e);
                None
            }
        }
    }

    /// Stores a token in one scope
    pub fn write(&self, scope: Scope, token: &str) {
        if let Err(e) = self.slot(scope).write(token) {
            tracing::warn!("Failed to write {:?} token slot: {}", scope, e);
        }
    }

    /// Clears one scope
    pub fn clear(&self, scope: Scope) {
        if let Err(e) = self.slot(scope).clear() {
            tracing::warn!("Failed to clear {:?} token slot: {}", scope, e);
        }
    }

    /// Clears both scopes
    pub fn clear_all(&self) {
        for scope in Scope::PRIORITY {
            self.clear(scope);
        }
    }

    /// Resolves the active token by consulting scopes in priority order
    ///
    /// Returns the token together with the scope that supplied it, so a
    /// refreshed value can be written back into the same scope and the other
    /// scope never ends up holding a second stale token.
    pub fn read_active(&self) -> Option<(String, Scope)> {
        Scope::PRIORITY
            .into_iter()
            .find_map(|scope| self.read(scope).map(|token| (token, scope)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_slot_round_trip() {
        let slot = MemorySlot::new();
        assert_eq!(slot.read().unwrap(), None);

        slot.write("token-1").unwrap();
        assert_eq!(slot.read().unwrap(), Some("token-1".to_string()));

        slot.write("token-2").unwrap();
        assert_eq!(slot.read().unwrap(), Some("token-2".to_string()));

        slot.clear().unwrap();
        assert_eq!(slot.read().unwrap(), None);
    }

    #[test]
    fn test_clear_empty_slot_is_noop() {
        let slot = MemorySlot::new();
        slot.clear().unwrap();
        assert_eq!(slot.read().unwrap(), None);
    }

    #[test]
    fn test_scope_other() {
        assert_eq!(Scope::Session.other(), Scope::Persistent);
        assert_eq!(Scope::Persistent.other(), Scope::Session);
    }

    #[test]
    fn test_read_active_empty() {
        let store = TokenStore::in_memory();
        assert_eq!(store.read_active(), None);
    }

    #[test]
    fn test_read_active_session_only() {
        let store = TokenStore::in_memory();
        store.write(Scope::Session, "s-token");

        assert_eq!(
            store.read_active(),
            Some(("s-token".to_string(), Scope::Session))
        );
    }

    #[test]
    fn test_read_active_persistent_only() {
        let store = TokenStore::in_memory();
        store.write(Scope::Persistent, "p-token");

        assert_eq!(
            store.read_active(),
            Some(("p-token".to_string(), Scope::Persistent))
        );
    }

    #[test]
    fn test_session_wins_regardless_of_write_order() {
        // Session written first
        let store = TokenStore::in_memory();
        store.write(Scope::Session, "s-token");
        store.write(Scope::Persistent, "p-token");
        assert_eq!(
            store.read_active(),
            Some(("s-token".to_string(), Scope::Session))
        );

        // Persistent written first
        let store = TokenStore::in_memory();
        store.write(Scope::Persistent, "p-token");
        store.write(Scope::Session, "s-token");
        assert_eq!(
            store.read_active(),
            Some(("s-token".to_string(), Scope::Session))
        );
    }

    #[test]
    fn test_clear_single_scope() {
        let store = TokenStore::in_memory();
        store.write(Scope::Session, "s-token");
        store.write(Scope::Persistent, "p-token");

        store.clear(Scope::Session);
        assert_eq!(
            store.read_active(),
            Some(("p-token".to_string(), Scope::Persistent))
        );
    }

    #[test]
    fn test_clear_all() {
        let store = TokenStore::in_memory();
        store.write(Scope::Session, "s-token");
        store.write(Scope::Persistent, "p-token");

        store.clear_all();
        assert_eq!(store.read(Scope::Session), None);
        assert_eq!(store.read(Scope::Persistent), None);
        assert_eq!(store.read_active(), None);
    }
}
