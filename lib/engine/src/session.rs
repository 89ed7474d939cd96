//! Persistence of the session: tokens, the cached identity snapshot, the
//! session window, and sticky user preferences.
//!
//! Storage is behind [`KeyValueStore`] so hosts can plug whatever string
//! store they have. Persistence is best effort throughout: a missing or
//! corrupt value is a warning and a fallback, never an error surfaced to the
//! caller.

use std::sync::RwLock;

use ahash::{HashMap, HashMapExt};

use portal_nav_config::menu::MenuOptions;

use crate::access::UserIdentity;

pub const TOKEN_KEY: &str = "portal-nav:token";
pub const REFRESH_TOKEN_KEY: &str = "portal-nav:refresh-token";
pub const IDENTITY_KEY: &str = "portal-nav:identity";
pub const LOGIN_TIME_KEY: &str = "portal-nav:login-time";
pub const EXPIRES_IN_KEY: &str = "portal-nav:expires-in";
pub const OPTIONS_KEY: &str = "portal-nav:menu-options";

/// Minimal string-to-string store contract.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-process store, used in tests and by hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

/// Typed facade over a [`KeyValueStore`].
pub struct SessionStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        SessionStore { store }
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) {
        self.store.set(TOKEN_KEY, token);
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.store.set(REFRESH_TOKEN_KEY, token);
    }

    /// The identity snapshot persisted at login, if it is still readable.
    /// A corrupt snapshot is discarded with a warning.
    pub fn stored_identity(&self) -> Option<UserIdentity> {
        let raw = self.store.get(IDENTITY_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(error) => {
                tracing::warn!(%error, "discarding unreadable stored identity");
                None
            }
        }
    }

    pub fn set_stored_identity(&self, identity: &UserIdentity) {
        match serde_json::to_string(identity) {
            Ok(raw) => self.store.set(IDENTITY_KEY, &raw),
            Err(error) => tracing::warn!(%error, "failed to persist identity snapshot"),
        }
    }

    /// Records the session window: login instant and validity, both in
    /// milliseconds.
    pub fn set_session_window(&self, login_time_ms: u64, expires_in_ms: u64) {
        self.store.set(LOGIN_TIME_KEY, &login_time_ms.to_string());
        self.store.set(EXPIRES_IN_KEY, &expires_in_ms.to_string());
    }

    pub fn login_time_ms(&self) -> Option<u64> {
        self.read_u64(LOGIN_TIME_KEY)
    }

    pub fn expires_in_ms(&self) -> Option<u64> {
        self.read_u64(EXPIRES_IN_KEY)
    }

    /// Whether the session window has elapsed at `now_ms`. An incomplete
    /// window (either bound missing or unreadable) reads as not expired, so
    /// sessions without expiry metadata keep working.
    pub fn is_token_expired(&self, now_ms: u64) -> bool {
        match (self.login_time_ms(), self.expires_in_ms()) {
            (Some(login), Some(validity)) => now_ms >= login.saturating_add(validity),
            _ => false,
        }
    }

    pub fn menu_options(&self) -> Option<MenuOptions> {
        let raw = self.store.get(OPTIONS_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(options) => Some(options),
            Err(error) => {
                tracing::warn!(%error, "discarding unreadable persisted menu options");
                None
            }
        }
    }

    pub fn set_menu_options(&self, options: &MenuOptions) {
        match serde_json::to_string(options) {
            Ok(raw) => self.store.set(OPTIONS_KEY, &raw),
            Err(error) => tracing::warn!(%error, "failed to persist menu options"),
        }
    }

    /// Removes every session key. Used on logout and forced logout.
    pub fn clear(&self) {
        for key in [
            TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            IDENTITY_KEY,
            LOGIN_TIME_KEY,
            EXPIRES_IN_KEY,
        ] {
            self.store.remove(key);
        }
    }

    fn read_u64(&self, key: &str) -> Option<u64> {
        let raw = self.store.get(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, raw, "discarding unreadable stored number");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;

    fn store() -> SessionStore<MemoryStore> {
        SessionStore::new(MemoryStore::new())
    }

    #[test]
    fn identity_round_trips() {
        let session = store();
        let identity = UserIdentity::new("u-1", &[Role::Manager], &["report:read"]);
        session.set_stored_identity(&identity);
        assert_eq!(session.stored_identity(), Some(identity));
    }

    #[test]
    fn corrupt_identity_reads_as_absent() {
        let session = store();
        session.store.set(IDENTITY_KEY, "{not json");
        assert!(session.stored_identity().is_none());
    }

    #[test]
    fn expiry_needs_both_bounds() {
        let session = store();
        assert!(!session.is_token_expired(u64::MAX));

        session.store.set(LOGIN_TIME_KEY, "1000");
        assert!(!session.is_token_expired(u64::MAX));

        session.store.set(EXPIRES_IN_KEY, "500");
        assert!(!session.is_token_expired(1499));
        assert!(session.is_token_expired(1500));
    }

    #[test]
    fn unreadable_number_reads_as_absent() {
        let session = store();
        session.store.set(LOGIN_TIME_KEY, "soon");
        session.store.set(EXPIRES_IN_KEY, "500");
        assert!(!session.is_token_expired(u64::MAX));
    }

    #[test]
    fn clear_removes_session_but_keeps_preferences() {
        let session = store();
        session.set_token("t");
        session.set_refresh_token("r");
        session.set_session_window(1, 2);
        session.set_menu_options(&MenuOptions::default());

        session.clear();

        assert!(session.token().is_none());
        assert!(session.refresh_token().is_none());
        assert!(session.login_time_ms().is_none());
        assert!(session.menu_options().is_some());
    }
}
