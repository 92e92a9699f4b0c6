use std::sync::Arc;

use tracing::{debug, warn};

use super::{AuthError, UserRecord};
use crate::storage::{Storage, StorageError, StorageSubscription};

/// Storage key of the authentication flag
pub const AUTH_FLAG_KEY: &str = "isAuthenticated";

/// Storage key of the serialized user record
pub const USER_KEY: &str = "user";

/// The only flag value that counts as signed in
const AUTH_FLAG_TRUE: &str = "true";

/// Persists the session through a shared `Storage`.
///
/// The store owns no state of its own; the auth context is the only thing
/// that should call `save` or `clear`.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Whether a change notification for `key` concerns the session
    pub fn is_session_key(key: &str) -> bool {
        key == AUTH_FLAG_KEY || key == USER_KEY
    }

    /// Read the persisted session.
    ///
    /// Returns `None` unless the flag is exactly "true" and a user record is
    /// present and well formed. A corrupt user record is removed together
    /// with the flag. Never fails: unreadable storage counts as signed out.
    pub fn load(&self) -> Option<UserRecord> {
        let flag = match self.storage.get_item(AUTH_FLAG_KEY) {
            Ok(flag) => flag,
            Err(e) => {
                warn!(error = %e, "Failed to read authentication flag");
                return None;
            }
        };
        let user = match self.storage.get_item(USER_KEY) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Failed to read user record");
                return None;
            }
        };

        let (Some(AUTH_FLAG_TRUE), Some(raw)) = (flag.as_deref(), user) else {
            return None;
        };

        match serde_json::from_str::<UserRecord>(&raw) {
            Ok(user) => {
                debug!(username = %user.username, "Session loaded");
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Stored user record is corrupt, clearing session");
                if let Err(e) = self.clear() {
                    warn!(error = %e, "Failed to clear corrupt session");
                }
                None
            }
        }
    }

    /// Persist `user` as the signed-in session
    pub fn save(&self, user: &UserRecord) -> Result<(), AuthError> {
        let raw = serde_json::to_string(user)?;
        self.storage.set_item(AUTH_FLAG_KEY, AUTH_FLAG_TRUE)?;
        self.storage.set_item(USER_KEY, &raw)?;
        Ok(())
    }

    /// Remove both persisted fields
    pub fn clear(&self) -> Result<(), StorageError> {
        let flag = self.storage.remove_item(AUTH_FLAG_KEY);
        let user = self.storage.remove_item(USER_KEY);
        flag.and(user)
    }

    /// Changes made to the session by other tabs arrive here
    pub fn subscribe(&self) -> StorageSubscription {
        self.storage.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn fresh_store() -> (SessionStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        (SessionStore::new(Arc::new(storage.clone())), storage)
    }

    #[test]
    fn test_empty_storage_is_signed_out() {
        let (store, _) = fresh_store();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let (store, storage) = fresh_store();
        let mut user = UserRecord::new("dewi").with_token("e7c731d3-811c");
        user.insert_extra("role", "staff");

        store.save(&user).unwrap();

        assert_eq!(store.load(), Some(user));
        assert_eq!(
            storage.get_item(AUTH_FLAG_KEY).unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_record_fields_survive_conflicting_extras() {
        let (store, storage) = fresh_store();
        let mut user = UserRecord::new("dewi").with_token("tok-1");
        user.insert_extra("username", "shadow");
        user.insert_extra("token", "other");
        user.insert_extra("role", "staff");

        store.save(&user).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, Some(user));
        let loaded = loaded.unwrap();
        assert_eq!(loaded.username, "dewi");
        assert_eq!(loaded.token.as_deref(), Some("tok-1"));
        assert_eq!(
            storage.get_item(AUTH_FLAG_KEY).unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_malformed_user_clears_both_fields() {
        let payloads = [
            "{not valid json",
            "",
            "null",
            "42",
            "\"budi\"",
            "[]",
            r#"{"token":"no-username"}"#,
            r#"{"username":7}"#,
        ];
        for payload in payloads {
            let (store, storage) = fresh_store();
            storage.set_item(AUTH_FLAG_KEY, "true").unwrap();
            storage.set_item(USER_KEY, payload).unwrap();

            assert_eq!(store.load(), None, "payload {payload:?}");
            assert_eq!(storage.get_item(AUTH_FLAG_KEY).unwrap(), None);
            assert_eq!(storage.get_item(USER_KEY).unwrap(), None);
        }
    }

    #[test]
    fn test_flag_must_be_exactly_true() {
        for flag in ["false", "TRUE", "1", " true", ""] {
            let (store, storage) = fresh_store();
            storage.set_item(AUTH_FLAG_KEY, flag).unwrap();
            storage.set_item(USER_KEY, r#"{"username":"budi"}"#).unwrap();
            assert_eq!(store.load(), None, "flag {flag:?}");
        }
    }

    #[test]
    fn test_partial_state_is_signed_out() {
        let (store, storage) = fresh_store();
        storage.set_item(AUTH_FLAG_KEY, "true").unwrap();
        assert_eq!(store.load(), None);

        let (store, storage) = fresh_store();
        storage.set_item(USER_KEY, r#"{"username":"budi"}"#).unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (store, storage) = fresh_store();
        store.save(&UserRecord::new("budi")).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();

        assert_eq!(store.load(), None);
        assert_eq!(storage.get_item(USER_KEY).unwrap(), None);
    }

    #[test]
    fn test_session_keys() {
        assert!(SessionStore::is_session_key("isAuthenticated"));
        assert!(SessionStore::is_session_key("user"));
        assert!(!SessionStore::is_session_key("theme"));
    }
}
