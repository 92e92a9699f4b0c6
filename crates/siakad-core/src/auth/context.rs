use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AuthError, SessionStore, UserRecord};
use crate::storage::RecvError;

/// Snapshot of the authentication state.
///
/// Being signed in is derived from the presence of a user record, so the
/// flag and the record can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<UserRecord>,
    /// True until the first synchronization with storage completes
    pub is_loading: bool,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Bearer token of the signed-in user, if any
    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.token.as_deref())
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true,
        }
    }
}

struct Inner {
    store: SessionStore,
    state: watch::Sender<AuthState>,
}

/// Single source of truth for who is signed in.
///
/// Clones share the same state. State changes are published on a watch
/// channel, so views can re-render on `watch().changed()`.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

impl AuthContext {
    /// Create a context in the loading state; nothing is read until
    /// `check_auth_status` or `mount` runs.
    pub fn new(store: SessionStore) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(Inner { store, state }),
        }
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.inner.state.borrow().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token().map(str::to_string)
    }

    /// Subscribe to state changes
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Re-derive the in-memory state from storage and finish loading.
    ///
    /// This is the only path from persisted state to memory; startup and
    /// cross-tab notifications both go through it.
    pub fn check_auth_status(&self) {
        let user = self.inner.store.load();
        debug!(authenticated = user.is_some(), "Auth status checked");
        self.inner.state.send_if_modified(|state| {
            let next = AuthState {
                user,
                is_loading: false,
            };
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    /// Persist `user` and mark the context signed in.
    ///
    /// State is updated before returning. If persisting fails the state is
    /// left as it was.
    pub fn login(&self, user: UserRecord) -> Result<(), AuthError> {
        self.inner.store.save(&user)?;
        info!(username = %user.username, "Logged in");
        self.inner.state.send_modify(|state| {
            state.user = Some(user);
            state.is_loading = false;
        });
        Ok(())
    }

    /// Clear the persisted session and mark the context signed out.
    ///
    /// The in-memory state is always cleared; a failure to remove the
    /// persisted fields is still reported.
    pub fn logout(&self) -> Result<(), AuthError> {
        let cleared = self.inner.store.clear();
        self.inner.state.send_modify(|state| {
            state.user = None;
            state.is_loading = false;
        });
        info!("Logged out");
        cleared.map_err(AuthError::from)
    }

    /// Load the session once and follow changes made by other tabs.
    ///
    /// Must be called from within a tokio runtime. The listener runs until
    /// the returned guard is dropped.
    pub fn mount(&self) -> MountGuard {
        let mut changes = self.inner.store.subscribe();
        self.check_auth_status();

        let context = self.clone();
        let listener = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) if SessionStore::is_session_key(&event.key) => {
                        debug!(key = %event.key, "Session changed in another tab");
                        context.check_auth_status();
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed storage notifications, re-checking session");
                        context.check_auth_status();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        MountGuard { listener }
    }
}

/// Keeps the cross-tab listener of a mounted context alive.
pub struct MountGuard {
    listener: JoinHandle<()>,
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::auth::session::{AUTH_FLAG_KEY, USER_KEY};
    use crate::storage::{FileStorage, MemoryStorage, Storage};

    const WAIT: Duration = Duration::from_secs(2);

    fn context_on(storage: &MemoryStorage) -> AuthContext {
        AuthContext::new(SessionStore::new(Arc::new(storage.clone())))
    }

    #[test]
    fn test_starts_loading_and_signed_out() {
        let ctx = context_on(&MemoryStorage::new());
        assert!(ctx.is_loading());
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.user(), None);
    }

    #[test]
    fn test_check_auth_status_finishes_loading() {
        let ctx = context_on(&MemoryStorage::new());
        ctx.check_auth_status();
        assert!(!ctx.is_loading());
        assert!(!ctx.is_authenticated());

        // Idempotent
        ctx.check_auth_status();
        assert!(!ctx.is_loading());
    }

    #[test]
    fn test_login_updates_state_immediately() {
        let storage = MemoryStorage::new();
        let ctx = context_on(&storage);
        let user = UserRecord::new("andi").with_token("tok-1");

        ctx.login(user.clone()).unwrap();

        assert!(ctx.is_authenticated());
        assert!(!ctx.is_loading());
        assert_eq!(ctx.user(), Some(user.clone()));
        assert_eq!(ctx.token().as_deref(), Some("tok-1"));
        assert_eq!(SessionStore::new(Arc::new(storage)).load(), Some(user));
    }

    #[test]
    fn test_logout_twice_is_same_as_once() {
        let storage = MemoryStorage::new();
        let ctx = context_on(&storage);
        ctx.login(UserRecord::new("andi")).unwrap();

        ctx.logout().unwrap();
        let once = ctx.state();
        ctx.logout().unwrap();

        assert_eq!(ctx.state(), once);
        assert!(!ctx.is_authenticated());
        assert_eq!(storage.get_item(AUTH_FLAG_KEY).unwrap(), None);
        assert_eq!(storage.get_item(USER_KEY).unwrap(), None);
    }

    #[test]
    fn test_corrupt_storage_collapses_to_signed_out() {
        let storage = MemoryStorage::new();
        storage.set_item(AUTH_FLAG_KEY, "true").unwrap();
        storage.set_item(USER_KEY, "{not valid json").unwrap();
        let ctx = context_on(&storage);

        ctx.check_auth_status();

        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.user(), None);
        assert!(!ctx.is_loading());
        assert_eq!(storage.get_item(AUTH_FLAG_KEY).unwrap(), None);
        assert_eq!(storage.get_item(USER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_watchers_see_login() {
        let ctx = context_on(&MemoryStorage::new());
        let mut rx = ctx.watch();

        ctx.login(UserRecord::new("andi")).unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().is_authenticated());
    }

    #[tokio::test]
    async fn test_mount_loads_persisted_session() {
        let storage = MemoryStorage::new();
        context_on(&storage)
            .login(UserRecord::new("andi"))
            .unwrap();

        let ctx = context_on(&storage.open_tab());
        let _guard = ctx.mount();

        assert!(!ctx.is_loading());
        assert!(ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_in_one_tab_reaches_the_other() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.open_tab();
        let ctx_a = context_on(&tab_a);
        let ctx_b = context_on(&tab_b);
        ctx_a.login(UserRecord::new("andi").with_token("t")).unwrap();

        let _guard = ctx_b.mount();
        assert!(ctx_b.is_authenticated());
        let mut rx = ctx_b.watch();

        ctx_a.logout().unwrap();

        tokio::time::timeout(WAIT, rx.wait_for(|s| !s.is_authenticated()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx_b.user(), None);
    }

    #[tokio::test]
    async fn test_login_in_one_tab_reaches_the_other() {
        let tab_a = MemoryStorage::new();
        let ctx_a = context_on(&tab_a);
        let ctx_b = context_on(&tab_a.open_tab());
        let _guard = ctx_b.mount();
        let mut rx = ctx_b.watch();

        ctx_a.login(UserRecord::new("sari")).unwrap();

        tokio::time::timeout(WAIT, rx.wait_for(|s| s.is_authenticated()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx_b.user().map(|u| u.username), Some("sari".to_string()));
    }

    #[tokio::test]
    async fn test_unmounted_context_stops_following() {
        let tab_a = MemoryStorage::new();
        let ctx_a = context_on(&tab_a);
        let ctx_b = context_on(&tab_a.open_tab());
        ctx_a.login(UserRecord::new("andi")).unwrap();

        let guard = ctx_b.mount();
        drop(guard);
        tokio::task::yield_now().await;

        ctx_a.logout().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(ctx_b.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_in_other_process_reaches_file_backed_tab() {
        let dir = tempfile::tempdir().unwrap();
        let poll = Duration::from_millis(20);
        let ctx_a = AuthContext::new(SessionStore::new(Arc::new(
            FileStorage::open(dir.path(), poll).unwrap(),
        )));
        let ctx_b = AuthContext::new(SessionStore::new(Arc::new(
            FileStorage::open(dir.path(), poll).unwrap(),
        )));
        ctx_a.login(UserRecord::new("andi")).unwrap();

        let _guard = ctx_b.mount();
        assert!(ctx_b.is_authenticated());
        let mut rx = ctx_b.watch();

        ctx_a.logout().unwrap();

        tokio::time::timeout(WAIT, rx.wait_for(|s| !s.is_authenticated()))
            .await
            .unwrap()
            .unwrap();
    }
}
