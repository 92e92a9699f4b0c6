use std::future::Future;

use super::{AuthContext, MountGuard, SessionStore};

tokio::task_local! {
    static CURRENT: AuthContext;
}

/// Mounted auth context plus the scope in which `use_auth` resolves it.
///
/// Creating the provider loads the session and starts following other tabs;
/// dropping it stops following them.
pub struct AuthProvider {
    context: AuthContext,
    _mounted: MountGuard,
}

impl AuthProvider {
    /// Mount a context over `store`. Must be called from within a tokio runtime.
    pub fn mount(store: SessionStore) -> Self {
        let context = AuthContext::new(store);
        let mounted = context.mount();
        Self {
            context,
            _mounted: mounted,
        }
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    /// Run `fut` with this provider's context available through `use_auth`
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT.scope(self.context.clone(), fut).await
    }

    /// Synchronous counterpart of `scope`
    pub fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self.context.clone(), f)
    }
}

/// The auth context of the enclosing provider scope.
///
/// # Panics
///
/// Panics when called outside `AuthProvider::scope`; that is a wiring
/// defect, not a runtime condition.
pub fn use_auth() -> AuthContext {
    match CURRENT.try_with(AuthContext::clone) {
        Ok(context) => context,
        Err(_) => panic!("use_auth must be used within an AuthProvider"),
    }
}
