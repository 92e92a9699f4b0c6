use super::{Location, NavigateOptions, Navigator, LOGIN_PATH};
use crate::auth::{AuthContext, AuthState};

/// Where an unauthenticated visitor is sent, and what they asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: Location,
    pub from: Location,
}

/// Outcome of guarding one render of a protected page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision<T> {
    /// Session not yet known; show a waiting indicator, do not redirect
    Loading,
    /// Signed out; the login view replaces the requested location
    Redirect(Redirect),
    /// Signed in; the protected content, unmodified
    Render(T),
}

/// Gates protected pages on the auth context.
///
/// Holds no state: every call re-reads the context.
pub struct RouteGuard<'a> {
    auth: &'a AuthContext,
}

impl<'a> RouteGuard<'a> {
    pub fn new(auth: &'a AuthContext) -> Self {
        Self { auth }
    }

    /// Decide from a state snapshot without rendering anything
    pub fn decide(state: &AuthState, location: &Location) -> GuardDecision<()> {
        if state.is_loading {
            GuardDecision::Loading
        } else if !state.is_authenticated() {
            GuardDecision::Redirect(Redirect {
                to: Location::parse(LOGIN_PATH),
                from: location.clone(),
            })
        } else {
            GuardDecision::Render(())
        }
    }

    /// Guard `children` for `location`.
    ///
    /// On redirect the navigator is sent to the login view with replace
    /// semantics, carrying `location` so login can return there. `children`
    /// only runs when the content is rendered.
    pub fn protect<T, N: Navigator>(
        &self,
        location: &Location,
        navigator: &mut N,
        children: impl FnOnce() -> T,
    ) -> GuardDecision<T> {
        match Self::decide(&self.auth.state(), location) {
            GuardDecision::Loading => GuardDecision::Loading,
            GuardDecision::Redirect(redirect) => {
                navigator.navigate(
                    &redirect.to,
                    NavigateOptions {
                        replace: true,
                        from: Some(redirect.from.clone()),
                    },
                );
                GuardDecision::Redirect(redirect)
            }
            GuardDecision::Render(()) => GuardDecision::Render(children()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{SessionStore, UserRecord};
    use crate::routes::History;
    use crate::storage::MemoryStorage;

    fn state(is_loading: bool, user: Option<UserRecord>) -> AuthState {
        AuthState { user, is_loading }
    }

    fn context() -> AuthContext {
        AuthContext::new(SessionStore::new(Arc::new(MemoryStorage::new())))
    }

    #[test]
    fn test_loading_wins_regardless_of_authentication() {
        let loc = Location::parse("/students");
        assert_eq!(RouteGuard::decide(&state(true, None), &loc), GuardDecision::Loading);
        assert_eq!(
            RouteGuard::decide(&state(true, Some(UserRecord::new("a"))), &loc),
            GuardDecision::Loading
        );
    }

    #[test]
    fn test_signed_out_redirects_preserving_location() {
        let loc = Location::parse("/grades?semester=3");
        let decision = RouteGuard::decide(&state(false, None), &loc);
        assert_eq!(
            decision,
            GuardDecision::Redirect(Redirect {
                to: Location::parse("/login"),
                from: loc,
            })
        );
    }

    #[test]
    fn test_signed_in_renders() {
        let loc = Location::parse("/grades");
        assert_eq!(
            RouteGuard::decide(&state(false, Some(UserRecord::new("a"))), &loc),
            GuardDecision::Render(())
        );
    }

    #[test]
    fn test_loading_does_not_navigate_or_render() {
        let ctx = context();
        let mut history = History::new(Location::parse("/students"));
        let requested = Location::parse("/students");
        let decision: GuardDecision<()> =
            RouteGuard::new(&ctx).protect(&requested, &mut history, || {
                panic!("children rendered while loading")
            });

        assert_eq!(decision, GuardDecision::Loading);
        assert_eq!(history.current().location.pathname, "/students");
    }

    #[test]
    fn test_redirect_replaces_protected_entry() {
        let ctx = context();
        ctx.check_auth_status();
        let requested = Location::parse("/students");
        let mut history = History::default();
        history.push(requested.clone());

        let decision = RouteGuard::new(&ctx).protect(&requested, &mut history, || "students");

        assert!(matches!(decision, GuardDecision::Redirect(_)));
        assert_eq!(history.depth(), 2);
        assert_eq!(history.current().location.pathname, "/login");
        assert_eq!(history.current().from, Some(requested));
        assert!(history.entries().iter().all(|e| e.location.pathname != "/students"));
    }

    #[test]
    fn test_render_passes_children_through() {
        let ctx = context();
        ctx.login(UserRecord::new("andi")).unwrap();
        let requested = Location::parse("/students");
        let mut history = History::new(requested.clone());

        let decision = RouteGuard::new(&ctx).protect(&requested, &mut history, || vec![1, 2, 3]);

        assert_eq!(decision, GuardDecision::Render(vec![1, 2, 3]));
        assert_eq!(history.depth(), 1);
    }
}
