use tracing::debug;

use super::{
    GuardDecision, History, Location, NavigateOptions, Navigator, Route, RouteGuard, DEFAULT_PATH,
    LOGIN_PATH,
};
use crate::auth::{AuthContext, AuthError};

/// Upper bound on redirects followed while resolving one render
const MAX_REDIRECTS: usize = 4;

/// What the shell should show for the current history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Waiting for the session to be known
    Loading,
    /// The login view, with the page to return to afterwards
    Login { from: Option<Location> },
    Page(Route),
    NotFound(Location),
}

/// Resolves history entries to views, routing protected pages through the guard.
pub struct Router {
    auth: AuthContext,
    history: History,
}

impl Router {
    pub fn new(auth: AuthContext) -> Self {
        Self {
            auth,
            history: History::default(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Navigate to `href` and resolve the resulting view
    pub fn open(&mut self, href: &str) -> View {
        self.history.push(Location::parse(href));
        self.render()
    }

    /// Resolve the current entry, following guard and index redirects.
    pub fn render(&mut self) -> View {
        for _ in 0..MAX_REDIRECTS {
            let entry = self.history.current().clone();
            let Some(route) = Route::from_path(&entry.location.pathname) else {
                return View::NotFound(entry.location);
            };
            if !route.is_protected() {
                return View::Login { from: entry.from };
            }

            let guard = RouteGuard::new(&self.auth);
            match guard.protect(&entry.location, &mut self.history, || route) {
                GuardDecision::Loading => return View::Loading,
                GuardDecision::Redirect(redirect) => {
                    debug!(from = %redirect.from, "Redirected to login");
                }
                GuardDecision::Render(Route::Home) => {
                    self.history.navigate(
                        &Location::parse(DEFAULT_PATH),
                        NavigateOptions {
                            replace: true,
                            from: None,
                        },
                    );
                }
                GuardDecision::Render(route) => return View::Page(route),
            }
        }
        View::NotFound(self.history.current().location.clone())
    }

    /// After a successful login, go back to the page that was asked for.
    pub fn complete_login(&mut self) -> View {
        let target = self
            .history
            .current()
            .from
            .clone()
            .filter(|from| from.pathname != LOGIN_PATH)
            .unwrap_or_else(|| Location::parse(DEFAULT_PATH));
        self.history.navigate(
            &target,
            NavigateOptions {
                replace: true,
                from: None,
            },
        );
        self.render()
    }

    /// Sign out and show the login view
    pub fn logout(&mut self) -> Result<View, AuthError> {
        let result = self.auth.logout();
        self.history.push(Location::parse(LOGIN_PATH));
        result.map(|()| self.render())
    }
}
