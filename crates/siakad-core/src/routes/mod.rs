//! Routing for the dashboard: the route table, browsing history, the route
//! guard that gates protected pages, and the router that ties them together.

pub mod guard;
pub mod history;
pub mod router;

use std::fmt;

pub use guard::{GuardDecision, Redirect, RouteGuard};
pub use history::{History, HistoryEntry, NavigateOptions, Navigator};
pub use router::{Router, View};

/// Path of the public login view
pub const LOGIN_PATH: &str = "/login";

/// Where a successful login lands when no page was requested
pub const DEFAULT_PATH: &str = "/dashboard";

/// A requested location: path plus query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub pathname: String,
    /// Query string including the leading `?`, or empty
    pub search: String,
}

impl Location {
    pub fn parse(href: &str) -> Self {
        let href = href.trim();
        let (path, search) = match href.find('?') {
            Some(i) => (&href[..i], &href[i..]),
            None => (href, ""),
        };
        let pathname = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Self {
            pathname,
            search: search.to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pathname, self.search)
    }
}

/// Pages of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Home,
    Dashboard,
    Users,
    Faculties,
    StudyPrograms,
    Students,
    Lecturers,
    Courses,
    Classrooms,
    Schedules,
    Attendances,
    Grades,
    Enrollments,
    Announcements,
    Logs,
}

impl Route {
    pub const ALL: [Route; 16] = [
        Route::Login,
        Route::Home,
        Route::Dashboard,
        Route::Users,
        Route::Faculties,
        Route::StudyPrograms,
        Route::Students,
        Route::Lecturers,
        Route::Courses,
        Route::Classrooms,
        Route::Schedules,
        Route::Attendances,
        Route::Grades,
        Route::Enrollments,
        Route::Announcements,
        Route::Logs,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => LOGIN_PATH,
            Route::Home => "/",
            Route::Dashboard => DEFAULT_PATH,
            Route::Users => "/users",
            Route::Faculties => "/faculties",
            Route::StudyPrograms => "/study-programs",
            Route::Students => "/students",
            Route::Lecturers => "/lecturers",
            Route::Courses => "/courses",
            Route::Classrooms => "/classrooms",
            Route::Schedules => "/schedules",
            Route::Attendances => "/attendances",
            Route::Grades => "/grades",
            Route::Enrollments => "/enrollments",
            Route::Announcements => "/announcements",
            Route::Logs => "/logs",
        }
    }

    /// Match a pathname, ignoring a trailing slash
    pub fn from_path(pathname: &str) -> Option<Route> {
        let trimmed = match pathname.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        Self::ALL.into_iter().find(|r| r.path() == trimmed)
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Home | Route::Dashboard => "Dashboard",
            Route::Users => "Users",
            Route::Faculties => "Fakultas",
            Route::StudyPrograms => "Program Studi",
            Route::Students => "Mahasiswa",
            Route::Lecturers => "Dosen",
            Route::Courses => "Mata Kuliah",
            Route::Classrooms => "Kelas",
            Route::Schedules => "Jadwal Kuliah",
            Route::Attendances => "Kehadiran",
            Route::Grades => "Nilai",
            Route::Enrollments => "Enrollments",
            Route::Announcements => "Announcements",
            Route::Logs => "Logs",
        }
    }

    /// Backend collection listed by this page
    pub fn collection(&self) -> Option<&'static str> {
        match self {
            Route::Login | Route::Home | Route::Dashboard => None,
            other => Some(other.path().trim_start_matches('/')),
        }
    }
}
