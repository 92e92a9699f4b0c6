//! Core library for the siakad academic administration dashboard.
//!
//! This crate holds the client-side session gate and its collaborators:
//! - `storage`: key/value persistence shared between tabs, with change events
//! - `auth`: the session store, the auth context and its provider scope
//! - `routes`: the route table, browsing history and the route guard
//! - `api`: REST client for the backend, authorized with the session token
//! - `config`: user configuration on disk

pub mod api;
pub mod auth;
pub mod config;
pub mod routes;
pub mod storage;

pub use auth::{use_auth, AuthContext, AuthProvider, AuthState, SessionStore, UserRecord};
pub use config::Config;
pub use routes::{GuardDecision, History, Location, Navigator, Route, RouteGuard};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageEvent, StorageSubscription};
