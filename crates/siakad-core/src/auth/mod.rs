//! Authentication module for the client-side session gate.
//!
//! This module provides:
//! - `SessionStore`: reads and writes the session through shared storage
//! - `AuthContext`: reactive "who is signed in" state with login/logout
//! - `AuthProvider` / `use_auth`: scoped access to the mounted context
//!
//! The session lives under two storage keys, `isAuthenticated` and `user`.
//! A corrupt user record is cleared on load and treated as signed out.

pub mod context;
pub mod provider;
pub mod session;
pub mod user;

use thiserror::Error;

use crate::storage::StorageError;

pub use context::{AuthContext, AuthState, MountGuard};
pub use provider::{use_auth, AuthProvider};
pub use session::{SessionStore, AUTH_FLAG_KEY, USER_KEY};
pub use user::UserRecord;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to serialize user record: {0}")]
    Serialize(#[from] serde_json::Error),
}
