//! REST API client module for the academic backend.
//!
//! This module provides the `ApiClient` for signing in and for listing the
//! backend's collections (students, lecturers, courses, ...).
//!
//! Requests are authorized by sending the session token verbatim as the
//! `Authorization` header; the backend issues that token at login.

pub mod client;
pub mod error;

pub use client::{ApiClient, DashboardStats, DEFAULT_BASE_URL};
pub use error::ApiError;
