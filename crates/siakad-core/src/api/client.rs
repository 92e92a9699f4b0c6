//! API client for communicating with the academic backend's REST API.
//!
//! This module provides the `ApiClient` struct for signing in and for making
//! authorized requests against the admin collections.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::{AuthContext, UserRecord};

// ============================================================================
// Constants
// ============================================================================

/// Base URL of the backend when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:9090/api/v1";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Collections responses wrap their payload as `{ "data": ... }`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Record counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub students: usize,
    pub lecturers: usize,
    pub courses: usize,
    pub faculties: usize,
}

/// API client for the academic backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    /// Client authorized as the user currently signed in to `auth`
    pub fn for_session(&self, auth: &AuthContext) -> Result<Self> {
        let token = auth.token().ok_or(ApiError::NotSignedIn)?;
        Ok(self.with_token(token))
    }

    /// Sign in with the backend and return the user record to hand to `AuthContext::login`
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserRecord> {
        let url = format!("{}/auth/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { username, password })
            .send()
            .await
            .context("Failed to send login request")?;

        let response = Self::check_response(response).await?;
        let body: Value = response.json().await.context("Failed to parse login response")?;

        let user = Self::parse_login_response(body, username)?;
        if user.token.is_none() {
            warn!(username = %user.username, "Login response carried no token");
        }
        debug!(username = %user.username, "Authenticated");
        Ok(user)
    }

    /// Accept either a bare user object or a `{ "data": user }` envelope.
    /// The username typed at login fills in when the backend omits it.
    fn parse_login_response(body: Value, username: &str) -> Result<UserRecord> {
        let mut user = match body {
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Object(inner)) => inner,
                Some(other) => {
                    map.insert("data".to_string(), other);
                    map
                }
                None => map,
            },
            other => {
                return Err(ApiError::InvalidResponse(format!(
                    "expected a user object, got {}",
                    other
                ))
                .into())
            }
        };

        if !matches!(user.get("username"), Some(Value::String(_))) {
            user.insert("username".to_string(), Value::from(username));
        }

        serde_json::from_value(Value::Object(user)).context("Login response is not a user record")
    }

    /// Headers for authorized requests; the token is sent as-is, without a scheme
    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref token) = self.token {
            headers.insert(header::AUTHORIZATION, header::HeaderValue::from_str(token)?);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/admin/{}", self.base_url, collection)
    }

    // ===== Data Fetching Methods =====

    /// Fetch every record of an admin collection, e.g. "students"
    pub async fn fetch_collection(&self, collection: &str) -> Result<Vec<Value>> {
        if self.token.is_none() {
            return Err(ApiError::NotSignedIn.into());
        }
        let envelope: Envelope<Vec<Value>> = self.get(&self.collection_url(collection)).await?;
        debug!(collection, count = envelope.data.len(), "Collection fetched");
        Ok(envelope.data)
    }

    /// Fetch the dashboard counts concurrently
    pub async fn fetch_dashboard_stats(&self) -> Result<DashboardStats> {
        let (students, lecturers, courses, faculties) = futures::try_join!(
            self.fetch_collection("students"),
            self.fetch_collection("lecturers"),
            self.fetch_collection("courses"),
            self.fetch_collection("faculties"),
        )?;

        Ok(DashboardStats {
            students: students.len(),
            lecturers: lecturers.len(),
            courses: courses.len(),
            faculties: faculties.len(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
