use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the academic backend, classified by HTTP status.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not signed in - log in before opening dashboard pages")]
    NotSignedIn,

    #[error("Backend rejected the session token - log in again")]
    Unauthorized,

    #[error("Signed-in account may not view this data: {0}")]
    Forbidden(String),

    #[error("Backend has no such collection: {0}")]
    NoSuchCollection(String),

    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("Backend is throttling requests - try again shortly")]
    RateLimited,

    #[error("Backend failed with {status}: {body}")]
    Backend { status: StatusCode, body: String },

    #[error("Unexpected reply from backend: {0}")]
    InvalidResponse(String),
}

/// Longest response body carried into an error message
const MAX_BODY_CHARS: usize = 500;

impl ApiError {
    /// Cut `body` to at most `MAX_BODY_CHARS` characters
    fn excerpt(body: &str) -> String {
        let body = body.trim();
        match body.char_indices().nth(MAX_BODY_CHARS) {
            None => body.to_string(),
            Some((end, _)) => format!("{}... ({} bytes in all)", &body[..end], body.len()),
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = Self::excerpt(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(body),
            404 => ApiError::NoSuchCollection(body),
            429 => ApiError::RateLimited,
            400 | 422 => ApiError::Rejected(body),
            500..=599 => ApiError::Backend { status, body },
            _ => ApiError::InvalidResponse(format!("status {}: {}", status, body)),
        }
    }
}
