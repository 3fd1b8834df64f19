use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No response was received (DNS, connect, timeout, TLS).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    /// The backend answered with an error status.
    #[error("Request rejected (status {status}){}", rejection_suffix(.message))]
    Rejected { status: u16, message: Option<String> },

    /// A stored token was refused while restoring the session, or an
    /// authenticated operation was attempted without a session.
    #[error("No valid session")]
    InvalidSession,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn rejection_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the `message` field out of a JSON error body, if there is one.
    fn extract_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            code => {
                let message = Self::extract_message(body).or_else(|| {
                    let trimmed = body.trim();
                    // HTML error pages are noise, keep plain-text bodies only
                    (!trimmed.is_empty() && !trimmed.starts_with('<'))
                        .then(|| Self::truncate_body(trimmed))
                });
                ApiError::Rejected {
                    status: code,
                    message,
                }
            }
        }
    }

    /// True when the backend received the request and refused it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::Rejected { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Text for a transient error notification: the backend's own message when
    /// it sent one, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Rejected {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            ApiError::InvalidInput(reason) => reason.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::from_status(status, "")
        } else if err.is_builder() {
            ApiError::InvalidInput(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
