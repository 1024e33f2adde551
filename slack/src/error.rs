//! Error types for the Slack front-end.

use thiserror::Error;

/// Errors that can occur while talking to Slack.
#[derive(Error, Debug)]
pub enum SlackError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid or revoked token.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Slack answered with `ok: false` or an unexpected status.
    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Payload did not have the shape we expected.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for SlackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlackError::Timeout(err.to_string())
        } else if err.is_connect() {
            SlackError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            SlackError::Json(err.to_string())
        } else {
            SlackError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlackError {
    fn from(err: serde_json::Error) -> Self {
        SlackError::Json(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SlackError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SlackError::WebSocket(err.to_string())
    }
}

pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// Maps the `error` code of an `ok: false` response onto [`SlackError`].
pub fn api_error(method: &str, code: &str) -> SlackError {
    match code {
        "ratelimited" | "rate_limited" => SlackError::RateLimited {
            retry_after_secs: 30,
        },
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" => {
            SlackError::Auth(format!("{} failed: {}", method, code))
        }
        _ => SlackError::Api(format!("{} failed: {}", method, code)),
    }
}
