//! Structured errors for backend calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of chat backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatErrorKind {
    /// Network or connection failure reaching the backend
    Transport,
    /// Connect or read timeout
    Timeout,
    /// Non-2xx response on the login call
    Auth,
    /// Non-2xx response on a chat call
    ChatRequest,
    /// Response body failed mid-read or could not be framed
    Stream,
}

impl fmt::Display for ChatErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatErrorKind::Transport => write!(f, "transport"),
            ChatErrorKind::Timeout => write!(f, "timeout"),
            ChatErrorKind::Auth => write!(f, "auth"),
            ChatErrorKind::ChatRequest => write!(f, "chat_request"),
            ChatErrorKind::Stream => write!(f, "stream"),
        }
    }
}

/// Structured error from the backend with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatError {
    /// Error category
    pub kind: ChatErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error of the given kind.
    ///
    /// FastAPI-style bodies (`{"detail": "..."}`) and `{"error": {"message": "..."}}`
    /// bodies are reduced to their message; anything else is kept as details.
    pub fn http_status(kind: ChatErrorKind, status: u16, body: &str) -> Self {
        let body = body.trim();
        if body.is_empty() {
            return Self::new(kind, format!("HTTP {status}"));
        }

        if let Some(msg) = extract_error_message(body) {
            return Self {
                kind,
                message: format!("HTTP {status}: {msg}"),
                details: Some(body.to_string()),
            };
        }

        Self {
            kind,
            message: format!("HTTP {status}: {body}"),
            details: Some(body.to_string()),
        }
    }

    /// Classifies a reqwest failure that happened before a status was received.
    pub fn transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(ChatErrorKind::Timeout, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(ChatErrorKind::Transport, format!("Connection failed: {e}"))
        } else if e.is_request() {
            Self::new(ChatErrorKind::Transport, format!("Request error: {e}"))
        } else {
            Self::new(ChatErrorKind::Transport, format!("Network error: {e}"))
        }
    }

    /// Creates a mid-stream read failure.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Stream, message)
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    if let Some(detail) = json.get("detail").and_then(Value::as_str) {
        return Some(detail.to_string());
    }
    json.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ChatError {}

/// Result type for backend operations.
pub type ChatResult<T> = std::result::Result<T, ChatError>;
