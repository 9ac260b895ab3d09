//! Error taxonomy for the session core.
//!
//! - `SendRejected`: invalid input, rejected before any network activity
//! - `TransportError`: the generation call failed or its body could not be read
//! - `NotAllowed`: reference toggling while analysis mode is off
//!
//! None of these are ever propagated as unhandled faults: the controller turns
//! transport failures into a log entry and the other two into transient notices.

use std::fmt;

use serde_json::Value;

/// Fixed error text written into the log when a turn fails.
pub const TURN_ERROR_TEXT: &str = "오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

/// Transient notice shown when a reference is toggled outside analysis mode.
pub const NOT_ALLOWED_NOTICE: &str = "분석 모드를 켠 후 기사를 선택할 수 있습니다.";

/// Categories of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Non-success HTTP status (4xx, 5xx)
    HttpStatus,
    /// Request or connection timed out
    Timeout,
    /// Connection could not be established
    Connect,
    /// Request could not be built or sent
    Request,
    /// Response body failed mid-stream or was unreadable
    Body,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::HttpStatus => write!(f, "http_status"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Request => write!(f, "request"),
            TransportErrorKind::Body => write!(f, "body"),
        }
    }
}

/// Structured transport failure with kind and details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Error category
    pub kind: TransportErrorKind,
    /// One-line summary suitable for logs
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, pulling a cleaner message out of JSON bodies.
    pub fn http_status(status: u16, body: &str) -> Self {
        if body.is_empty() {
            return Self::new(TransportErrorKind::HttpStatus, format!("HTTP {status}"));
        }

        // FastAPI reports failures as {"detail": "..."}; OpenAI-style as {"error": {"message": ...}}
        if let Ok(json) = serde_json::from_str::<Value>(body) {
            let extracted = json
                .get("detail")
                .and_then(Value::as_str)
                .or_else(|| {
                    json.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(Value::as_str)
                });
            if let Some(msg) = extracted {
                return Self {
                    kind: TransportErrorKind::HttpStatus,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
        }

        Self {
            kind: TransportErrorKind::HttpStatus,
            message: format!("HTTP {status}"),
            details: Some(body.to_string()),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn body(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Body, message)
    }

    /// Classifies a reqwest failure.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(TransportErrorKind::Connect, format!("Connection failed: {e}"))
        } else if e.is_body() || e.is_decode() {
            Self::body(format!("Body error: {e}"))
        } else if e.is_request() || e.is_builder() {
            Self::new(TransportErrorKind::Request, format!("Request error: {e}"))
        } else {
            Self::new(TransportErrorKind::Request, format!("Network error: {e}"))
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::from_reqwest(&e)
    }
}

/// Why a `send` was refused locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    /// Text was empty or whitespace only.
    Blank,
    /// Another turn is already `Sending` or `Streaming`.
    TurnInProgress,
}

impl fmt::Display for SendRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendRejected::Blank => write!(f, "message is empty"),
            SendRejected::TurnInProgress => write!(f, "a response is still being generated"),
        }
    }
}

impl std::error::Error for SendRejected {}

/// Reference selection was attempted while analysis mode is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotAllowed;

impl NotAllowed {
    /// Text for the transient notice the caller should surface.
    pub fn notice(self) -> &'static str {
        NOT_ALLOWED_NOTICE
    }
}

impl fmt::Display for NotAllowed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{NOT_ALLOWED_NOTICE}")
    }
}

impl std::error::Error for NotAllowed {}
