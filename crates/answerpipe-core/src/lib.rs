//! Backend-agnostic types, policies, and answer extraction for `answerpipe`.
//!
//! Nothing in this crate performs network IO directly; HTTP backends implement
//! [`ResponsesBackend`] (see `answerpipe-openai`).

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod classify;
pub mod effort;
pub mod observer;
pub mod request;
pub mod response;
pub mod search;

pub use classify::{needs_web_search, Classification, Rule, SearchPolicy};
pub use effort::{
    timeout_for_effort, validate_effort, validate_verbosity, Effort, Verbosity, DEFAULT_MODEL,
};
pub use observer::{SearchObserver, TracingObserver};
pub use request::{RequestBody, SearchRequest, ToolSpec, WebSearchMode};
pub use response::{extract_answer, ApiResponse, ContentSegment, OutputItem};
pub use search::{ResponsesBackend, SearchArgs, SearchPlan, Searcher, WebSearchResult};

/// Why an outbound call could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Timeout,
    Connect,
    Cancelled,
    Other,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Cancelled => "cancelled",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("http request failed ({kind}): {message}")]
    Transport { kind: TransportKind, message: String },
    /// Non-2xx status. `body` is the response body exactly as received.
    #[error("api error: status={status}")]
    Remote { status: u16, body: String },
    /// The body was not a JSON object. `body` is kept verbatim for diagnostics.
    #[error("parse json: {message}")]
    Decode { message: String, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Stable machine-readable code (used in tool payloads and logs).
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::InvalidParams(_) => "invalid_params",
            Self::Transport {
                kind: TransportKind::Timeout,
                ..
            } => "transport_timeout",
            Self::Transport {
                kind: TransportKind::Cancelled,
                ..
            } => "cancelled",
            Self::Transport { .. } => "transport_failed",
            Self::Remote { .. } => "remote_error",
            Self::Decode { .. } => "decode_failed",
        }
    }

    /// Whether the same call could plausibly succeed if the caller tried again.
    /// This layer never retries on its own.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Transport { kind, .. } => !matches!(kind, TransportKind::Cancelled),
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            Self::NotConfigured(_) | Self::InvalidParams(_) | Self::Decode { .. } => false,
        }
    }

    /// Message without the category prefix that `Display` adds.
    pub fn detail(&self) -> String {
        match self {
            Self::NotConfigured(m) | Self::InvalidParams(m) => m.clone(),
            other => other.to_string(),
        }
    }

    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.transport_kind() == Some(TransportKind::Timeout)
    }

    /// Raw remote body, when the failure carries one.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Remote { body, .. } | Self::Decode { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_cancellation_are_distinguishable() {
        let t = Error::transport(TransportKind::Timeout, "deadline");
        let c = Error::transport(TransportKind::Cancelled, "ctrl-c");
        assert!(t.is_timeout());
        assert!(!c.is_timeout());
        assert_eq!(t.code(), "transport_timeout");
        assert_eq!(c.code(), "cancelled");
        assert!(t.retryable());
        assert!(!c.retryable());
    }

    #[test]
    fn remote_error_keeps_body_out_of_the_one_line_message() {
        let e = Error::Remote {
            status: 401,
            body: "{\n  \"error\": \"unauthorized\"\n}".to_string(),
        };
        assert_eq!(e.to_string(), "api error: status=401");
        assert_eq!(e.raw_body(), Some("{\n  \"error\": \"unauthorized\"\n}"));
        assert_eq!(e.status(), Some(401));
        assert!(!e.retryable());
    }

    #[test]
    fn detail_drops_the_category_prefix() {
        let e = Error::InvalidParams("bad mode".into());
        assert_eq!(e.to_string(), "invalid params: bad mode");
        assert_eq!(e.detail(), "bad mode");
        let t = Error::transport(TransportKind::Connect, "refused");
        assert_eq!(t.detail(), t.to_string());
    }

    #[test]
    fn server_errors_and_rate_limits_are_retryable() {
        for status in [429u16, 500, 503] {
            let e = Error::Remote {
                status,
                body: String::new(),
            };
            assert!(e.retryable(), "status={status}");
        }
    }
}
