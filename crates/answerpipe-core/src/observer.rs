//! Request lifecycle hooks.
//!
//! The searcher reports start / error / success through an injected observer
//! instead of logging directly, so callers decide where events go.

use crate::request::SearchRequest;
use crate::response::ApiResponse;
use crate::Error;
use std::time::Duration;

pub trait SearchObserver: Send + Sync {
    fn on_request_start(&self, _req: &SearchRequest, _timeout: Duration) {}

    fn on_request_error(&self, _req: &SearchRequest, _err: &Error, _elapsed: Duration) {}

    fn on_request_success(
        &self,
        _req: &SearchRequest,
        _resp: &ApiResponse,
        _answer: &str,
        _elapsed: Duration,
    ) {
    }
}

/// Emits structured `tracing` events under the `answerpipe::search` target.
///
/// Never records the query text at info level or above.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SearchObserver for TracingObserver {
    fn on_request_start(&self, req: &SearchRequest, timeout: Duration) {
        tracing::info!(
            target: "answerpipe::search",
            model = %req.model,
            effort = %req.effort,
            verbosity = %req.verbosity,
            web_search = req.use_web_search,
            continued = req.previous_response_id.is_some(),
            timeout_s = timeout.as_secs(),
            "search request started"
        );
        tracing::debug!(target: "answerpipe::search", query = %req.query, "search query");
    }

    fn on_request_error(&self, req: &SearchRequest, err: &Error, elapsed: Duration) {
        tracing::warn!(
            target: "answerpipe::search",
            model = %req.model,
            code = err.code(),
            status = err.status(),
            retryable = err.retryable(),
            elapsed_ms = elapsed.as_millis() as u64,
            error = %err,
            "search request failed"
        );
    }

    fn on_request_success(
        &self,
        req: &SearchRequest,
        resp: &ApiResponse,
        answer: &str,
        elapsed: Duration,
    ) {
        tracing::info!(
            target: "answerpipe::search",
            requested_model = %req.model,
            model = %resp.model,
            effort = %resp.effort_echo(),
            response_id = %resp.id,
            answer_chars = answer.chars().count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "search request completed"
        );
    }
}
