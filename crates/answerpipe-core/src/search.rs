//! Search orchestration: argument bag -> request -> one backend call -> result payload.

use crate::classify::{Classification, SearchPolicy};
use crate::effort::{validate_effort, validate_verbosity};
use crate::observer::{SearchObserver, TracingObserver};
use crate::request::{SearchRequest, WebSearchMode};
use crate::response::ApiResponse;
use crate::{Error, Result, TransportKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const MISSING_QUERY: &str = "Please provide a query to search for";
pub const NO_ANSWER: &str = "No answer found in response";

/// A Responses-style HTTP backend. Implementations perform exactly one call
/// and never retry.
#[async_trait::async_trait]
pub trait ResponsesBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// POST `req` and return the body of a 2xx response verbatim.
    ///
    /// Non-2xx statuses must map to [`Error::Remote`] carrying the raw body.
    async fn send(&self, req: &SearchRequest, timeout: Duration) -> Result<String>;
}

/// Key-value arguments as received from a tool dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: Option<String>,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    pub verbosity: Option<String>,
    pub previous_response_id: Option<String>,
    pub web_search: Option<String>,
}

impl SearchArgs {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }
}

/// Structured result returned to callers (CLI json output, MCP tool payload).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub query: String,
    /// Model the remote reports it used.
    pub model: String,
    /// Effort the remote reports it used.
    pub effort: String,
    pub timeout_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub requested_model: String,
    pub requested_effort: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub requested_verbosity: String,
    pub web_search_mode: String,
    pub web_search_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebSearchResult {
    fn rejected(
        query: &str,
        mode: &str,
        previous_response_id: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            query: query.to_string(),
            web_search_mode: mode.to_string(),
            previous_response_id,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    fn planned(plan: &SearchPlan) -> Self {
        let req = &plan.request;
        Self {
            query: req.query.clone(),
            timeout_used: format_timeout(plan.timeout),
            timeout_ms: Some(plan.timeout.as_millis() as u64),
            requested_model: req.model.clone(),
            requested_effort: req.effort.to_string(),
            requested_verbosity: req.verbosity.to_string(),
            web_search_mode: plan.mode.to_string(),
            web_search_used: req.use_web_search,
            previous_response_id: req.previous_response_id.clone(),
            ..Self::default()
        }
    }
}

/// Everything decided before the network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub request: SearchRequest,
    pub mode: WebSearchMode,
    pub timeout: Duration,
    /// Present only when the mode was `auto`.
    pub classification: Option<Classification>,
}

/// Stateless per call: nothing here is mutated after construction, so one
/// `Searcher` can serve concurrent requests.
pub struct Searcher<B> {
    backend: B,
    policy: SearchPolicy,
    observer: Arc<dyn SearchObserver>,
    timeout_override: Option<Duration>,
}

impl<B: ResponsesBackend> Searcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            policy: SearchPolicy::default(),
            observer: Arc::new(TracingObserver),
            timeout_override: None,
        }
    }

    pub fn with_policy(mut self, policy: SearchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the effort-derived timeout for every call.
    pub fn with_timeout_override(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_override = timeout;
        self
    }

    #[cfg(test)]
    fn backend(&self) -> &B {
        &self.backend
    }

    /// Validate and normalize arguments. Rejections come back as a ready-made
    /// failure payload; no IO happens here.
    pub fn plan(&self, args: &SearchArgs) -> std::result::Result<SearchPlan, WebSearchResult> {
        let previous_response_id = args
            .previous_response_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let query = args.query.as_deref().unwrap_or("");
        if query.trim().is_empty() {
            return Err(WebSearchResult::rejected(
                query,
                WebSearchMode::Auto.as_str(),
                previous_response_id,
                MISSING_QUERY,
            ));
        }

        let raw_mode = args.web_search.as_deref().unwrap_or("");
        let mode = match WebSearchMode::parse(raw_mode) {
            Ok(m) => m,
            Err(e) => {
                return Err(WebSearchResult::rejected(
                    query,
                    raw_mode.trim(),
                    previous_response_id,
                    e.detail(),
                ))
            }
        };

        let classification = matches!(mode, WebSearchMode::Auto).then(|| self.policy.classify(query));
        let use_web_search = match &classification {
            Some(c) => c.use_web_search,
            None => mode.resolve(query, &self.policy),
        };

        let mut request = SearchRequest::new(query)
            .with_model(args.model.clone().unwrap_or_default())
            .with_effort(validate_effort(args.reasoning_effort.as_deref().unwrap_or("")))
            .with_verbosity(validate_verbosity(args.verbosity.as_deref().unwrap_or("")))
            .with_web_search(use_web_search);
        request.previous_response_id = previous_response_id;

        let timeout = self.timeout_override.unwrap_or_else(|| request.timeout());
        Ok(SearchPlan {
            request,
            mode,
            timeout,
            classification,
        })
    }

    /// One backend call bounded by `timeout` and `cancel`. Returns the raw body.
    pub async fn send_raw(
        &self,
        req: &SearchRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::transport(
                TransportKind::Cancelled,
                "request cancelled by caller",
            )),
            r = tokio::time::timeout(timeout, self.backend.send(req, timeout)) => match r {
                Ok(r) => r,
                Err(_elapsed) => Err(Error::transport(
                    TransportKind::Timeout,
                    format!("no response within {}", format_timeout(timeout)),
                )),
            },
        }
    }

    /// [`Self::send_raw`] + decode, reported through the observer.
    pub async fn execute(
        &self,
        req: &SearchRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        let t0 = Instant::now();
        tracing::debug!(target: "answerpipe::search", backend = self.backend.name(), "dispatching");
        self.observer.on_request_start(req, timeout);
        let res = self
            .send_raw(req, timeout, cancel)
            .await
            .and_then(|body| ApiResponse::from_body(&body));
        match res {
            Ok(resp) => {
                let answer = resp.answer();
                self.observer
                    .on_request_success(req, &resp, &answer, t0.elapsed());
                Ok(resp)
            }
            Err(e) => {
                self.observer.on_request_error(req, &e, t0.elapsed());
                Err(e)
            }
        }
    }

    /// Full pipeline for a tool-style argument bag.
    ///
    /// Rejected arguments and empty answers come back as `Ok` with
    /// `success=false`; hard failures (transport, remote status, decode) are `Err`.
    pub async fn run(&self, args: SearchArgs, cancel: &CancellationToken) -> Result<WebSearchResult> {
        let plan = match self.plan(&args) {
            Ok(p) => p,
            Err(rejected) => {
                tracing::warn!(
                    target: "answerpipe::search",
                    error = rejected.error.as_deref().unwrap_or(""),
                    "search rejected before any request"
                );
                return Ok(rejected);
            }
        };
        if let Some(c) = &plan.classification {
            tracing::debug!(
                target: "answerpipe::search",
                rule = ?c.rule,
                matched = c.matched.as_deref().unwrap_or(""),
                web_search = c.use_web_search,
                "auto web_search decision"
            );
        }

        let resp = self.execute(&plan.request, plan.timeout, cancel).await?;
        let answer = resp.answer();

        let mut out = WebSearchResult::planned(&plan);
        out.model = resp.model.clone();
        out.effort = resp.effort_echo().to_string();
        out.id = (!resp.id.is_empty()).then(|| resp.id.clone());
        if answer.is_empty() {
            tracing::warn!(target: "answerpipe::search", "{NO_ANSWER}");
            out.error = Some(NO_ANSWER.to_string());
            return Ok(out);
        }
        out.success = true;
        out.answer = Some(answer);
        Ok(out)
    }
}

/// `90s` -> `1m30s`, `300s` -> `5m0s`, sub-second values in ms.
pub fn format_timeout(d: Duration) -> String {
    if d.subsec_millis() != 0 || d.as_secs() == 0 {
        return format!("{}ms", d.as_millis());
    }
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
