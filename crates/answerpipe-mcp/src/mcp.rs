use answerpipe_core::search::NO_ANSWER;
use answerpipe_core::{
    Effort, Error as AnswerpipeError, SearchArgs, SearchPolicy, Searcher, Verbosity,
    WebSearchMode, WebSearchResult, DEFAULT_MODEL,
};
use answerpipe_openai::{
    endpoint_from_env, validate_endpoint, ResponsesClient, API_KEY_ENV, API_KEY_ENV_FALLBACK,
};
use rmcp::{
    handler::server::router::tool::ToolRouter as RmcpToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        AnnotateAble, CallToolResult, Content, GetPromptRequestParam, GetPromptResult,
        ListPromptsResult, ListResourcesResult, PaginatedRequestParam, Prompt, PromptArgument,
        PromptMessage, PromptMessageRole, RawResource, ReadResourceRequestParam,
        ReadResourceResult, Resource, ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

mod envelope;
use envelope::*;

const SCHEMA_VERSION: u64 = 1;

pub(crate) const INSTRUCTIONS: &str = "\
Web-backed answers from an OpenAI GPT model. Call gpt_websearch instead of relying on training data \
for anything current, niche, or verifiable.

Parameters:
- model: gpt-5-nano for quick facts and definitions; gpt-5-mini (default) for scoped research and \
comparisons; gpt-5.1 for coding questions and multi-step analysis.
- reasoning_effort: minimal (90s timeout) for speed-critical lookups and coding; low (3m) for simple \
lookups; medium (5m, default) for synthesis; high (10m) for deep multi-part research.
- verbosity: low for terse or code-first answers; medium (default); high for teaching-style answers.
- web_search: auto (default) lets the server decide from the query wording; always forces a search; \
never answers from model knowledge only (use for reformatting or clarifying an earlier answer).
- previous_response_id: pass the `id` of an earlier result for follow-ups on the same topic. The model \
keeps its earlier reasoning, which is faster and cheaper. Pair it with web_search=never when the \
follow-up only rewords what was already retrieved. Start fresh for unrelated topics.

Write specific queries: add the timeframe, region, or domain the user cares about. Chain ids across \
related searches and keep searching until the question is fully answered. Results are synthesized \
answers, not link lists.

Failures come back as success=false with error and error_info {code, message, hint, retryable}.";

pub(crate) const PROMPT_WEB_SEARCH: &str = "web_search";
pub(crate) const PROMPT_GUIDE: &str = "gpt_websearch_guide";
pub(crate) const RESOURCE_SERVER_INFO: &str = "server-info";
pub(crate) const RESOURCE_META: &str = "answerpipe://meta";

/// Server knobs fixed at startup.
#[derive(Debug, Clone, Default)]
pub(crate) struct ServerConfig {
    /// Overrides `ANSWERPIPE_OPENAI_ENDPOINT`.
    pub(crate) endpoint: Option<String>,
    /// Replaces the effort-derived timeout for every call.
    pub(crate) timeout_override: Option<Duration>,
}

/// `web_search` accepts the mode string or a boolean.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub(crate) enum WebSearchArg {
    Flag(bool),
    Mode(String),
}

impl WebSearchArg {
    fn into_mode_string(self) -> String {
        match self {
            Self::Flag(true) => WebSearchMode::Always.as_str().to_string(),
            Self::Flag(false) => WebSearchMode::Never.as_str().to_string(),
            Self::Mode(s) => s,
        }
    }
}

// Arguments of the wrong JSON type count as absent, so the caller gets the
// normal defaulting (or the missing-query result) rather than a protocol error.
fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

fn loose_web_search<'de, D: Deserializer<'de>>(d: D) -> Result<Option<WebSearchArg>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Bool(b) => Some(WebSearchArg::Flag(b)),
        serde_json::Value::String(s) => Some(WebSearchArg::Mode(s)),
        _ => None,
    })
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
pub(crate) struct GptWebsearchArgs {
    /// The search query or question to ask (required).
    #[serde(default, deserialize_with = "loose_string")]
    pub(crate) query: Option<String>,
    /// Model to use (default: gpt-5-mini).
    #[serde(default, deserialize_with = "loose_string")]
    pub(crate) model: Option<String>,
    /// minimal (90s), low (3m), medium (5m, default), or high (10m timeout).
    #[serde(default, deserialize_with = "loose_string")]
    pub(crate) reasoning_effort: Option<String>,
    /// low, medium (default), or high.
    #[serde(default, deserialize_with = "loose_string")]
    pub(crate) verbosity: Option<String>,
    /// `id` of an earlier result to continue from.
    #[serde(default, deserialize_with = "loose_string")]
    pub(crate) previous_response_id: Option<String>,
    /// auto (default), always, or never. true/false are accepted as always/never.
    #[serde(default, deserialize_with = "loose_web_search")]
    pub(crate) web_search: Option<WebSearchArg>,
}

impl From<GptWebsearchArgs> for SearchArgs {
    fn from(a: GptWebsearchArgs) -> Self {
        SearchArgs {
            query: a.query,
            model: a.model,
            reasoning_effort: a.reasoning_effort,
            verbosity: a.verbosity,
            previous_response_id: a.previous_response_id,
            web_search: a.web_search.map(WebSearchArg::into_mode_string),
        }
    }
}

fn tool_result(payload: serde_json::Value) -> CallToolResult {
    let mut r = CallToolResult::structured(payload.clone());
    r.content = vec![Content::text(payload.to_string())];
    r
}

/// Soft outcomes (rejected args, empty answer) keep the search result shape
/// and gain an `error_info` object.
pub(crate) fn result_payload(r: &WebSearchResult) -> serde_json::Value {
    let mut v = serde_json::to_value(r).unwrap_or_else(|_| serde_json::json!({}));
    if !r.success {
        let msg = r.error.as_deref().unwrap_or("");
        let code = if msg == NO_ANSWER {
            ErrorCode::NoAnswer
        } else {
            ErrorCode::InvalidParams
        };
        v["success"] = serde_json::json!(false);
        v["error_info"] = error_obj(code, msg);
    }
    v
}

/// Hard failures still come back as a normal tool result, never a protocol error.
pub(crate) fn failure_payload(args: &SearchArgs, e: &AnswerpipeError) -> serde_json::Value {
    let mut v = serde_json::json!({
        "success": false,
        "query": args.query.clone().unwrap_or_default(),
        "web_search_mode": args.web_search.clone().unwrap_or_else(|| WebSearchMode::Auto.to_string()),
        "error": e.to_string(),
        "error_info": error_obj_from(e),
    });
    if let Some(status) = e.status() {
        v["status"] = serde_json::json!(status);
    }
    if let Some(body) = e.raw_body() {
        v["body"] = serde_json::json!(body);
    }
    v
}

fn has_env(k: &str) -> bool {
    crate::env_nonempty(k).is_some()
}

pub(crate) fn prompts() -> Vec<Prompt> {
    vec![
        Prompt::new(
            PROMPT_WEB_SEARCH,
            Some("Template for web search queries"),
            Some(vec![PromptArgument {
                name: "topic".to_string(),
                title: None,
                description: Some("The topic to search for".to_string()),
                required: Some(true),
            }]),
        ),
        Prompt::new(
            PROMPT_GUIDE,
            Some("How to pick model, effort, verbosity, web_search, and follow-up ids for gpt_websearch"),
            None,
        ),
    ]
}

pub(crate) fn render_prompt(
    name: &str,
    arguments: Option<&serde_json::Map<String, serde_json::Value>>,
) -> Result<GetPromptResult, McpError> {
    match name {
        PROMPT_WEB_SEARCH => {
            let topic = arguments
                .and_then(|a| a.get("topic"))
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| McpError::invalid_params("topic parameter is required", None))?;
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage::new_text(
                    PromptMessageRole::User,
                    format!("Search the web for: {topic}"),
                )],
            })
        }
        PROMPT_GUIDE => Ok(GetPromptResult {
            description: Some("gpt_websearch usage guidance".to_string()),
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, INSTRUCTIONS)],
        }),
        other => Err(McpError::invalid_params(format!("unknown prompt: {other}"), None)),
    }
}

pub(crate) fn resources() -> Vec<Resource> {
    let mut info = RawResource::new(RESOURCE_SERVER_INFO, RESOURCE_SERVER_INFO);
    info.description = Some("Information about the MCP server".to_string());
    info.mime_type = Some("text/plain".to_string());

    let mut meta = RawResource::new(RESOURCE_META, "answerpipe-meta");
    meta.description = Some("Configuration, defaults, and effort timeouts (no secrets)".to_string());
    meta.mime_type = Some("application/json".to_string());

    vec![info.no_annotation(), meta.no_annotation()]
}

#[derive(Clone)]
pub(crate) struct AnswerpipeMcp {
    tool_router: RmcpToolRouter<Self>,
    http: reqwest::Client,
    config: ServerConfig,
    policy: SearchPolicy,
    shutdown: CancellationToken,
}

#[tool_router]
impl AnswerpipeMcp {
    pub(crate) fn new(config: ServerConfig, shutdown: CancellationToken) -> Result<Self, McpError> {
        let http = answerpipe_openai::http_client()
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(Self {
            tool_router: Self::tool_router(),
            http,
            config,
            policy: SearchPolicy::default(),
            shutdown,
        })
    }

    fn endpoint(&self) -> Result<String, AnswerpipeError> {
        match self.config.endpoint.as_deref() {
            Some(e) => validate_endpoint(e),
            None => endpoint_from_env(),
        }
    }

    /// Built per call so key/endpoint changes in the environment are picked up.
    fn searcher(&self) -> Result<Searcher<ResponsesClient>, AnswerpipeError> {
        let client = ResponsesClient::from_env(self.http.clone(), self.config.endpoint.as_deref())?;
        Ok(Searcher::new(client)
            .with_policy(self.policy.clone())
            .with_timeout_override(self.config.timeout_override))
    }

    fn meta_payload(&self) -> serde_json::Value {
        let (endpoint, endpoint_error) = match self.endpoint() {
            Ok(e) => (Some(e), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let efforts: Vec<serde_json::Value> = Effort::ALL
            .iter()
            .map(|e| serde_json::json!({ "effort": e.as_str(), "timeout_s": e.timeout().as_secs() }))
            .collect();

        serde_json::json!({
            "ok": true,
            "name": "answerpipe",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoint": endpoint,
            "endpoint_error": endpoint_error,
            "configured": {
                // Booleans only; never values.
                "openai_api_key": has_env(API_KEY_ENV) || has_env(API_KEY_ENV_FALLBACK),
            },
            "defaults": {
                "model": DEFAULT_MODEL,
                "reasoning_effort": Effort::DEFAULT.as_str(),
                "verbosity": Verbosity::DEFAULT.as_str(),
                "web_search": WebSearchMode::Auto.as_str(),
            },
            "timeout_override_ms": self.config.timeout_override.map(|d| d.as_millis() as u64),
            "efforts": efforts,
            "tools": ["gpt_websearch", "answerpipe_meta"],
            "prompts": [PROMPT_WEB_SEARCH, PROMPT_GUIDE],
            "resources": [RESOURCE_SERVER_INFO, RESOURCE_META],
        })
    }

    pub(crate) fn read_resource_contents(&self, uri: &str) -> Result<ResourceContents, McpError> {
        let (mime, text) = match uri {
            RESOURCE_SERVER_INFO => {
                let endpoint = self
                    .endpoint()
                    .unwrap_or_else(|e| format!("<invalid: {}>", e.detail()));
                (
                    "text/plain",
                    format!(
                        "answerpipe MCP server\nVersion: {}\nEndpoint: {endpoint}\n",
                        env!("CARGO_PKG_VERSION")
                    ),
                )
            }
            RESOURCE_META => ("application/json", self.meta_payload().to_string()),
            other => {
                return Err(McpError::resource_not_found(
                    format!("unknown resource: {other}"),
                    None,
                ))
            }
        };
        Ok(ResourceContents::TextResourceContents {
            uri: uri.to_string(),
            mime_type: Some(mime.to_string()),
            text,
            meta: None,
        })
    }

    #[tool(
        description = "Search the web using an OpenAI GPT model with web search capabilities; returns a synthesized answer plus a response id for follow-ups"
    )]
    async fn gpt_websearch(
        &self,
        params: Parameters<Option<GptWebsearchArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let t0 = Instant::now();
        let args: SearchArgs = params.0.unwrap_or_default().into();

        let mut payload = match self.searcher() {
            Err(e) => failure_payload(&args, &e),
            Ok(searcher) => {
                let cancel = self.shutdown.child_token();
                match searcher.run(args.clone(), &cancel).await {
                    Ok(r) => result_payload(&r),
                    Err(e) => failure_payload(&args, &e),
                }
            }
        };
        add_envelope_fields(&mut payload, "gpt_websearch", t0.elapsed().as_millis());
        Ok(tool_result(payload))
    }

    #[tool(description = "Report answerpipe configuration, defaults, and effort timeouts (no secrets)")]
    async fn answerpipe_meta(&self) -> Result<CallToolResult, McpError> {
        let t0 = Instant::now();
        let mut payload = self.meta_payload();
        add_envelope_fields(&mut payload, "answerpipe_meta", t0.elapsed().as_millis());
        Ok(tool_result(payload))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for AnswerpipeMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            prompts: prompts(),
            ..Default::default()
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        render_prompt(&request.name, request.arguments.as_ref())
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: resources(),
            ..Default::default()
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        Ok(ReadResourceResult {
            contents: vec![self.read_resource_contents(&request.uri)?],
        })
    }
}

pub(crate) async fn serve_stdio(
    config: ServerConfig,
    shutdown: CancellationToken,
) -> Result<(), McpError> {
    let svc = AnswerpipeMcp::new(config, shutdown)?;
    tracing::info!(target: "answerpipe::mcp", "serving MCP over stdio");
    let running = svc
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(())
}

#[cfg(feature = "http")]
pub(crate) use http::serve_http;

#[cfg(feature = "http")]
mod http {
    use super::{AnswerpipeMcp, ServerConfig};
    use axum::{routing::get, Json, Router};
    use rmcp::transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    };
    use rmcp::ErrorData as McpError;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    pub(crate) const MCP_PATH: &str = "/mcp";

    async fn health() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "status": "healthy",
            "server": "answerpipe",
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }

    /// `/health` plus the streamable-HTTP MCP endpoint at `/mcp`.
    pub(crate) fn router(
        config: ServerConfig,
        shutdown: CancellationToken,
    ) -> Result<Router, McpError> {
        let svc = AnswerpipeMcp::new(config, shutdown.clone())?;
        let mcp = StreamableHttpService::new(
            move || Ok(svc.clone()),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                cancellation_token: shutdown.child_token(),
                ..Default::default()
            },
        );
        Ok(Router::new()
            .route("/health", get(health))
            .route_service(MCP_PATH, mcp))
    }

    pub(crate) async fn serve_http(
        bind: &str,
        config: ServerConfig,
        shutdown: CancellationToken,
    ) -> Result<(), McpError> {
        let app = router(config, shutdown.clone())?;
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .map_err(|e| McpError::internal_error(format!("bind {bind}: {e}"), None))?;
        let addr = listener
            .local_addr()
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        tracing::info!(target: "answerpipe::mcp", %addr, "serving MCP over http at {MCP_PATH}");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

}
