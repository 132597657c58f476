use crate::classify::SearchPolicy;
use crate::effort::{Effort, Verbosity, DEFAULT_MODEL};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One logical search call. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub model: String,
    pub effort: Effort,
    pub verbosity: Verbosity,
    /// Continuation token from a prior response. Never `Some("")`.
    pub previous_response_id: Option<String>,
    pub use_web_search: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            model: DEFAULT_MODEL.to_string(),
            effort: Effort::DEFAULT,
            verbosity: Verbosity::DEFAULT,
            previous_response_id: None,
            use_web_search: false,
        }
    }

    /// Blank model names fall back to [`DEFAULT_MODEL`].
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        let model = model.trim();
        self.model = if model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            model.to_string()
        };
        self
    }

    pub fn with_effort(mut self, effort: Effort) -> Self {
        self.effort = effort;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Blank ids mean "start fresh" and are dropped.
    pub fn with_previous_response_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        let id = id.trim();
        self.previous_response_id = (!id.is_empty()).then(|| id.to_string());
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.use_web_search = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.effort.timeout()
    }

    /// Wire body for the Responses endpoint.
    pub fn to_body(&self) -> RequestBody {
        RequestBody {
            model: self.model.clone(),
            input: self.query.clone(),
            reasoning: ReasoningParams {
                effort: self.effort,
            },
            text: TextParams {
                verbosity: self.verbosity,
            },
            tools: self
                .use_web_search
                .then(|| vec![ToolSpec::WebSearchPreview]),
            previous_response_id: self
                .previous_response_id
                .clone()
                .filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RequestBody {
    pub model: String,
    pub input: String,
    pub reasoning: ReasoningParams,
    pub text: TextParams,
    /// Absent (not `[]`) when web search is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
    /// Absent (not `""`) when there is nothing to continue from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ReasoningParams {
    pub effort: Effort,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TextParams {
    pub verbosity: Verbosity,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    WebSearchPreview,
}

/// How the caller wants web search decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebSearchMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl WebSearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Always => "always",
            Self::Never => "never",
        }
    }

    /// Empty input means `auto`. `true`/`false` are accepted as aliases for
    /// `always`/`never` since some clients send the older boolean form.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "always" | "true" => Ok(Self::Always),
            "never" | "false" => Ok(Self::Never),
            _ => Err(Error::InvalidParams(format!(
                "Invalid web_search mode: {} (use 'auto', 'always', or 'never')",
                s.trim()
            ))),
        }
    }

    /// `always`/`never` bypass the classifier entirely.
    pub fn resolve(self, query: &str, policy: &SearchPolicy) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => policy.needs_web_search(query),
        }
    }
}

impl fmt::Display for WebSearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
