//! reqwest implementation of [`answerpipe_core::ResponsesBackend`] for
//! OpenAI-style `/v1/responses` endpoints.

use answerpipe_core::{Error, Result};

pub mod responses;

pub use responses::ResponsesClient;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/responses";

pub const API_KEY_ENV: &str = "ANSWERPIPE_OPENAI_API_KEY";
pub const API_KEY_ENV_FALLBACK: &str = "OPENAI_API_KEY";
pub const ENDPOINT_ENV: &str = "ANSWERPIPE_OPENAI_ENDPOINT";

fn env_nonempty(k: &str) -> Option<String> {
    std::env::var(k)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Bearer credential: the prefixed name wins, then the canonical one.
/// Blank values count as missing.
pub fn api_key_from_env() -> Option<String> {
    env_nonempty(API_KEY_ENV).or_else(|| env_nonempty(API_KEY_ENV_FALLBACK))
}

/// Endpoint override (for testing / proxies), else [`DEFAULT_ENDPOINT`].
pub fn endpoint_from_env() -> Result<String> {
    match env_nonempty(ENDPOINT_ENV) {
        Some(s) => validate_endpoint(&s),
        None => Ok(DEFAULT_ENDPOINT.to_string()),
    }
}

/// Accept only absolute http(s) URLs.
pub fn validate_endpoint(s: &str) -> Result<String> {
    let u = url::Url::parse(s.trim())
        .map_err(|e| Error::NotConfigured(format!("invalid endpoint {s:?}: {e}")))?;
    match u.scheme() {
        "http" | "https" => Ok(u.to_string()),
        other => Err(Error::NotConfigured(format!(
            "invalid endpoint {s:?}: unsupported scheme {other}"
        ))),
    }
}

/// Shared HTTP client. Per-request timeouts are set at call time.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("answerpipe/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::NotConfigured(format!("build http client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        k: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(k: &'static str, v: &str) -> Self {
            let prev = std::env::var(k).ok();
            std::env::set_var(k, v);
            Self { k, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(v) = self.prev.take() {
                std::env::set_var(self.k, v);
            } else {
                std::env::remove_var(self.k);
            }
        }
    }

    // Single test so the env mutations never race each other.
    #[test]
    fn env_resolution() {
        let _a = EnvGuard::set(API_KEY_ENV, "   ");
        let _b = EnvGuard::set(API_KEY_ENV_FALLBACK, "sk-fallback");
        assert_eq!(api_key_from_env().as_deref(), Some("sk-fallback"));
        {
            let _c = EnvGuard::set(API_KEY_ENV, "sk-primary");
            assert_eq!(api_key_from_env().as_deref(), Some("sk-primary"));
        }

        let _e = EnvGuard::set(ENDPOINT_ENV, "");
        assert_eq!(endpoint_from_env().unwrap(), DEFAULT_ENDPOINT);
        {
            let _f = EnvGuard::set(ENDPOINT_ENV, "http://127.0.0.1:9/v1/responses");
            assert_eq!(
                endpoint_from_env().unwrap(),
                "http://127.0.0.1:9/v1/responses"
            );
        }
        {
            let _g = EnvGuard::set(ENDPOINT_ENV, "ftp://example.com/x");
            assert_eq!(endpoint_from_env().unwrap_err().code(), "not_configured");
        }
    }
}
