use crate::{
    api_key_from_env, endpoint_from_env, validate_endpoint, API_KEY_ENV, API_KEY_ENV_FALLBACK,
};
use answerpipe_core::{
    ApiResponse, Error, ResponsesBackend, Result, SearchRequest, TransportKind,
};
use std::fmt;
use std::time::{Duration, Instant};

/// One POST per call against a Responses endpoint. Never retries.
#[derive(Clone)]
pub struct ResponsesClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl fmt::Debug for ResponsesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsesClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ResponsesClient {
    /// Fails with [`Error::NotConfigured`] on a blank key, before any IO.
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(missing_key());
        }
        Ok(Self {
            client,
            api_key,
            endpoint: endpoint.into(),
        })
    }

    /// Key from the environment. A non-blank `endpoint` replaces
    /// `ANSWERPIPE_OPENAI_ENDPOINT`; either way it is validated first.
    pub fn from_env(client: reqwest::Client, endpoint: Option<&str>) -> Result<Self> {
        let endpoint = match endpoint.map(str::trim).filter(|s| !s.is_empty()) {
            Some(e) => validate_endpoint(e)?,
            None => endpoint_from_env()?,
        };
        Self::new(client, api_key_from_env().unwrap_or_default(), endpoint)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST and return the 2xx body verbatim.
    pub async fn send_raw(&self, req: &SearchRequest, timeout: Duration) -> Result<String> {
        let t0 = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req.to_body())
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        tracing::debug!(
            target: "answerpipe::openai",
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "responses call returned"
        );
        // Bodies are kept byte-for-byte when they are UTF-8. Anything else is
        // converted lossily and, on 2xx, reported as undecodable.
        let (body, utf8_error) = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => (body, None),
            Err(e) => (
                String::from_utf8_lossy(e.as_bytes()).into_owned(),
                Some(e.utf8_error()),
            ),
        };
        if !status.is_success() {
            return Err(Error::Remote {
                status: status.as_u16(),
                body,
            });
        }
        if let Some(e) = utf8_error {
            return Err(Error::Decode {
                message: format!("response body is not UTF-8: {e}"),
                body,
            });
        }
        Ok(body)
    }

    /// [`Self::send_raw`] followed by envelope decoding.
    pub async fn create(&self, req: &SearchRequest, timeout: Duration) -> Result<ApiResponse> {
        let body = self.send_raw(req, timeout).await?;
        ApiResponse::from_body(&body)
    }
}

#[async_trait::async_trait]
impl ResponsesBackend for ResponsesClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn send(&self, req: &SearchRequest, timeout: Duration) -> Result<String> {
        self.send_raw(req, timeout).await
    }
}

fn missing_key() -> Error {
    Error::NotConfigured(format!(
        "missing {API_KEY_ENV} (or {API_KEY_ENV_FALLBACK})"
    ))
}

fn transport_error(e: reqwest::Error) -> Error {
    let kind = if e.is_timeout() {
        TransportKind::Timeout
    } else if e.is_connect() {
        TransportKind::Connect
    } else {
        TransportKind::Other
    };
    Error::transport(kind, e.to_string())
}
