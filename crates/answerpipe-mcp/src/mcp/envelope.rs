use answerpipe_core::{Error, TransportKind};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    NotConfigured,
    TransportTimeout,
    TransportFailed,
    Cancelled,
    RemoteError,
    DecodeFailed,
    NoAnswer,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::NotConfigured => "not_configured",
            Self::TransportTimeout => "transport_timeout",
            Self::TransportFailed => "transport_failed",
            Self::Cancelled => "cancelled",
            Self::RemoteError => "remote_error",
            Self::DecodeFailed => "decode_failed",
            Self::NoAnswer => "no_answer",
        }
    }

    pub(crate) fn from_error(e: &Error) -> Self {
        match e {
            Error::NotConfigured(_) => Self::NotConfigured,
            Error::InvalidParams(_) => Self::InvalidParams,
            Error::Transport {
                kind: TransportKind::Timeout,
                ..
            } => Self::TransportTimeout,
            Error::Transport {
                kind: TransportKind::Cancelled,
                ..
            } => Self::Cancelled,
            Error::Transport { .. } => Self::TransportFailed,
            Error::Remote { .. } => Self::RemoteError,
            Error::Decode { .. } => Self::DecodeFailed,
        }
    }

    pub(crate) fn hint(self) -> &'static str {
        match self {
            Self::InvalidParams => {
                "Check the arguments: query is required; web_search must be auto, always, or never."
            }
            Self::NotConfigured => {
                "Set ANSWERPIPE_OPENAI_API_KEY (or OPENAI_API_KEY) in the server environment and restart it."
            }
            Self::TransportTimeout => {
                "The model did not answer in time. Retry with a lower reasoning_effort or a simpler query."
            }
            Self::TransportFailed => {
                "Could not reach the endpoint. Check network access and ANSWERPIPE_OPENAI_ENDPOINT."
            }
            Self::Cancelled => "The request was cancelled before a response arrived.",
            Self::RemoteError => {
                "The API rejected the request; see status and body. 401 means a bad key, 429 means rate limited."
            }
            Self::DecodeFailed => {
                "The endpoint returned something other than a JSON object; see body. Check ANSWERPIPE_OPENAI_ENDPOINT."
            }
            Self::NoAnswer => {
                "The response had no output_text. Retry, or raise reasoning_effort if the model ran out of budget."
            }
        }
    }

    /// Remote statuses refine this via [`Error::retryable`].
    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::TransportTimeout | Self::TransportFailed | Self::NoAnswer => true,
            Self::InvalidParams
            | Self::NotConfigured
            | Self::Cancelled
            | Self::RemoteError
            | Self::DecodeFailed => false,
        }
    }
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(super::SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
}

#[derive(Serialize)]
struct ErrorObject {
    code: &'static str,
    message: String,
    hint: &'static str,
    retryable: bool,
}

pub(crate) fn error_obj(code: ErrorCode, message: impl ToString) -> serde_json::Value {
    error_obj_with(code, message, code.retryable())
}

fn error_obj_with(code: ErrorCode, message: impl ToString, retryable: bool) -> serde_json::Value {
    let e = ErrorObject {
        code: code.as_str(),
        message: message.to_string(),
        hint: code.hint(),
        retryable,
    };
    match serde_json::to_value(&e) {
        Ok(v) => v,
        Err(_) => serde_json::json!({
            "code": e.code,
            "message": e.message,
            "hint": e.hint,
            "retryable": e.retryable,
        }),
    }
}

/// `error_info` object for a hard failure; remote statuses keep their own
/// retry classification.
pub(crate) fn error_obj_from(e: &Error) -> serde_json::Value {
    error_obj_with(ErrorCode::from_error(e), e, e.retryable())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_core_error_codes() {
        let cases = [
            Error::NotConfigured("k".into()),
            Error::InvalidParams("p".into()),
            Error::transport(TransportKind::Timeout, "t"),
            Error::transport(TransportKind::Connect, "c"),
            Error::transport(TransportKind::Cancelled, "x"),
            Error::Remote {
                status: 500,
                body: String::new(),
            },
            Error::Decode {
                message: "m".into(),
                body: String::new(),
            },
        ];
        for e in &cases {
            assert_eq!(ErrorCode::from_error(e).as_str(), e.code());
        }
    }

    #[test]
    fn remote_retryability_follows_status() {
        let rate_limited = Error::Remote {
            status: 429,
            body: String::new(),
        };
        let unauthorized = Error::Remote {
            status: 401,
            body: String::new(),
        };
        assert_eq!(error_obj_from(&rate_limited)["retryable"], true);
        assert_eq!(error_obj_from(&unauthorized)["retryable"], false);
        assert_eq!(error_obj_from(&unauthorized)["message"], "api error: status=401");
    }
}
