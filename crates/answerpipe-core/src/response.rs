//! Response envelope and answer extraction.
//!
//! Parsing is lenient below the top level: a field with the wrong type, a
//! `null`, or a non-object output item degrades to "not included" instead of
//! failing the whole decode. Only a body that is not a JSON object is a
//! [`Error::Decode`].

use crate::{Error, Result};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;

/// Output item kind that can contribute to the answer.
pub const MESSAGE_ITEM: &str = "message";
/// Content segment kind that can contribute to the answer.
pub const OUTPUT_TEXT_SEGMENT: &str = "output_text";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiResponse {
    /// Continuation token for a later `previous_response_id`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Model the remote actually used.
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: String,
    #[serde(default, deserialize_with = "lenient")]
    pub reasoning: ReasoningEcho,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReasoningEcho {
    #[serde(default, deserialize_with = "lenient_string")]
    pub effort: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub content: Vec<ContentSegment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContentSegment {
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
}

impl ApiResponse {
    /// Parse a raw response body.
    pub fn from_body(body: &str) -> Result<Self> {
        let v: serde_json::Value = serde_json::from_str(body).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: body.to_string(),
        })?;
        if !v.is_object() {
            return Err(Error::Decode {
                message: "expected a JSON object at the top level".to_string(),
                body: body.to_string(),
            });
        }
        serde_json::from_value(v).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: body.to_string(),
        })
    }

    /// Effort the remote reports it used.
    pub fn effort_echo(&self) -> &str {
        &self.reasoning.effort
    }

    pub fn answer(&self) -> String {
        extract_answer(Some(self))
    }
}

/// Concatenate every non-empty `output_text` segment of every `message` item,
/// in envelope order, joined by a single space.
///
/// Never fails; `None` and envelopes without a usable segment yield `""`.
pub fn extract_answer(resp: Option<&ApiResponse>) -> String {
    let Some(resp) = resp else {
        return String::new();
    };
    resp.output
        .iter()
        .filter(|item| item.kind == MESSAGE_ITEM)
        .flat_map(|item| item.content.iter())
        .filter(|seg| seg.kind == OUTPUT_TEXT_SEGMENT && !seg.text.is_empty())
        .map(|seg| seg.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn lenient_string<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => s,
        _ => String::new(),
    })
}

fn lenient<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let v = serde_json::Value::deserialize(d)?;
    Ok(serde_json::from_value(v).unwrap_or_default())
}

fn lenient_vec<'de, D, T>(d: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Array(xs) => xs
            .into_iter()
            .filter(|x| x.is_object())
            .filter_map(|x| serde_json::from_value(x).ok())
            .collect(),
        _ => Vec::new(),
    })
}
