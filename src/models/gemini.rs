//! Gemini API data models
//!
//! This module defines the request and response structures for the Gemini
//! `generateContent` endpoint. Replies are read through optional lookups so
//! an unexpected shape degrades to "no text" instead of a parse failure.

use crate::core::constants::role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single part of a content turn
#[derive(Debug, Clone, Default, Serialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One conversational turn
#[derive(Debug, Clone, Default, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn holding a single text part
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(role::USER.to_string()),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

/// Optional sampling parameters
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}

/// `generateContent` request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Single-turn request carrying the prompt verbatim
    pub fn from_prompt(prompt: &str, generation_config: GenerationConfig) -> Self {
        Self {
            contents: vec![Content::user_text(prompt)],
            generation_config: (!generation_config.is_empty()).then_some(generation_config),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<u32>,
    #[serde(default)]
    pub candidates_token_count: Option<u32>,
    #[serde(default)]
    pub total_token_count: Option<u32>,
}

/// Parsed upstream reply
#[derive(Debug, Clone, Default)]
pub struct ExtractedReply {
    /// Generated text, when the reply had the expected shape
    pub text: Option<String>,
    pub usage: Option<UsageMetadata>,
    pub finish_reason: Option<String>,
    pub block_reason: Option<String>,
}

fn str_field(value: Option<&Value>, key: &str) -> Option<String> {
    value?.get(key)?.as_str().map(str::to_string)
}

/// Extract the generated text from a successful upstream body
///
/// Only `candidates[0].content.parts[0].text` decides whether text is
/// present. Usage and reasons are read independently and never affect it.
///
/// # Errors
///
/// Returns the JSON error only when the body is not JSON at all.
pub fn extract_reply(body: &[u8]) -> Result<ExtractedReply, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    let first_candidate = value.get("candidates").and_then(|candidates| candidates.get(0));

    let text = first_candidate
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.get(0))
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    Ok(ExtractedReply {
        text,
        usage: value
            .get("usageMetadata")
            .and_then(|usage| UsageMetadata::deserialize(usage).ok()),
        finish_reason: str_field(first_candidate, "finishReason"),
        block_reason: str_field(value.get("promptFeedback"), "blockReason"),
    })
}

/// Error envelope returned by the Gemini API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ErrorBody {
    fn detail(self) -> Option<String> {
        let message = self.message.filter(|message| !message.is_empty());
        match (message, self.status.filter(|status| !status.is_empty())) {
            (Some(message), _) => Some(message),
            (None, Some(status)) => Some(match self.code {
                Some(code) => format!("{} ({})", status, code),
                None => status,
            }),
            (None, None) => None,
        }
    }
}

/// Human-readable detail for a failed upstream call
///
/// Prefers `error.message`, then `error.status`, then the raw body text.
pub fn error_detail(body: &str) -> Option<String> {
    let from_envelope = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(ErrorBody::detail);

    from_envelope.or_else(|| {
        let trimmed = body.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wraps_prompt_as_user_turn() {
        let request = GenerateContentRequest::from_prompt("Hello there", GenerationConfig::default());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Hello there" }] }]
            })
        );
    }

    #[test]
    fn test_request_includes_generation_config() {
        let request = GenerateContentRequest::from_prompt(
            "hi",
            GenerationConfig {
                temperature: Some(0.5),
                max_output_tokens: Some(256),
            },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["generationConfig"]["temperature"], json!(0.5));
        assert_eq!(value["generationConfig"]["maxOutputTokens"], json!(256));
    }

    #[test]
    fn test_extract_text_from_first_candidate() {
        let body = json!({
            "candidates": [
                {
                    "content": { "role": "model", "parts": [{ "text": "first" }, { "text": "second" }] },
                    "finishReason": "STOP"
                },
                { "content": { "parts": [{ "text": "other" }] } }
            ],
            "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 5, "totalTokenCount": 8 }
        });
        let reply = extract_reply(body.to_string().as_bytes()).unwrap();
        assert_eq!(reply.text.as_deref(), Some("first"));
        assert_eq!(reply.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(reply.usage.unwrap().total_token_count, Some(8));
    }

    #[test]
    fn test_extract_missing_fields_yields_no_text() {
        for body in [
            json!({}),
            json!({ "candidates": [] }),
            json!({ "candidates": [{ "content": { "parts": [] } }] }),
            json!({ "candidates": [{ "content": { "parts": [{ "text": "" }] } }] }),
            json!({ "candidates": "not-a-list" }),
            json!([1, 2, 3]),
        ] {
            let reply = extract_reply(body.to_string().as_bytes()).unwrap();
            assert!(reply.text.is_none(), "expected no text for {}", body);
        }
    }

    #[test]
    fn test_extract_ignores_malformed_side_fields() {
        let body = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "hi" }] }, "finishReason": 7 },
                { "content": "not-an-object" }
            ],
            "usageMetadata": { "promptTokenCount": "three" },
            "promptFeedback": []
        });
        let reply = extract_reply(body.to_string().as_bytes()).unwrap();
        assert_eq!(reply.text.as_deref(), Some("hi"));
        assert!(reply.usage.is_none());
        assert!(reply.finish_reason.is_none());
        assert!(reply.block_reason.is_none());
    }

    #[test]
    fn test_extract_non_string_text_yields_no_text() {
        let body = json!({ "candidates": [{ "content": { "parts": [{ "text": 42 }] } }] });
        let reply = extract_reply(body.to_string().as_bytes()).unwrap();
        assert!(reply.text.is_none());
    }

    #[test]
    fn test_extract_reports_block_reason() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let reply = extract_reply(body.to_string().as_bytes()).unwrap();
        assert!(reply.text.is_none());
        assert_eq!(reply.block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_extract_rejects_non_json() {
        assert!(extract_reply(b"<html>gateway</html>").is_err());
    }

    #[test]
    fn test_error_detail_prefers_envelope_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_detail(body).as_deref(), Some("API key not valid"));
    }

    #[test]
    fn test_error_detail_uses_status_without_message() {
        let body = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_detail(body).as_deref(), Some("RESOURCE_EXHAUSTED (429)"));
        let body = r#"{"error":{"message":"","status":"UNAVAILABLE"}}"#;
        assert_eq!(error_detail(body).as_deref(), Some("UNAVAILABLE"));
    }

    #[test]
    fn test_error_detail_falls_back_to_body() {
        assert_eq!(error_detail(" bad gateway \n").as_deref(), Some("bad gateway"));
        assert_eq!(error_detail("{\"other\":1}").as_deref(), Some("{\"other\":1}"));
        assert_eq!(error_detail("   "), None);
    }
}
