//! Transport-neutral chat request and response.
//!
//! `ChatResponse` is the structured result every entry point returns:
//! a status code, headers, and a JSON body rendered to a string. The HTTP
//! router and the serverless adapter only translate it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MISSING_MESSAGE: &str = "Message parameter is missing";
pub const MISSING_MESSAGE_OR_SESSION: &str = "Message or sessionId parameter is missing";
pub const QUOTA_EXCEEDED: &str = "I'm currently experiencing an issue due to insufficient quota. Please try again later or contact support if the issue persists.";
pub const PROVIDER_FAILURE: &str =
    "An unexpected error occurred while processing your request. Please try again later.";
pub const INTERNAL_ERROR: &str = "Internal Server Error";

/// One inbound question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            session_id: Some(session_id.into()),
        }
    }

    /// A request without a session identifier.
    pub fn sessionless(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            session_id: None,
        }
    }
}

/// Structured response: `{statusCode, headers, body}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON document rendered as a string
    pub body: String,
}

/// Headers attached to every response, errors included.
pub fn cors_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Access-Control-Allow-Headers".to_string(), "Content-Type".to_string()),
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ("Access-Control-Allow-Methods".to_string(), "OPTIONS,GET".to_string()),
    ])
}

impl ChatResponse {
    fn with_body(status_code: u16, body: serde_json::Value) -> Self {
        Self {
            status_code,
            headers: cors_headers(),
            body: body.to_string(),
        }
    }

    /// 200 with `{"botReply": ...}`.
    pub fn reply(text: &str) -> Self {
        Self::with_body(200, serde_json::json!({ "botReply": text }))
    }

    /// An error status with `{"error": ...}`.
    pub fn error(status_code: u16, message: &str) -> Self {
        Self::with_body(status_code, serde_json::json!({ "error": message }))
    }

    /// 200 with an empty object, for CORS preflight.
    pub fn preflight() -> Self {
        Self::with_body(200, serde_json::json!({}))
    }

    /// The body parsed back into JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }

    pub fn bot_reply(&self) -> Option<String> {
        self.body_field("botReply")
    }

    pub fn error_message(&self) -> Option<String> {
        self.body_field("error")
    }

    fn body_field(&self, field: &str) -> Option<String> {
        self.json().get(field)?.as_str().map(String::from)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
