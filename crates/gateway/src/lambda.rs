//! API-gateway proxy event adapter.
//!
//! Translates a proxy event (`httpMethod`, `queryStringParameters`) into a
//! [`ChatRequest`], and the service's [`ChatResponse`] back into the
//! `{statusCode, headers, body}` shape the gateway expects. Both the REST
//! (v1) and HTTP (v2, `requestContext.http.method`) payload formats work.

use personabot_agent::{ChatRequest, ChatResponse, ChatService};
use serde_json::Value;
use tracing::debug;

/// Handle one proxy event.
pub async fn handle_event(service: &ChatService, event: &Value) -> ChatResponse {
    let method = http_method(event);
    debug!(method = method.unwrap_or("-"), "Proxy event received");

    if method.is_some_and(|m| m.eq_ignore_ascii_case("OPTIONS")) {
        return ChatResponse::preflight();
    }

    service.handle(request_from_event(event)).await
}

/// Extract the chat parameters; a null or absent parameter map is empty.
pub fn request_from_event(event: &Value) -> ChatRequest {
    let param = |name: &str| {
        event
            .get("queryStringParameters")
            .and_then(|params| params.get(name))
            .and_then(Value::as_str)
            .map(String::from)
    };

    ChatRequest {
        message: param("message"),
        session_id: param("sessionId"),
    }
}

fn http_method(event: &Value) -> Option<&str> {
    event
        .get("httpMethod")
        .or_else(|| event.pointer("/requestContext/http/method"))
        .and_then(Value::as_str)
}
