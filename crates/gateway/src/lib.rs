//! HTTP entry points for PersonaBot.
//!
//! Routes:
//! - `GET <route>?message=..&sessionId=..`: ask the persona (default route `/chatbot`)
//! - `OPTIONS <route>`: CORS preflight
//! - `GET /health`: liveness
//!
//! Every chat response, success or error, carries the same CORS headers.
//! [`lambda`] adapts the same service to API-gateway proxy events.
//!
//! Built on Axum.

pub mod lambda;

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use personabot_agent::response::{MISSING_MESSAGE, MISSING_MESSAGE_OR_SESSION};
use personabot_agent::{ChatOptions, ChatRequest, ChatResponse, ChatService};
use personabot_config::AppConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub service: Arc<ChatService>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router, serving chat on `route`.
pub fn build_router(state: SharedState, route: &str) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(route, get(chat_handler).options(preflight_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire provider, persona, and session store into a chat service.
pub async fn build_service(config: &AppConfig) -> Result<ChatService, Box<dyn std::error::Error>> {
    let router = personabot_providers::build_from_config(config)?;
    let provider = router
        .default()
        .ok_or("No default provider configured, set an API key")?;
    let persona = personabot_config::load_persona(config.persona_path.as_deref())?;
    let store = personabot_sessions::open(&config.sessions).await?;

    Ok(ChatService::new(
        provider,
        store,
        Arc::new(persona),
        ChatOptions::from_config(config),
    ))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let service = Arc::new(build_service(&config).await?);
    let app = build_router(Arc::new(GatewayState { service }), &config.gateway.route);

    info!(addr = %addr, route = %config.gateway.route, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convert a transport-neutral response into an HTTP response.
pub fn into_http(response: ChatResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid response header"),
        }
    }

    (status, headers, response.body).into_response()
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat_handler(
    State(state): State<SharedState>,
    query: Result<Query<ChatRequest>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(request)) => into_http(state.service.handle(request).await),
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable query string");
            let message = if state.service.options().require_session {
                MISSING_MESSAGE_OR_SESSION
            } else {
                MISSING_MESSAGE
            };
            into_http(ChatResponse::error(400, message))
        }
    }
}

async fn preflight_handler() -> Response {
    into_http(ChatResponse::preflight())
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use personabot_agent::{ChatOptions, ChatService};
    use personabot_core::error::ProviderError;
    use personabot_core::message::Message;
    use personabot_core::provider::{ProviderRequest, ProviderResponse};
    use personabot_core::{Provider, SessionStore};
    use personabot_sessions::InMemorySessionStore;
    use std::sync::{Arc, Mutex};

    /// Echoes the user message back as the reply.
    pub struct EchoProvider {
        pub fail_with: Mutex<Option<ProviderError>>,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            if let Some(e) = self.fail_with.lock().unwrap().take() {
                return Err(e);
            }
            Ok(ProviderResponse {
                message: Message::assistant(format!("echo: {}", request.messages[1].content)),
                usage: None,
                model: "echo-model".into(),
            })
        }
    }

    pub fn service(
        fail_with: Option<ProviderError>,
    ) -> (Arc<ChatService>, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let provider = Arc::new(EchoProvider {
            fail_with: Mutex::new(fail_with),
        });
        let persona = Arc::new(personabot_config::load_persona(None).unwrap());
        let dyn_store: Arc<dyn SessionStore> = store.clone();
        let service = ChatService::new(provider, dyn_store, persona, ChatOptions::default());
        (Arc::new(service), store)
    }
}
