//! Request orchestrator: one question in, one structured response out.
//!
//! Per request:
//!
//! 1. **Validate** `message` (and `sessionId` when sessions are required)
//! 2. **Load** the session state; an unknown id starts from the default
//! 3. **Classify** the message and apply the topic transition
//! 4. **Record** the turn in the history
//! 5. **Compose** the prompt
//! 6. **Complete** through the retrying provider
//! 7. **Persist** the session, also when the completion failed
//! 8. **Map** the outcome to a `ChatResponse`
//!
//! Failures are typed ([`ChatError`]) until the single mapping point in
//! [`ChatService::handle`]; provider and storage details are logged there
//! and never reach the response body.

use crate::classifier::{Classification, TopicClassifier};
use crate::composer::{PromptComposer, Selection, strategy_for};
use crate::history::{HistoryWindow, cap_history};
use crate::response::{self, ChatRequest, ChatResponse};
use crate::topic_state::{self, Transition};
use personabot_config::{AppConfig, PromptStrategyKind};
use personabot_core::error::{ProviderError, SessionError};
use personabot_core::provider::ProviderRequest;
use personabot_core::session::{SessionState, load_state, save_state};
use personabot_core::{PersonaPromptSet, Provider, SessionStore, TopicName};
use personabot_providers::{RetryPolicy, RetryProvider};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Why a request did not produce a reply.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Session storage failed: {0}")]
    Storage(#[from] SessionError),

    #[error("Completion failed: {0}")]
    Provider(#[from] ProviderError),
}

impl ChatError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Storage(_) | Self::Provider(_) => 500,
        }
    }

    /// The text shown to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Validation(message) => *message,
            Self::Provider(e) if e.is_quota() => response::QUOTA_EXCEEDED,
            Self::Provider(_) => response::PROVIDER_FAILURE,
            Self::Storage(_) => response::INTERNAL_ERROR,
        }
    }

    pub fn to_response(&self) -> ChatResponse {
        ChatResponse::error(self.status_code(), self.public_message())
    }
}

/// Knobs for the request pipeline.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Reject requests without a session identifier
    pub require_session: bool,
    /// Earlier turns shown to the model
    pub history_window: usize,
    /// Stored history is trimmed to this many turns on save
    pub max_stored_turns: Option<usize>,
    pub strategy: PromptStrategyKind,
    pub retry: RetryPolicy,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: None,
            require_session: true,
            history_window: HistoryWindow::DEFAULT_SIZE,
            max_stored_turns: None,
            strategy: PromptStrategyKind::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ChatOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            require_session: config.chat.require_session,
            history_window: config.chat.history_window,
            max_stored_turns: config.sessions.max_stored_turns,
            strategy: config.chat.strategy,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

/// A successful turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply: String,
    pub classification: Classification,
    pub transition: Transition,
    pub selection: Selection,
    /// Session state as persisted
    pub state: SessionState,
}

/// The persona chat pipeline.
///
/// Built once per process and shared by every request; holds no
/// per-request state.
pub struct ChatService {
    provider: Arc<dyn Provider>,
    store: Arc<dyn SessionStore>,
    persona: Arc<PersonaPromptSet>,
    classifier: TopicClassifier,
    composer: PromptComposer,
    window: HistoryWindow,
    options: ChatOptions,
}

impl ChatService {
    /// Create the service. `provider` is wrapped in a [`RetryProvider`].
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn SessionStore>,
        persona: Arc<PersonaPromptSet>,
        options: ChatOptions,
    ) -> Self {
        let provider: Arc<dyn Provider> =
            Arc::new(RetryProvider::new(provider, options.retry.clone()));
        let window = HistoryWindow::new(options.history_window);
        let classifier = TopicClassifier::new(&persona);
        let composer = PromptComposer::new(persona.clone(), strategy_for(options.strategy), window);

        info!(
            persona = %persona.name,
            provider = provider.name(),
            store = store.name(),
            strategy = composer.strategy_name(),
            "Chat service ready"
        );

        Self {
            provider,
            store,
            persona,
            classifier,
            composer,
            window,
            options,
        }
    }

    pub fn persona(&self) -> &PersonaPromptSet {
        &self.persona
    }

    pub fn classifier(&self) -> &TopicClassifier {
        &self.classifier
    }

    pub fn composer(&self) -> &PromptComposer {
        &self.composer
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Handle a request and map the outcome to a response.
    pub async fn handle(&self, request: ChatRequest) -> ChatResponse {
        match self.respond(&request).await {
            Ok(outcome) => ChatResponse::reply(&outcome.reply),
            Err(e) => {
                match &e {
                    ChatError::Validation(reason) => debug!(reason, "Rejected request"),
                    ChatError::Provider(inner) => {
                        error!(error = %inner, quota = inner.is_quota(), "Completion failed")
                    }
                    ChatError::Storage(inner) => error!(error = %inner, "Session storage failed"),
                }
                e.to_response()
            }
        }
    }

    /// Run the pipeline and return the typed outcome.
    pub async fn respond(&self, request: &ChatRequest) -> Result<ChatOutcome, ChatError> {
        let (message, session_id) = self.validate(request)?;

        let mut state = match session_id {
            Some(id) => load_state(self.store.as_ref(), id).await?,
            None => SessionState::default(),
        };

        let classification = self.classifier.classify(message, &state);
        let transition = topic_state::apply(&mut state, &classification);
        self.window.record(&mut state, message);

        let prompt = self.composer.compose(message, &classification, &state);
        debug!(
            session_id = session_id.unwrap_or("-"),
            selection = ?prompt.selection,
            "Prompt composed"
        );

        let completion = self
            .provider
            .complete(ProviderRequest {
                model: self.options.model.clone(),
                messages: prompt.messages,
                temperature: self.options.temperature,
                max_tokens: self.options.max_tokens,
            })
            .await;

        if let Some(max) = self.options.max_stored_turns {
            cap_history(&mut state, max);
        }

        if let Some(id) = session_id {
            if let Err(e) = save_state(self.store.as_ref(), id, &state).await {
                // The reply, or the completion error, matters more to the caller
                warn!(session_id = %id, error = %e, "Failed to persist session");
            }
        }

        let response = completion?;

        info!(
            session_id = session_id.unwrap_or("-"),
            topic = state.current_topic.as_ref().map(TopicName::as_str).unwrap_or("none"),
            model = %response.model,
            "Reply generated"
        );

        Ok(ChatOutcome {
            reply: response.message.content,
            classification,
            transition,
            selection: prompt.selection,
            state,
        })
    }

    /// Trimmed message and session id, or the validation failure.
    fn validate<'a>(
        &self,
        request: &'a ChatRequest,
    ) -> Result<(&'a str, Option<&'a str>), ChatError> {
        let message = non_blank(request.message.as_deref());
        let session_id = non_blank(request.session_id.as_deref());

        match (message, session_id) {
            (Some(m), Some(s)) => Ok((m, Some(s))),
            (Some(m), None) if !self.options.require_session => Ok((m, None)),
            _ if self.options.require_session => {
                Err(ChatError::Validation(response::MISSING_MESSAGE_OR_SESSION))
            }
            _ => Err(ChatError::Validation(response::MISSING_MESSAGE)),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use personabot_core::message::{Message, Role};
    use personabot_core::provider::ProviderResponse;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every request; fails with the scripted errors first.
    struct MockProvider {
        failures: Mutex<Vec<ProviderError>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl MockProvider {
        fn ok() -> Arc<Self> {
            Self::failing(vec![])
        }

        fn failing(failures: Vec<ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                failures: Mutex::new(failures),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_system_text(&self) -> String {
            let requests = self.requests.lock().unwrap();
            let last = requests.last().unwrap();
            assert_eq!(last.messages[0].role, Role::System);
            last.messages[0].content.clone()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let mut failures = self.failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
            Ok(ProviderResponse {
                message: Message::assistant("Mock reply"),
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    #[derive(Default)]
    struct MockStore {
        data: Mutex<HashMap<String, String>>,
        fail_get: bool,
        fail_put: bool,
    }

    impl MockStore {
        fn state(&self, key: &str) -> Option<SessionState> {
            let data = self.data.lock().unwrap();
            data.get(key)
                .map(|blob| SessionState::from_blob(key, blob).unwrap())
        }
    }

    #[async_trait]
    impl SessionStore for MockStore {
        fn name(&self) -> &str {
            "mock"
        }

        async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
            if self.fail_get {
                return Err(SessionError::Storage("table unavailable".into()));
            }
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, key: &str, blob: String) -> Result<(), SessionError> {
            if self.fail_put {
                return Err(SessionError::Storage("write throttled".into()));
            }
            self.data.lock().unwrap().insert(key.to_string(), blob);
            Ok(())
        }
    }

    fn service_with(
        provider: Arc<MockProvider>,
        store: Arc<MockStore>,
        options: ChatOptions,
    ) -> ChatService {
        let persona = Arc::new(personabot_config::load_persona(None).unwrap());
        ChatService::new(provider, store, persona, options)
    }

    fn service(provider: Arc<MockProvider>, store: Arc<MockStore>) -> ChatService {
        service_with(provider, store, ChatOptions::default())
    }

    fn transient() -> ProviderError {
        ProviderError::RateLimited {
            retry_after_secs: 1,
        }
    }

    #[tokio::test]
    async fn missing_session_id_is_rejected() {
        let provider = MockProvider::ok();
        let store = Arc::new(MockStore::default());
        let svc = service(provider.clone(), store.clone());

        let response = svc.handle(ChatRequest::sessionless("What is your GPA?")).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.body,
            r#"{"error":"Message or sessionId parameter is missing"}"#
        );
        assert_eq!(provider.calls(), 0);
        assert!(store.data.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let provider = MockProvider::ok();
        let svc = service(provider.clone(), Arc::new(MockStore::default()));

        let response = svc.handle(ChatRequest::new("   ", "s1")).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn sessionless_mode_skips_persistence() {
        let provider = MockProvider::ok();
        let store = Arc::new(MockStore::default());
        let options = ChatOptions {
            require_session: false,
            ..ChatOptions::default()
        };
        let svc = service_with(provider.clone(), store.clone(), options);

        let response = svc.handle(ChatRequest::sessionless("What skills do you have?")).await;
        assert_eq!(response.status_code, 200);
        assert!(store.data.lock().unwrap().is_empty());

        let response = svc.handle(ChatRequest::default()).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.error_message().as_deref(), Some("Message parameter is missing"));
    }

    #[tokio::test]
    async fn gpa_question_selects_academic_background() {
        let provider = MockProvider::ok();
        let store = Arc::new(MockStore::default());
        let svc = service(provider.clone(), store.clone());

        let response = svc.handle(ChatRequest::new("What is your GPA?", "s1")).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.bot_reply().as_deref(), Some("Mock reply"));
        assert!(provider.last_system_text().contains("Your academic background"));

        let state = store.state("s1").unwrap();
        assert_eq!(state.current_topic, Some("Academic Background".into()));
        assert_eq!(state.conversation_history.len(), 1);
    }

    #[tokio::test]
    async fn request_carries_model_settings() {
        let provider = MockProvider::ok();
        let svc = service(provider.clone(), Arc::new(MockStore::default()));
        svc.handle(ChatRequest::new("hello", "s1")).await;

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert!((requests[0].temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(requests[0].messages[1].content, "hello");
    }

    #[tokio::test]
    async fn unmatched_message_keeps_topic() {
        let provider = MockProvider::ok();
        let store = Arc::new(MockStore::default());
        let svc = service(provider.clone(), store.clone());

        svc.handle(ChatRequest::new("What are your hobbies?", "s1")).await;
        svc.handle(ChatRequest::new("Nice, anything else?", "s1")).await;

        let state = store.state("s1").unwrap();
        assert_eq!(state.current_topic, Some("Hobbies".into()));
        assert_eq!(state.previous_topic, None);
    }

    #[tokio::test]
    async fn repeated_message_does_not_toggle_topics() {
        let provider = MockProvider::ok();
        let store = Arc::new(MockStore::default());
        let svc = service(provider, store.clone());

        svc.handle(ChatRequest::new("Tell me about your skills", "s1")).await;
        svc.handle(ChatRequest::new("What is your degree?", "s1")).await;
        let before = store.state("s1").unwrap();
        svc.handle(ChatRequest::new("What is your degree?", "s1")).await;
        let after = store.state("s1").unwrap();

        assert_eq!(after.current_topic, before.current_topic);
        assert_eq!(after.previous_topic, Some("Skills".into()));
    }

    #[tokio::test]
    async fn history_fed_back_without_current_turn() {
        let provider = MockProvider::ok();
        let svc = service(provider.clone(), Arc::new(MockStore::default()));

        for message in ["first", "second", "third", "fourth", "fifth"] {
            svc.handle(ChatRequest::new(message, "s1")).await;
        }
        let system = provider.last_system_text();
        assert!(system.contains("User: second\nUser: third\nUser: fourth"));
        assert!(!system.contains("User: fifth"));
        assert!(!system.contains("User: first"));
    }

    #[tokio::test(start_paused = true)]
    async fn two_transient_failures_then_success() {
        let provider = MockProvider::failing(vec![transient(), transient()]);
        let svc = service(provider.clone(), Arc::new(MockStore::default()));

        let response = svc.handle(ChatRequest::new("What is your GPA?", "s1")).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_generic_error() {
        let provider = MockProvider::failing(vec![transient(), transient(), transient()]);
        let svc = service(provider.clone(), Arc::new(MockStore::default()));

        let response = svc.handle(ChatRequest::new("What is your GPA?", "s1")).await;
        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.error_message().as_deref(),
            Some(response::PROVIDER_FAILURE)
        );
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_on_final_attempt_gets_friendly_message() {
        let provider = MockProvider::failing(vec![
            transient(),
            transient(),
            ProviderError::QuotaExceeded("insufficient_quota".into()),
        ]);
        let svc = service(provider.clone(), Arc::new(MockStore::default()));

        let response = svc.handle(ChatRequest::new("What is your GPA?", "s1")).await;
        assert_eq!(response.status_code, 500);
        assert_eq!(response.error_message().as_deref(), Some(response::QUOTA_EXCEEDED));
        assert!(!response.body.contains("insufficient_quota"));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_is_not_retried() {
        let provider = MockProvider::failing(vec![ProviderError::AuthenticationFailed(
            "bad key".into(),
        )]);
        let svc = service(provider.clone(), Arc::new(MockStore::default()));

        let response = svc.handle(ChatRequest::new("hi", "s1")).await;
        assert_eq!(response.status_code, 500);
        assert!(!response.body.contains("bad key"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn state_persisted_even_when_completion_fails() {
        let provider = MockProvider::failing(vec![transient(), transient(), transient()]);
        let store = Arc::new(MockStore::default());
        let svc = service(provider, store.clone());

        svc.handle(ChatRequest::new("Tell me about your career", "s1")).await;

        let state = store.state("s1").unwrap();
        assert_eq!(state.current_topic, Some("Work Experience".into()));
        assert!(state.experience_asked);
        assert_eq!(state.conversation_history.len(), 1);
    }

    #[tokio::test]
    async fn load_failure_is_internal_error() {
        let provider = MockProvider::ok();
        let store = Arc::new(MockStore {
            fail_get: true,
            ..MockStore::default()
        });
        let svc = service(provider.clone(), store);

        let response = svc.handle(ChatRequest::new("hi", "s1")).await;
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, r#"{"error":"Internal Server Error"}"#);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn save_failure_still_returns_reply() {
        let store = Arc::new(MockStore {
            fail_put: true,
            ..MockStore::default()
        });
        let svc = service(MockProvider::ok(), store);

        let response = svc.handle(ChatRequest::new("hi", "s1")).await;
        assert_eq!(response.status_code, 200);
    }

    #[tokio::test]
    async fn stored_history_is_capped() {
        let store = Arc::new(MockStore::default());
        let options = ChatOptions {
            max_stored_turns: Some(3),
            ..ChatOptions::default()
        };
        let provider = MockProvider::ok();
        let svc = service_with(provider.clone(), store.clone(), options);

        for message in ["a", "b", "c", "d", "e"] {
            svc.handle(ChatRequest::new(message, "s1")).await;
        }
        assert_eq!(store.state("s1").unwrap().conversation_history.len(), 3);
        // the window still sees three earlier turns
        assert!(provider.last_system_text().contains("User: b\nUser: c\nUser: d"));
    }

    #[tokio::test]
    async fn error_responses_keep_cors_headers() {
        let svc = service(MockProvider::ok(), Arc::new(MockStore::default()));
        let response = svc.handle(ChatRequest::default()).await;
        assert_eq!(response.headers, response::cors_headers());
    }
}
