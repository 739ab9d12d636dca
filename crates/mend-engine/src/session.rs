//! Recovery session orchestration: credential and input checks, provider
//! setup, attachment staging, then the four persona calls in order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, instrument};

use mend_core::errors::GatewayError;
use mend_core::ids::SessionId;
use mend_core::provider::{CompletionOptions, LlmProvider};
use mend_core::security::ApiKey;
use mend_llm::{OpenAiConfig, OpenAiProvider};
use mend_settings::MendSettings;

use crate::error::EngineError;
use crate::persona::{Persona, PersonaKind};
use crate::prompts;
use crate::registry::ToolRegistry;
use crate::runner::{PersonaRunner, DEFAULT_MAX_TOOL_ROUNDS};
use crate::staging::{image_mime, AttachmentStager, Upload};
use crate::tools::WebSearchTool;

/// One submission. Created per request, never persisted.
#[derive(Clone, Debug)]
pub struct SessionInput {
    pub id: SessionId,
    pub narrative: String,
    pub attachments: Vec<Upload>,
}

impl SessionInput {
    pub fn new(narrative: impl Into<String>, attachments: Vec<Upload>) -> Self {
        Self {
            id: SessionId::new(),
            narrative: narrative.into(),
            attachments,
        }
    }

    /// Blank narrative and no upload with an accepted image type.
    pub fn is_empty(&self) -> bool {
        self.narrative.trim().is_empty()
            && !self
                .attachments
                .iter()
                .any(|u| image_mime(&u.file_name).is_some())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PersonaResponse {
    pub persona: PersonaKind,
    pub name: &'static str,
    pub heading: &'static str,
    pub markdown: String,
}

#[derive(Clone, Debug)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub responses: Vec<PersonaResponse>,
    pub attachments_staged: usize,
}

/// Progress callbacks. Each response is delivered as soon as it exists.
pub trait SessionObserver: Send + Sync {
    fn persona_started(&self, _persona: &Persona) {}
    fn persona_completed(&self, _response: &PersonaResponse) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Builds the model provider for a session from its credential.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, api_key: ApiKey) -> Result<Arc<dyn LlmProvider>, GatewayError>;
}

pub struct OpenAiFactory {
    config: OpenAiConfig,
}

impl OpenAiFactory {
    pub fn new(config: OpenAiConfig) -> Self {
        Self { config }
    }
}

impl ProviderFactory for OpenAiFactory {
    fn create(&self, api_key: ApiKey) -> Result<Arc<dyn LlmProvider>, GatewayError> {
        Ok(Arc::new(OpenAiProvider::new(api_key, self.config.clone())?))
    }
}

/// Hands out one pre-built provider regardless of the key.
pub struct FixedProvider(pub Arc<dyn LlmProvider>);

impl ProviderFactory for FixedProvider {
    fn create(&self, _api_key: ApiKey) -> Result<Arc<dyn LlmProvider>, GatewayError> {
        Ok(Arc::clone(&self.0))
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub options: CompletionOptions,
    pub max_tool_rounds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            options: CompletionOptions::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

pub struct SessionOrchestrator {
    factory: Arc<dyn ProviderFactory>,
    stager: AttachmentStager,
    tools: Arc<ToolRegistry>,
    config: SessionConfig,
}

impl SessionOrchestrator {
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        stager: AttachmentStager,
        tools: Arc<ToolRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            factory,
            stager,
            tools,
            config,
        }
    }

    /// Wire the OpenAI provider, staging dir and web search from settings.
    pub fn from_settings(settings: &MendSettings) -> Self {
        let openai = OpenAiConfig {
            base_url: settings.api.base_url.clone(),
            model: settings.api.model.clone(),
            request_timeout: Duration::from_secs(settings.api.request_timeout_secs),
        };
        let mut tools = ToolRegistry::new();
        if settings.search.enabled {
            tools.register(Arc::new(WebSearchTool::from_settings(&settings.search)));
        }
        Self::new(
            Arc::new(OpenAiFactory::new(openai)),
            AttachmentStager::from_settings(&settings.staging),
            Arc::new(tools),
            SessionConfig {
                options: CompletionOptions {
                    max_tokens: settings.generation.max_tokens,
                    temperature: settings.generation.temperature,
                },
                max_tool_rounds: settings.search.max_tool_rounds,
            },
        )
    }

    /// Run the four personas in order against one input.
    ///
    /// Stops at the first failed call; responses already handed to the
    /// observer stay delivered.
    #[instrument(skip_all, fields(session_id = %input.id))]
    pub async fn run_session(
        &self,
        input: SessionInput,
        credential: Option<&str>,
        observer: &dyn SessionObserver,
    ) -> Result<SessionReport, EngineError> {
        let api_key = ApiKey::from_optional(credential).map_err(|e| {
            info!(reason = %e, "session rejected: credential");
            EngineError::Configuration(e)
        })?;

        if input.is_empty() {
            info!("session rejected: empty input");
            return Err(EngineError::EmptyInput);
        }

        let provider = self.factory.create(api_key).map_err(|e| {
            error!(error = %e, "provider initialization failed");
            EngineError::Initialization(e)
        })?;

        let attachments = self.stager.stage_all(&input.attachments).await;
        if attachments.is_empty() && input.narrative.trim().is_empty() {
            info!(uploads = input.attachments.len(), "session rejected: no attachment staged");
            return Err(EngineError::EmptyInput);
        }
        info!(
            narrative_chars = input.narrative.chars().count(),
            uploads = input.attachments.len(),
            staged = attachments.len(),
            model = provider.model(),
            "session started"
        );

        let runner = PersonaRunner::new(provider, Arc::clone(&self.tools))
            .with_options(self.config.options.clone())
            .with_max_tool_rounds(self.config.max_tool_rounds);

        let mut responses = Vec::with_capacity(Persona::all().len());
        for persona in Persona::all() {
            observer.persona_started(persona);
            let started = Instant::now();
            let prompt = prompts::build_prompt(persona.kind, &input.narrative);

            let markdown = runner
                .run(persona, prompt, &attachments)
                .await
                .map_err(|source| {
                    error!(
                        persona = %persona.kind,
                        kind = source.error_kind(),
                        error = %source,
                        "persona call failed; aborting session"
                    );
                    EngineError::PersonaFailed {
                        persona: persona.kind,
                        source,
                    }
                })?;

            info!(
                persona = %persona.kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                chars = markdown.len(),
                "persona completed"
            );
            let response = PersonaResponse {
                persona: persona.kind,
                name: persona.name,
                heading: persona.heading,
                markdown,
            };
            observer.persona_completed(&response);
            responses.push(response);
        }

        Ok(SessionReport {
            session_id: input.id,
            responses,
            attachments_staged: attachments.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mend_core::messages::Message;
    use mend_llm::{MockProvider, MockResponse};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        started: Mutex<Vec<PersonaKind>>,
        completed: Mutex<Vec<PersonaResponse>>,
    }

    impl SessionObserver for Recorder {
        fn persona_started(&self, persona: &Persona) {
            self.started.lock().push(persona.kind);
        }
        fn persona_completed(&self, response: &PersonaResponse) {
            self.completed.lock().push(response.clone());
        }
    }

    struct FailingFactory;

    impl ProviderFactory for FailingFactory {
        fn create(&self, _api_key: ApiKey) -> Result<Arc<dyn LlmProvider>, GatewayError> {
            Err(GatewayError::NetworkError("no tls backend".into()))
        }
    }

    struct CountingFactory {
        inner: FixedProvider,
        created: AtomicUsize,
    }

    impl ProviderFactory for CountingFactory {
        fn create(&self, api_key: ApiKey) -> Result<Arc<dyn LlmProvider>, GatewayError> {
            self.created.fetch_add(1, Ordering::Relaxed);
            self.inner.create(api_key)
        }
    }

    fn orchestrator(factory: Arc<dyn ProviderFactory>, dir: &std::path::Path) -> SessionOrchestrator {
        SessionOrchestrator::new(
            factory,
            AttachmentStager::new(dir, "heart_healer_"),
            Arc::new(ToolRegistry::new()),
            SessionConfig::default(),
        )
    }

    fn with_mock(mock: &Arc<MockProvider>, dir: &std::path::Path) -> SessionOrchestrator {
        orchestrator(Arc::new(FixedProvider(mock.clone())), dir)
    }

    fn user_prompt(message: &Message) -> String {
        match message {
            Message::User(u) => u.text_content(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::repeating("x", 4));
        let err = with_mock(&mock, dir.path())
            .run_session(SessionInput::new("", vec![]), Some("sk-test"), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput));
        assert!(err.is_warning());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn whitespace_only_narrative_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::repeating("x", 4));
        let err = with_mock(&mock, dir.path())
            .run_session(SessionInput::new("  \n\t", vec![]), Some("sk-test"), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn non_image_uploads_do_not_count_as_input() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::repeating("x", 4));
        let input = SessionInput::new("", vec![Upload::new("notes.txt", &b"hi"[..])]);
        assert!(input.is_empty());
        let err = with_mock(&mock, dir.path())
            .run_session(input, Some("sk-test"), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn unstaged_images_with_blank_narrative_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the staging directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let mock = Arc::new(MockProvider::repeating("x", 4));
        let recorder = Recorder::default();
        let input = SessionInput::new(" ", vec![Upload::new("chat.png", &b"png"[..])]);
        assert!(!input.is_empty());
        let err = with_mock(&mock, &blocker)
            .run_session(input, Some("sk-test"), &recorder)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput));
        assert_eq!(mock.call_count(), 0);
        assert!(recorder.started.lock().is_empty());
    }

    #[tokio::test]
    async fn four_calls_in_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::new(vec![
            MockResponse::text("support"),
            MockResponse::text("closure"),
            MockResponse::text("routine"),
            MockResponse::text("reality"),
        ]));
        let recorder = Recorder::default();
        let report = with_mock(&mock, dir.path())
            .run_session(SessionInput::new("I miss them", vec![]), Some("sk-test"), &recorder)
            .await
            .unwrap();

        assert_eq!(mock.call_count(), 4);
        let order: Vec<PersonaKind> = report.responses.iter().map(|r| r.persona).collect();
        assert_eq!(
            order,
            vec![
                PersonaKind::Support,
                PersonaKind::Closure,
                PersonaKind::Routine,
                PersonaKind::RealityCheck
            ]
        );
        assert_eq!(*recorder.started.lock(), order);
        let texts: Vec<String> = recorder
            .completed
            .lock()
            .iter()
            .map(|r| r.markdown.clone())
            .collect();
        assert_eq!(texts, vec!["support", "closure", "routine", "reality"]);

        for (ctx, persona) in mock.contexts().iter().zip(Persona::all()) {
            assert_eq!(ctx.instructions, persona.system_instructions());
        }
    }

    #[tokio::test]
    async fn missing_credential_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        for credential in [None, Some(""), Some("   ")] {
            let mock = Arc::new(MockProvider::repeating("x", 4));
            let err = with_mock(&mock, dir.path())
                .run_session(
                    SessionInput::new("We broke up", vec![Upload::new("a.png", &b"1"[..])]),
                    credential,
                    &NoopObserver,
                )
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Configuration(_)), "{credential:?}");
            assert_eq!(mock.call_count(), 0);
        }
        // Nothing staged for rejected sessions.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn credential_checked_before_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::repeating("x", 4));
        let err = with_mock(&mock, dir.path())
            .run_session(SessionInput::new("", vec![]), None, &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn second_call_failure_stops_session() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::new(vec![
            MockResponse::text("first"),
            MockResponse::Error(GatewayError::ServerError {
                status: 500,
                body: "boom".into(),
            }),
            MockResponse::text("never"),
            MockResponse::text("never"),
        ]));
        let recorder = Recorder::default();
        let err = with_mock(&mock, dir.path())
            .run_session(SessionInput::new("story", vec![]), Some("sk-test"), &recorder)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::PersonaFailed {
                persona: PersonaKind::Closure,
                ..
            }
        ));
        assert_eq!(mock.call_count(), 2);
        let completed = recorder.completed.lock();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].markdown, "first");
        assert_eq!(*recorder.started.lock(), vec![PersonaKind::Support, PersonaKind::Closure]);
    }

    #[tokio::test]
    async fn narrative_passed_verbatim_to_every_persona() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::repeating("ok", 4));
        with_mock(&mock, dir.path())
            .run_session(
                SessionInput::new("We broke up after 3 years", vec![]),
                Some("sk-test"),
                &NoopObserver,
            )
            .await
            .unwrap();

        let contexts = mock.contexts();
        assert_eq!(contexts.len(), 4);
        for (ctx, persona) in contexts.iter().zip(Persona::all()) {
            let prompt = user_prompt(&ctx.messages[0]);
            assert!(prompt.contains("We broke up after 3 years"));
            assert_eq!(prompt, prompts::build_prompt(persona.kind, "We broke up after 3 years"));
        }
    }

    #[tokio::test]
    async fn prompts_independent_of_earlier_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::new(vec![
            MockResponse::text("SECRET-FIRST-OUTPUT"),
            MockResponse::text("b"),
            MockResponse::text("c"),
            MockResponse::text("d"),
        ]));
        with_mock(&mock, dir.path())
            .run_session(SessionInput::new("story", vec![]), Some("sk-test"), &NoopObserver)
            .await
            .unwrap();
        for ctx in &mock.contexts()[1..] {
            assert_eq!(ctx.messages.len(), 1);
            assert!(!user_prompt(&ctx.messages[0]).contains("SECRET-FIRST-OUTPUT"));
        }
    }

    #[tokio::test]
    async fn image_only_session_runs_with_images() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::repeating("ok", 4));
        let report = with_mock(&mock, dir.path())
            .run_session(
                SessionInput::new("", vec![Upload::new("chat.png", &b"png"[..])]),
                Some("sk-test"),
                &NoopObserver,
            )
            .await
            .unwrap();

        assert_eq!(report.attachments_staged, 1);
        assert!(dir.path().join("heart_healer_chat.png").exists());
        for ctx in mock.contexts() {
            match &ctx.messages[0] {
                Message::User(u) => assert_eq!(u.image_count(), 1),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn restaging_across_sessions_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProvider::repeating("ok", 8));
        let orch = with_mock(&mock, dir.path());
        for content in [&b"one"[..], &b"two"[..]] {
            orch.run_session(
                SessionInput::new("", vec![Upload::new("chat.png", content)]),
                Some("sk-test"),
                &NoopObserver,
            )
            .await
            .unwrap();
        }
        assert_eq!(
            std::fs::read(dir.path().join("heart_healer_chat.png")).unwrap(),
            b"two"
        );
    }

    #[tokio::test]
    async fn initialization_failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator(Arc::new(FailingFactory), dir.path())
            .run_session(SessionInput::new("story", vec![]), Some("sk-test"), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Initialization(_)));
        assert!(!err.is_warning());
    }

    #[tokio::test]
    async fn provider_created_once_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let mock: Arc<dyn LlmProvider> = Arc::new(MockProvider::repeating("ok", 4));
        let factory = Arc::new(CountingFactory {
            inner: FixedProvider(mock),
            created: AtomicUsize::new(0),
        });
        orchestrator(factory.clone(), dir.path())
            .run_session(SessionInput::new("story", vec![]), Some("sk-test"), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(factory.created.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn from_settings_registers_search_when_enabled() {
        let mut settings = MendSettings::default();
        assert_eq!(
            SessionOrchestrator::from_settings(&settings).tools.names(),
            vec!["web_search"]
        );
        settings.search.enabled = false;
        assert!(SessionOrchestrator::from_settings(&settings).tools.is_empty());
    }
}
