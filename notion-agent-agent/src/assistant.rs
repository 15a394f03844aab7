//! Task assistant: session-bound question answering on top of an [`EventSource`]

use async_trait::async_trait;
use futures::StreamExt;
use notion_agent_core::config::Config;
use notion_agent_core::{Content, Event, InMemorySessionService, SessionKey, SessionService};
use notion_agent_providers::OpenAICompatClient;
use notion_agent_tools::{McpToolset, ReadOnlyFilter, ToolFilter, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::ContextBuilder;
use crate::error::AgentError;
use crate::runner::{EventSource, Runner, RunnerConfig};

/// Answers one question within a conversation session
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn ask(&self, session_id: &str, text: &str) -> Result<String, AgentError>;
}

/// Read-only Notion TODO assistant
pub struct TaskAssistant {
    sessions: Arc<dyn SessionService>,
    runner: Arc<dyn EventSource>,
    app_name: String,
    user_id: String,
    verbose: bool,
}

impl TaskAssistant {
    pub fn new(
        sessions: Arc<dyn SessionService>,
        runner: Arc<dyn EventSource>,
        app_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            runner,
            app_name: app_name.into(),
            user_id: user_id.into(),
            verbose: false,
        }
    }

    /// Print one diagnostic line per event to stderr
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Wire the Gemini provider, the filtered Notion toolset and an
    /// in-memory session store.
    pub async fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self, AgentError> {
        let api_key = config.provider.api_key.trim();
        if api_key.is_empty() {
            return Err(AgentError::Config("GOOGLE_API_KEY is not set".to_string()));
        }
        let token = config.notion.token.trim();
        if token.is_empty() {
            return Err(AgentError::Config(
                "notion token is required; pass it via --notion-token".to_string(),
            ));
        }

        let provider = OpenAICompatClient::new(
            config.provider.api_base.as_str(),
            Some(api_key.to_string()),
            config.provider.extra_headers.clone(),
        )?;

        let filter: Arc<dyn ToolFilter> = Arc::new(ReadOnlyFilter);
        let toolset = McpToolset::connect(
            &config.notion.url,
            token,
            Duration::from_secs(config.notion.timeout_secs),
            filter.as_ref(),
        )
        .await?;
        let mut tools = ToolRegistry::with_filter(filter);
        for tool in toolset.into_tools() {
            tools.register(tool);
        }
        info!("Connected to {} with tools: {:?}", config.notion.url, tools.tool_names());

        let sessions: Arc<dyn SessionService> = Arc::new(InMemorySessionService::new());
        let runner = Runner::new(
            Arc::new(provider),
            tools,
            Arc::clone(&sessions),
            ContextBuilder::new(config.agent.instruction.clone()),
            RunnerConfig::from(&config.agent),
            cancel,
        );

        Ok(Self::new(
            sessions,
            Arc::new(runner),
            config.agent.app_name.as_str(),
            config.agent.user_id.as_str(),
        ))
    }

    fn session_key(&self, session_id: &str) -> SessionKey {
        SessionKey::new(self.app_name.as_str(), self.user_id.as_str(), session_id)
    }

    /// Make sure the session exists, creating it only when the store reports
    /// it missing. Other lookup failures propagate unchanged.
    pub async fn ensure(&self, session_id: &str) -> Result<(), AgentError> {
        let key = self.session_key(session_id);
        match self.sessions.get(&key).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("Creating session {}", key);
                self.sessions.create(&key).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Assistant for TaskAssistant {
    async fn ask(&self, session_id: &str, text: &str) -> Result<String, AgentError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(String::new());
        }

        self.ensure(session_id).await?;

        let mut events = self
            .runner
            .run(&self.user_id, session_id, Content::user_text(text));

        let mut final_content = None;
        while let Some(item) = events.next().await {
            let event = item?;
            if self.verbose {
                if let Some(line) = format_event_line(&event) {
                    eprintln!("{}", line);
                }
            }
            if event.is_final_response() {
                final_content = event.content;
                break;
            }
        }

        Ok(final_content
            .map(|content| content.text().trim().to_string())
            .unwrap_or_default())
    }
}

/// Diagnostic line for an event; `None` for events without content
pub fn format_event_line(event: &Event) -> Option<String> {
    let content = event.content.as_ref()?;
    Some(format!(
        "[event] author={} role={} partial={} final={}",
        event.author,
        content.role,
        event.partial,
        event.is_final_response()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::EventStream;
    use futures::stream;
    use notion_agent_core::{Error as CoreError, Part, Role, Session};
    use notion_agent_providers::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Session store wrapper that counts calls
    #[derive(Default)]
    struct CountingSessions {
        inner: InMemorySessionService,
        gets: AtomicUsize,
        creates: AtomicUsize,
        fail_get: bool,
    }

    #[async_trait]
    impl SessionService for CountingSessions {
        async fn get(&self, key: &SessionKey) -> notion_agent_core::Result<Session> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_get {
                return Err(CoreError::Internal("store unavailable".to_string()));
            }
            self.inner.get(key).await
        }

        async fn create(&self, key: &SessionKey) -> notion_agent_core::Result<Session> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create(key).await
        }

        async fn append_event(
            &self,
            key: &SessionKey,
            event: Event,
        ) -> notion_agent_core::Result<()> {
            self.inner.append_event(key, event).await
        }
    }

    /// Event source replaying a fixed script and counting consumed items
    struct ScriptedRunner {
        script: Mutex<Option<Vec<Result<Event, AgentError>>>>,
        runs: AtomicUsize,
        consumed: Arc<AtomicUsize>,
        last_call: Mutex<Option<(String, String, Content)>>,
    }

    impl ScriptedRunner {
        fn new(script: Vec<Result<Event, AgentError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(Some(script)),
                runs: AtomicUsize::new(0),
                consumed: Arc::new(AtomicUsize::new(0)),
                last_call: Mutex::new(None),
            })
        }
    }

    impl EventSource for ScriptedRunner {
        fn run(&self, user_id: &str, session_id: &str, content: Content) -> EventStream {
            self.runs.fetch_add(1, Ordering::SeqCst);
            *self.last_call.lock().unwrap() =
                Some((user_id.to_string(), session_id.to_string(), content));
            let script = self.script.lock().unwrap().take().unwrap_or_default();
            let consumed = Arc::clone(&self.consumed);
            Box::pin(stream::iter(script).inspect(move |_| {
                consumed.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    fn model_event(text: &str) -> Event {
        Event::new("inv-1", "notion_todo_agent", Some(Content::model_text(text)))
    }

    fn assistant(
        sessions: Arc<CountingSessions>,
        runner: Arc<ScriptedRunner>,
    ) -> TaskAssistant {
        TaskAssistant::new(sessions, runner, "notion-todo-agent", "local-user")
    }

    #[tokio::test]
    async fn test_blank_input_touches_nothing() {
        let sessions = Arc::new(CountingSessions::default());
        let runner = ScriptedRunner::new(vec![Ok(model_event("unused"))]);
        let assistant = assistant(sessions.clone(), runner.clone());

        assert_eq!(assistant.ask("default", "").await.unwrap(), "");
        assert_eq!(assistant.ask("default", "   ").await.unwrap(), "");
        assert_eq!(sessions.gets.load(Ordering::SeqCst), 0);
        assert_eq!(sessions.creates.load(Ordering::SeqCst), 0);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_returns_first_final_response_and_stops() {
        let sessions = Arc::new(CountingSessions::default());
        let runner = ScriptedRunner::new(vec![
            Ok(model_event("thinking").partial()),
            Ok(model_event("Here are your tasks: A, B")),
            Ok(model_event("never read")),
        ]);
        let assistant = assistant(sessions, runner.clone());

        let answer = assistant
            .ask("default", "  what are my tasks for today?  ")
            .await
            .unwrap();
        assert_eq!(answer, "Here are your tasks: A, B");
        assert_eq!(runner.consumed.load(Ordering::SeqCst), 2);

        let (user_id, session_id, content) = runner.last_call.lock().unwrap().take().unwrap();
        assert_eq!(user_id, "local-user");
        assert_eq!(session_id, "default");
        assert_eq!(content.role, Role::User);
        assert_eq!(content.text(), "what are my tasks for today?");
    }

    #[tokio::test]
    async fn test_tool_events_are_not_final() {
        let sessions = Arc::new(CountingSessions::default());
        let call = Content::new(
            Role::Model,
            vec![Part::FunctionCall {
                id: "call_1".to_string(),
                name: "notion-search".to_string(),
                args: serde_json::json!({}),
            }],
        );
        let final_content = Content::new(
            Role::Model,
            vec![
                Part::text(" Task A"),
                Part::FunctionResponse {
                    id: "x".to_string(),
                    name: "ignored".to_string(),
                    response: "ignored".to_string(),
                },
            ],
        );
        let runner = ScriptedRunner::new(vec![
            Ok(Event::new("inv-1", "notion_todo_agent", Some(call))),
            Ok(model_event(" Task A, ").partial()),
            Ok(Event::new(
                "inv-1",
                "notion_todo_agent",
                Some(Content::new(
                    Role::Model,
                    vec![Part::text(" Task A, "), Part::text("Task B ")],
                )),
            )),
            Ok(Event::new("inv-1", "notion_todo_agent", Some(final_content))),
        ]);
        let assistant = assistant(sessions, runner.clone());

        let answer = assistant.ask("default", "tasks?").await.unwrap();
        assert_eq!(answer, "Task A, Task B");
        assert_eq!(runner.consumed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stream_without_final_event_yields_empty_answer() {
        let sessions = Arc::new(CountingSessions::default());
        let runner = ScriptedRunner::new(vec![Ok(model_event("partial").partial())]);
        let assistant = assistant(sessions, runner);
        assert_eq!(assistant.ask("default", "hello").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_first_event_error_is_returned() {
        let sessions = Arc::new(CountingSessions::default());
        let runner = ScriptedRunner::new(vec![
            Err(AgentError::Provider(ProviderError::Api {
                status: 429,
                body: "quota".to_string(),
            })),
            Ok(model_event("too late")),
        ]);
        let assistant = assistant(sessions, runner.clone());

        let err = assistant.ask("default", "tasks?").await.unwrap_err();
        assert!(err.to_string().contains("quota"));
        assert_eq!(runner.consumed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ensure_creates_once() {
        let sessions = Arc::new(CountingSessions::default());
        let assistant = assistant(sessions.clone(), ScriptedRunner::new(Vec::new()));

        assistant.ensure("default").await.unwrap();
        assistant.ensure("default").await.unwrap();

        assert_eq!(sessions.creates.load(Ordering::SeqCst), 1);
        assert_eq!(sessions.gets.load(Ordering::SeqCst), 2);
        assert_eq!(sessions.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_propagates_store_failure() {
        let sessions = Arc::new(CountingSessions {
            fail_get: true,
            ..CountingSessions::default()
        });
        let runner = ScriptedRunner::new(vec![Ok(model_event("unused"))]);
        let assistant = assistant(sessions.clone(), runner.clone());

        let err = assistant.ask("default", "tasks?").await.unwrap_err();
        assert!(matches!(err, AgentError::Core(CoreError::Internal(_))));
        assert_eq!(sessions.creates.load(Ordering::SeqCst), 0);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_format_event_line() {
        let line = format_event_line(&model_event("hi").partial()).unwrap();
        assert_eq!(
            line,
            "[event] author=notion_todo_agent role=model partial=true final=false"
        );
        let done = format_event_line(&model_event("hi")).unwrap();
        assert!(done.ends_with("partial=false final=true"));
        assert!(format_event_line(&Event::new("inv-1", "user", None)).is_none());
    }

    #[tokio::test]
    async fn test_from_config_requires_credentials() {
        let mut config = Config::default();
        config.notion.token = "secret_abc".to_string();
        let err = TaskAssistant::from_config(&config, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "GOOGLE_API_KEY is not set");

        config.provider.api_key = "key".to_string();
        config.notion.token = " ".to_string();
        let err = TaskAssistant::from_config(&config, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "notion token is required; pass it via --notion-token"
        );
    }
}
