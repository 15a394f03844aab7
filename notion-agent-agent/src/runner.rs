//! Runner: drives one invocation of the model/tool loop as an event stream

use futures::stream::{self, Stream, StreamExt};
use notion_agent_core::config::AgentConfig;
use notion_agent_core::{Content, Event, Part, Role, SessionKey, SessionService};
use notion_agent_providers::{ChatRequest, ChatResponse, LLMProvider, Message, StreamEvent};
use notion_agent_tools::ToolRegistry;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;
use crate::error::AgentError;

/// Text of the final event when the tool loop runs out of iterations
pub const NO_RESPONSE_TEXT: &str = "I've completed processing but have no response to give.";

pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, AgentError>> + Send>>;

/// Something that turns a user turn into a stream of agent events
pub trait EventSource: Send + Sync {
    fn run(&self, user_id: &str, session_id: &str, content: Content) -> EventStream;
}

/// Per-invocation model settings
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub app_name: String,
    pub agent_name: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_iterations: usize,
    pub streaming: bool,
}

impl From<&AgentConfig> for RunnerConfig {
    fn from(agent: &AgentConfig) -> Self {
        Self {
            app_name: agent.app_name.clone(),
            agent_name: agent.name.clone(),
            model: agent.model.clone(),
            max_tokens: agent.max_tokens,
            temperature: agent.temperature,
            max_iterations: agent.max_tool_iterations as usize,
            streaming: agent.streaming,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

/// Model/tool loop bound to one provider, tool registry and session store
pub struct Runner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    sessions: Arc<dyn SessionService>,
    context: ContextBuilder,
    config: RunnerConfig,
    cancel: CancellationToken,
}

type Sender = mpsc::UnboundedSender<Result<Event, AgentError>>;

/// Forward an event; false once the consumer has gone away.
fn emit(tx: &Sender, event: Event) -> bool {
    tx.send(Ok(event)).is_ok()
}

impl Runner {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: ToolRegistry,
        sessions: Arc<dyn SessionService>,
        context: ContextBuilder,
        config: RunnerConfig,
        cancel: CancellationToken,
    ) -> Self {
        info!(
            "Runner ready: model {}, {} tools",
            config.model,
            tools.len()
        );
        Self {
            inner: Arc::new(RunnerInner {
                provider,
                tools,
                sessions,
                context,
                config,
                cancel,
            }),
        }
    }
}

impl EventSource for Runner {
    fn run(&self, user_id: &str, session_id: &str, content: Content) -> EventStream {
        let inner = Arc::clone(&self.inner);
        let key = SessionKey::new(inner.config.app_name.clone(), user_id, session_id);
        let invocation_id = format!("inv-{}", uuid::Uuid::new_v4());

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            if let Err(e) = inner.drive(&key, &invocation_id, content, &tx).await {
                debug!("Invocation {} failed: {}", invocation_id, e);
                let _ = tx.send(Err(e));
            }
        });

        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }
}

impl RunnerInner {
    async fn drive(
        &self,
        key: &SessionKey,
        invocation_id: &str,
        content: Content,
        tx: &Sender,
    ) -> Result<(), AgentError> {
        let author = self.config.agent_name.as_str();
        self.sessions
            .append_event(key, Event::new(invocation_id, "user", Some(content)))
            .await?;

        let tools = self.tools.get_definitions();

        for iteration in 1..=self.config.max_iterations {
            debug!(
                "Agent iteration {}/{} for {}",
                iteration, self.config.max_iterations, key
            );
            let session = self.sessions.get(key).await?;
            let messages = self.context.build_messages(&session.events);

            let Some(response) = self
                .call_model(messages, &tools, invocation_id, tx)
                .await?
            else {
                return Ok(());
            };

            if !response.has_tool_calls() {
                let text = response.content.unwrap_or_default();
                let event =
                    Event::new(invocation_id, author, Some(Content::model_text(text))).complete();
                self.sessions.append_event(key, event.clone()).await?;
                emit(tx, event);
                return Ok(());
            }

            info!("LLM requested {} tool calls", response.tool_calls.len());
            let mut call_parts = Vec::new();
            if let Some(text) = response.content.filter(|t| !t.trim().is_empty()) {
                call_parts.push(Part::text(text));
            }
            call_parts.extend(response.tool_calls.iter().map(|call| Part::FunctionCall {
                id: call.id.clone(),
                name: call.name.clone(),
                args: call.arguments.clone(),
            }));
            let call_event = Event::new(
                invocation_id,
                author,
                Some(Content::new(Role::Model, call_parts)),
            );
            self.sessions.append_event(key, call_event.clone()).await?;
            if !emit(tx, call_event) {
                return Ok(());
            }

            let mut response_parts = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                info!("Tool call: {}", call.name);
                let output = tokio::select! {
                    _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                    output = self.tools.execute(&call.name, call.arguments.clone()) => output,
                };
                if output.starts_with("Error") {
                    warn!("Tool {} returned: {}", call.name, output);
                }
                response_parts.push(Part::FunctionResponse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    response: output,
                });
            }
            let tool_event = Event::new(
                invocation_id,
                author,
                Some(Content::new(Role::Tool, response_parts)),
            );
            self.sessions.append_event(key, tool_event.clone()).await?;
            if !emit(tx, tool_event) {
                return Ok(());
            }
        }

        warn!(
            "Reached {} tool iterations without a final answer",
            self.config.max_iterations
        );
        let event = Event::new(
            invocation_id,
            author,
            Some(Content::model_text(NO_RESPONSE_TEXT)),
        )
        .complete();
        self.sessions.append_event(key, event.clone()).await?;
        emit(tx, event);
        Ok(())
    }

    /// Call the provider, racing the cancellation token.
    ///
    /// Returns `None` when the consumer disappeared mid-stream.
    async fn call_model(
        &self,
        messages: Vec<Message>,
        tools: &[serde_json::Value],
        invocation_id: &str,
        tx: &Sender,
    ) -> Result<Option<ChatResponse>, AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let cfg = &self.config;
        let request = ChatRequest {
            model: cfg.model.clone(),
            messages,
            tools: tools.to_vec(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        };

        if !cfg.streaming {
            let response = tokio::select! {
                _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                response = self.provider.chat(request) => response?,
            };
            return Ok(Some(response));
        }

        let mut stream = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
            stream = self.provider.chat_stream(request) => stream?,
        };

        let mut streamed = String::new();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                next = stream.next() => next,
            };
            match next {
                None => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(StreamEvent::Delta(delta))) => {
                    streamed.push_str(&delta);
                    let event = Event::new(
                        invocation_id,
                        cfg.agent_name.as_str(),
                        Some(Content::model_text(delta)),
                    )
                    .partial();
                    if !emit(tx, event) {
                        return Ok(None);
                    }
                }
                Some(Ok(StreamEvent::Done(response))) => return Ok(Some(response)),
            }
        }
        Ok(Some(ChatResponse::answer(streamed)))
    }
}
