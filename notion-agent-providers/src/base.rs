//! Provider-neutral chat types and the `LLMProvider` trait

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

pub type ProviderEventStream = Pin<Box<dyn Stream<Item = ProviderResult<StreamEvent>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A function call requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Always a JSON object
    pub arguments: Value,
}

/// Serializes in the chat-completions shape, with arguments as a JSON string.
impl Serialize for ToolCallRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Function<'a> {
            name: &'a str,
            arguments: String,
        }

        #[derive(Serialize)]
        struct Wire<'a> {
            id: &'a str,
            #[serde(rename = "type")]
            kind: &'static str,
            function: Function<'a>,
        }

        Wire {
            id: &self.id,
            kind: "function",
            function: Function {
                name: &self.name,
                arguments: self.arguments.to_string(),
            },
        }
        .serialize(serializer)
    }
}

/// Parse model-produced argument JSON.
///
/// Anything that is not an object is kept verbatim under `"raw"`.
pub(crate) fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            tracing::warn!("Tool call arguments are not a JSON object: {}", raw);
            serde_json::json!({ "raw": raw })
        }
    }
}

/// One entry of the conversation sent to the model
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Message {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Assistant turn, optionally carrying the tool calls it made
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        let mut msg = Self::new(ChatRole::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Output of one tool call, linked back by id
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(ChatRole::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg.name = Some(name.into());
        msg
    }
}

/// Everything needed for one completion call
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Function schemas; empty means no tools are offered
    pub tools: Vec<Value>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The model's reply: text, tool calls, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatResponse {
    /// A plain text answer
    pub fn answer(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental assistant text
    Delta(String),
    /// The assembled reply; always the last item
    Done(ChatResponse),
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> ProviderResult<ChatResponse>;

    /// Streaming variant. The default wraps `chat` as one delta plus `Done`.
    async fn chat_stream(&self, request: ChatRequest) -> ProviderResult<ProviderEventStream> {
        let response = self.chat(request).await?;
        let mut events = Vec::with_capacity(2);
        if let Some(text) = response.content.as_ref().filter(|t| !t.is_empty()) {
            events.push(Ok(StreamEvent::Delta(text.clone())));
        }
        events.push(Ok(StreamEvent::Done(response)));
        Ok(Box::pin(stream::iter(events)))
    }
}
