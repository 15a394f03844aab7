//! OpenAI-compatible chat completions client
//!
//! Gemini exposes the same surface under
//! `https://generativelanguage.googleapis.com/v1beta/openai`, which is the
//! default endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::base::{
    parse_arguments, ChatRequest, ChatResponse, LLMProvider, Message, ProviderError,
    ProviderEventStream, ProviderResult, StreamEvent, ToolCallRequest,
};

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

impl WireRequest {
    fn new(request: ChatRequest, stream: bool) -> Self {
        let tool_choice = (!request.tools.is_empty()).then_some("auto");
        Self {
            model: request.model,
            messages: request.messages,
            tools: request.tools,
            tool_choice,
            stream,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireDeltaChoice>,
}

#[derive(Debug, Deserialize)]
struct WireDeltaChoice {
    #[serde(default)]
    delta: WireDelta,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolDelta>,
}

#[derive(Debug, Deserialize)]
struct WireToolDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Rebuilds a reply from a chat-completions SSE body.
///
/// Bytes are buffered until a full line is available, so characters split
/// across network chunks decode intact.
#[derive(Debug, Default)]
struct StreamAssembler {
    pending: Vec<u8>,
    data: Vec<String>,
    text: String,
    calls: Vec<PendingCall>,
    done: bool,
}

impl StreamAssembler {
    /// Feed raw body bytes; returns the text deltas of completed events.
    fn push(&mut self, bytes: &[u8]) -> ProviderResult<Vec<String>> {
        self.pending.extend_from_slice(bytes);
        let mut deltas = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if let Some(delta) = self.dispatch()? {
                    deltas.push(delta);
                }
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }
        Ok(deltas)
    }

    /// Flush an event left open by a body that did not end in a blank line.
    fn flush(&mut self) -> ProviderResult<Vec<String>> {
        self.push(b"\n\n")
    }

    fn dispatch(&mut self) -> ProviderResult<Option<String>> {
        if self.data.is_empty() || self.done {
            self.data.clear();
            return Ok(None);
        }
        let payload = self.data.join("\n");
        self.data.clear();
        if payload.trim() == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: WireChunk = serde_json::from_str(&payload)?;
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(None);
        };
        for call in choice.delta.tool_calls {
            if self.calls.len() <= call.index {
                self.calls.resize_with(call.index + 1, PendingCall::default);
            }
            let entry = &mut self.calls[call.index];
            if call.id.is_some() {
                entry.id = call.id;
            }
            let function = call.function.unwrap_or_default();
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }

        let delta = choice.delta.content.filter(|c| !c.is_empty());
        if let Some(text) = &delta {
            self.text.push_str(text);
        }
        Ok(delta)
    }

    fn finish(self) -> ChatResponse {
        let tool_calls = self
            .calls
            .into_iter()
            .enumerate()
            .map(|(i, call)| ToolCallRequest {
                id: call.id.unwrap_or_else(|| format!("stream_call_{}", i)),
                arguments: parse_arguments(&call.arguments),
                name: call.name,
            })
            .collect();
        ChatResponse {
            content: (!self.text.is_empty()).then_some(self.text),
            tool_calls,
        }
    }
}

/// OpenAI-compatible provider client
pub struct OpenAICompatClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    extra_headers: HashMap<String, String>,
}

impl OpenAICompatClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        extra_headers: HashMap<String, String>,
    ) -> ProviderResult<Self> {
        let api_base = api_base.into().trim().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            return Err(ProviderError::Config("api_base must not be empty".to_string()));
        }

        Ok(Self {
            client: Client::builder().build()?,
            api_base,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            extra_headers,
        })
    }

    async fn send(&self, body: &WireRequest) -> ProviderResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        debug!("POST {} (model {}, stream {})", url, body.model, body.stream);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        for (name, value) in &self.extra_headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatClient {
    async fn chat(&self, request: ChatRequest) -> ProviderResult<ChatResponse> {
        let response = self.send(&WireRequest::new(request, false)).await?;
        let wire: WireResponse = response.json().await?;
        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(|tc| ToolCallRequest {
                    id: tc.id,
                    arguments: parse_arguments(&tc.function.arguments),
                    name: tc.function.name,
                })
                .collect(),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> ProviderResult<ProviderEventStream> {
        let mut response = self.send(&WireRequest::new(request, true)).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut assembler = StreamAssembler::default();
            while !assembler.done {
                let deltas = match response.chunk().await {
                    Ok(Some(bytes)) => assembler.push(&bytes),
                    Ok(None) => break,
                    Err(e) => Err(e.into()),
                };
                if !forward(&tx, deltas) {
                    return;
                }
            }
            if !assembler.done && !forward(&tx, assembler.flush()) {
                return;
            }
            let _ = tx.send(Ok(StreamEvent::Done(assembler.finish())));
        });

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}

/// Send deltas or the error; false when the stream should stop.
fn forward(
    tx: &mpsc::UnboundedSender<ProviderResult<StreamEvent>>,
    deltas: ProviderResult<Vec<String>>,
) -> bool {
    match deltas {
        Ok(deltas) => deltas
            .into_iter()
            .all(|d| tx.send(Ok(StreamEvent::Delta(d))).is_ok()),
        Err(e) => {
            let _ = tx.send(Err(e));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mockito::Matcher;
    use serde_json::json;

    fn request(tools: Vec<Value>) -> ChatRequest {
        ChatRequest {
            model: "gemini-2.5-flash".to_string(),
            messages: vec![Message::user("my tasks?")],
            tools,
            max_tokens: 256,
            temperature: 0.7,
        }
    }

    fn client(url: String, key: Option<&str>) -> OpenAICompatClient {
        OpenAICompatClient::new(url, key.map(str::to_string), HashMap::new()).unwrap()
    }

    #[test]
    fn test_rejects_empty_api_base() {
        assert!(OpenAICompatClient::new("  ", None, HashMap::new()).is_err());
    }

    #[test]
    fn test_assembler_keeps_characters_split_across_chunks() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"tâche\"}}]}\n\ndata: [DONE]\n\n";
        let bytes = body.as_bytes();
        let split = body.find('â').unwrap() + 1;

        let mut assembler = StreamAssembler::default();
        assert!(assembler.push(&bytes[..split]).unwrap().is_empty());
        let deltas = assembler.push(&bytes[split..]).unwrap();

        assert_eq!(deltas, vec!["tâche"]);
        assert!(assembler.done);
        assert_eq!(assembler.finish().content.as_deref(), Some("tâche"));
    }

    #[test]
    fn test_assembler_builds_tool_calls_from_fragments() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_9\",\"function\":{\"name\":\"notion-\",\"arguments\":\"{\\\"query\\\":\"}}]}}]}\r\n\r\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"search\",\"arguments\":\"\\\"todo\\\"}\"}}]}}]}\n",
        );
        let mut assembler = StreamAssembler::default();
        assert!(assembler.push(body.as_bytes()).unwrap().is_empty());
        assert!(assembler.flush().unwrap().is_empty());

        let response = assembler.finish();
        assert!(response.content.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_9");
        assert_eq!(response.tool_calls[0].name, "notion-search");
        assert_eq!(response.tool_calls[0].arguments, json!({"query": "todo"}));
    }

    #[test]
    fn test_assembler_rejects_malformed_chunk() {
        let mut assembler = StreamAssembler::default();
        let err = assembler.push(b"data: {oops\n\n").unwrap_err();
        assert!(matches!(err, ProviderError::Json(_)));
    }

    #[tokio::test]
    async fn test_chat_parses_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "gemini-2.5-flash",
                "tool_choice": "auto"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {
                                    "name": "notion-search",
                                    "arguments": "{\"query\":\"todo\"}"
                                }
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let tools = vec![json!({"type": "function", "function": {"name": "notion-search"}})];
        let response = client(server.url(), Some("test-key"))
            .chat(request(tools))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "notion-search");
        assert_eq!(response.tool_calls[0].arguments["query"], json!("todo"));
    }

    #[tokio::test]
    async fn test_chat_without_tools_omits_tool_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::Json(json!({
                "model": "gemini-2.5-flash",
                "messages": [{"role": "user", "content": "my tasks?"}],
                "max_tokens": 256,
                "temperature": 0.7
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"none"}}]}"#)
            .create_async()
            .await;

        let response = client(server.url(), None).chat(request(Vec::new())).await.unwrap();
        mock.assert_async().await;
        assert_eq!(response, ChatResponse::answer("none"));
    }

    #[tokio::test]
    async fn test_chat_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;

        let err = client(server.url(), None)
            .chat(request(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 401, ref body } if body == "bad key"));
    }

    #[tokio::test]
    async fn test_chat_stream_assembles_text() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Here are \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"your tasks\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n"
        );
        let _mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let mut stream = client(server.url(), None)
            .chat_stream(request(Vec::new()))
            .await
            .unwrap();

        let mut deltas = Vec::new();
        let mut done = None;
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                StreamEvent::Delta(d) => deltas.push(d),
                StreamEvent::Done(r) => done = Some(r),
            }
        }
        assert_eq!(deltas, vec!["Here are ", "your tasks"]);
        assert_eq!(done, Some(ChatResponse::answer("Here are your tasks")));
    }
}
