//! JSON-RPC client for MCP's streamable HTTP transport.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::sse::{SseEvent, SseParser};

pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

const SESSION_HEADER: &str = "MCP-Session-Id";
const PROTOCOL_HEADER: &str = "MCP-Protocol-Version";
const DEFAULT_RETRY_MS: u64 = 1000;
const MAX_SSE_RECONNECTS: usize = 5;

/// MCP client errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("MCP HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("MCP server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP request '{method}' failed ({code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("failed to decode MCP message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("MCP client misconfigured: {0}")]
    Config(String),
}

pub type McpResult<T> = std::result::Result<T, McpError>;

/// A tool as advertised by `tools/list`
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", alias = "input_schema", default)]
    pub input_schema: Option<Value>,
}

#[derive(Default)]
struct SseOutcome {
    result: Option<Value>,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
}

/// Stateful MCP session over HTTP.
///
/// The bearer token is installed as a default header, so every request
/// (including SSE reconnects) is authorized.
pub struct McpClient {
    http: reqwest::Client,
    url: String,
    session_id: Option<String>,
    protocol_version: String,
    next_id: u64,
    initialized: bool,
}

impl McpClient {
    pub fn new(url: impl Into<String>, token: &str, timeout: Duration) -> McpResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(McpError::Config("access token is required".to_string()));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| McpError::Config(format!("invalid access token: {}", e)))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
            session_id: None,
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            next_id: 1,
            initialized: false,
        })
    }

    /// Session id assigned by the server, if any
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Protocol version in use after negotiation
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// List every tool the server offers, following pagination.
    pub async fn list_tools(&mut self) -> McpResult<Vec<RemoteTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.request("tools/list", params).await?;
            let page = result
                .get("tools")
                .cloned()
                .ok_or_else(|| McpError::Protocol("tools/list response missing 'tools'".into()))?;
            tools.extend(serde_json::from_value::<Vec<RemoteTool>>(page)?);

            let next = result
                .get("nextCursor")
                .and_then(|v| v.as_str())
                .filter(|c| !c.is_empty());
            match next {
                Some(next) if cursor.as_deref() != Some(next) => cursor = Some(next.to_string()),
                _ => break,
            }
        }

        debug!("MCP server listed {} tools", tools.len());
        Ok(tools)
    }

    /// Invoke a tool and render its result as text.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> McpResult<String> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        Ok(render_tool_result(&result))
    }

    /// Send a request, re-establishing the session once if the server forgot it.
    pub async fn request(&mut self, method: &str, params: Value) -> McpResult<Value> {
        self.ensure_initialized().await?;

        match self.post_rpc(method, params.clone()).await {
            Err(McpError::Status { status: 404, .. }) if self.session_id.is_some() => {
                warn!("MCP session expired during '{}', re-initializing", method);
                self.session_id = None;
                self.initialized = false;
                self.ensure_initialized().await?;
                self.post_rpc(method, params).await
            }
            other => other,
        }
    }

    async fn ensure_initialized(&mut self) -> McpResult<()> {
        if self.initialized {
            return Ok(());
        }

        let result = self
            .post_rpc(
                "initialize",
                json!({
                    "protocolVersion": self.protocol_version,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "notion-agent",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await?;

        if let Some(version) = result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
        {
            self.protocol_version = version.to_string();
        }

        self.notify("notifications/initialized", json!({})).await?;
        self.initialized = true;
        info!(
            "MCP session initialized (protocol {}, session {})",
            self.protocol_version,
            self.session_id.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    async fn notify(&mut self, method: &str, params: Value) -> McpResult<()> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        let response = self.post(&payload).await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn post_rpc(&mut self, method: &str, params: Value) -> McpResult<Value> {
        let request_id = self.take_request_id();
        let payload = json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": method,
            "params": params
        });
        debug!("MCP -> {} (id {})", method, request_id);

        let response = Self::check_status(self.post(&payload).await?).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.contains("application/json") {
            let body = response.bytes().await?;
            let msg: Value = serde_json::from_slice(&body)?;
            return extract_rpc_result(method, msg, request_id);
        }

        if content_type.contains("text/event-stream") {
            return self.await_sse_result(response, method, request_id).await;
        }

        Err(McpError::Protocol(format!(
            "unsupported response content-type '{}'",
            content_type
        )))
    }

    async fn await_sse_result(
        &mut self,
        response: reqwest::Response,
        method: &str,
        request_id: u64,
    ) -> McpResult<Value> {
        let mut outcome = consume_sse_stream(response, method, request_id).await?;
        let mut last_event_id = outcome.last_event_id.take();
        let mut retry_ms = outcome.retry_ms.unwrap_or(DEFAULT_RETRY_MS);

        for attempt in 0..=MAX_SSE_RECONNECTS {
            if let Some(value) = outcome.result.take() {
                return Ok(value);
            }
            if attempt == MAX_SSE_RECONNECTS {
                break;
            }

            let event_id = last_event_id.clone().ok_or_else(|| {
                McpError::Protocol(format!(
                    "event stream for '{}' ended before a response and without an event id",
                    method
                ))
            })?;

            tokio::time::sleep(Duration::from_millis(retry_ms)).await;
            debug!("MCP resuming '{}' stream after event {}", method, event_id);

            let mut req = self
                .http
                .get(&self.url)
                .header(ACCEPT, "text/event-stream")
                .header(PROTOCOL_HEADER, self.protocol_version.as_str())
                .header("Last-Event-ID", event_id);
            if let Some(session_id) = &self.session_id {
                req = req.header(SESSION_HEADER, session_id);
            }
            let response = req.send().await?;
            self.capture_session_header(response.headers());
            let response = Self::check_status(response).await?;

            outcome = consume_sse_stream(response, method, request_id).await?;
            if let Some(id) = outcome.last_event_id.take() {
                last_event_id = Some(id);
            }
            if let Some(ms) = outcome.retry_ms {
                retry_ms = ms;
            }
        }

        Err(McpError::Protocol(format!(
            "no response for '{}' after {} stream reconnects",
            method, MAX_SSE_RECONNECTS
        )))
    }

    async fn post(&mut self, payload: &Value) -> McpResult<reqwest::Response> {
        let mut req = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .header(PROTOCOL_HEADER, self.protocol_version.as_str())
            .json(payload);
        if let Some(session_id) = &self.session_id {
            req = req.header(SESSION_HEADER, session_id);
        }

        let response = req.send().await?;
        self.capture_session_header(response.headers());
        Ok(response)
    }

    async fn check_status(response: reqwest::Response) -> McpResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(McpError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn capture_session_header(&mut self, headers: &HeaderMap) {
        if let Some(value) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
            if !value.trim().is_empty() {
                self.session_id = Some(value.to_string());
            }
        }
    }

    fn take_request_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

async fn consume_sse_stream(
    mut response: reqwest::Response,
    method: &str,
    request_id: u64,
) -> McpResult<SseOutcome> {
    let mut parser = SseParser::new();
    let mut outcome = SseOutcome::default();

    while let Some(chunk) = response.chunk().await? {
        for event in parser.push(&chunk) {
            if let Some(value) = handle_sse_event(&mut outcome, event, method, request_id)? {
                outcome.result = Some(value);
                return Ok(outcome);
            }
        }
    }
    if let Some(event) = parser.finish() {
        let result = handle_sse_event(&mut outcome, event, method, request_id)?;
        outcome.result = result;
    }
    Ok(outcome)
}

fn handle_sse_event(
    outcome: &mut SseOutcome,
    event: SseEvent,
    method: &str,
    request_id: u64,
) -> McpResult<Option<Value>> {
    if let Some(id) = &event.id {
        outcome.last_event_id = Some(id.clone());
    }
    if let Some(ms) = event.retry_ms {
        outcome.retry_ms = Some(ms);
    }

    let data = event.data();
    if data.trim().is_empty() {
        return Ok(None);
    }
    let msg: Value = match serde_json::from_str(&data) {
        Ok(v) => v,
        Err(e) => {
            debug!("Skipping undecodable MCP event: {}", e);
            return Ok(None);
        }
    };

    // Server-initiated requests and notifications carry a method.
    if msg.get("method").is_some() {
        return Ok(None);
    }
    if msg.get("id").and_then(|v| v.as_u64()) != Some(request_id) {
        return Ok(None);
    }
    extract_rpc_result(method, msg, request_id).map(Some)
}

fn extract_rpc_result(method: &str, msg: Value, request_id: u64) -> McpResult<Value> {
    let id = msg.get("id").and_then(|v| v.as_u64());
    if id != Some(request_id) {
        return Err(McpError::Protocol(format!(
            "mismatched response id: expected {}, got {:?}",
            request_id, id
        )));
    }

    if let Some(err) = msg.get("error") {
        return Err(McpError::Rpc {
            method: method.to_string(),
            code: err.get("code").and_then(|c| c.as_i64()).unwrap_or_default(),
            message: err
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string()),
        });
    }

    Ok(msg.get("result").cloned().unwrap_or_else(|| json!({})))
}

/// Flatten a `tools/call` result into text for the model.
pub fn render_tool_result(result: &Value) -> String {
    let mut parts = Vec::new();
    if let Some(items) = result.get("content").and_then(|v| v.as_array()) {
        for item in items {
            if item.get("type").and_then(|v| v.as_str()) == Some("text") {
                if let Some(text) = item.get("text").and_then(|v| v.as_str()) {
                    parts.push(text.to_string());
                    continue;
                }
            }
            parts.push(item.to_string());
        }
    }

    let text = if parts.is_empty() {
        "(no output)".to_string()
    } else {
        parts.join("\n")
    };

    if result.get("isError").and_then(|v| v.as_bool()) == Some(true) {
        format!("Error: {}", text)
    } else {
        text
    }
}
