//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default Notion MCP endpoint
pub const DEFAULT_NOTION_URL: &str = "https://mcp.notion.com/mcp";

/// Default model-provider endpoint (Gemini, OpenAI-compatible surface)
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Root configuration for notion-agent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Agent configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Model provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Notion MCP server configuration
    #[serde(default)]
    pub notion: NotionConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.notion-agent/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Application name used to address sessions
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// User id used to address sessions
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Agent name, recorded as the author of model events
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Default model
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum model/tool round trips per request
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// Stream model output as partial events
    #[serde(default)]
    pub streaming: bool,
    /// Replacement for the built-in system instruction
    #[serde(default)]
    pub instruction: Option<String>,
}

fn default_app_name() -> String {
    "notion-todo-agent".to_string()
}

fn default_user_id() -> String {
    "local-user".to_string()
}

fn default_agent_name() -> String {
    "notion_todo_agent".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tool_iterations() -> u32 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            user_id: default_user_id(),
            name: default_agent_name(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_tool_iterations: default_max_tool_iterations(),
            streaming: false,
            instruction: None,
        }
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API key; normally supplied through `GOOGLE_API_KEY`
    #[serde(default)]
    pub api_key: String,
    /// Extra headers sent with every request
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            extra_headers: HashMap::new(),
        }
    }
}

/// Notion MCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Streamable HTTP endpoint
    #[serde(default = "default_notion_url")]
    pub url: String,
    /// Access token sent as a bearer token
    #[serde(default)]
    pub token: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_notion_url() -> String {
    DEFAULT_NOTION_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    90
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            url: default_notion_url(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
