//! Agent error type

use notion_agent_providers::ProviderError;
use notion_agent_tools::McpError;
use thiserror::Error;

/// Errors surfaced while answering a question
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Core(#[from] notion_agent_core::Error),

    #[error(transparent)]
    Tool(#[from] McpError),

    #[error("request cancelled")]
    Cancelled,

    #[error("{0}")]
    Config(String),
}

impl AgentError {
    /// Whether the store reported a missing session
    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::Core(e) if e.is_not_found())
    }
}
