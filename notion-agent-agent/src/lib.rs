//! Agent logic for notion-agent
//!
//! This crate provides prompt building, the model/tool runner and the
//! session-bound task assistant.

pub mod assistant;
pub mod context;
pub mod error;
pub mod runner;

pub use assistant::{format_event_line, Assistant, TaskAssistant};
pub use context::{ContextBuilder, DEFAULT_INSTRUCTION};
pub use error::AgentError;
pub use runner::{EventSource, EventStream, Runner, RunnerConfig, NO_RESPONSE_TEXT};
