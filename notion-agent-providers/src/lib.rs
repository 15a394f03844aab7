//! LLM provider integrations for notion-agent
//!
//! This crate provides the provider abstraction and an OpenAI-compatible
//! client used to talk to Gemini.

pub mod base;
pub mod openai_compat;

pub use base::{
    ChatRequest, ChatResponse, ChatRole, LLMProvider, Message, ProviderError,
    ProviderEventStream, ProviderResult, StreamEvent, ToolCallRequest,
};
pub use openai_compat::OpenAICompatClient;
