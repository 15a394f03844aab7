//! Notion MCP integration over streamable HTTP.

pub mod client;
pub mod sse;
pub mod toolset;

pub use client::{
    render_tool_result, McpClient, McpError, McpResult, RemoteTool, MCP_PROTOCOL_VERSION,
};
pub use toolset::{McpTool, McpToolset};
