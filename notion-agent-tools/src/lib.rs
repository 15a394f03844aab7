//! Tools for notion-agent
//!
//! This crate provides the tool registry, the read-only access filter and
//! the Notion MCP toolset.

pub mod base;
pub mod filter;
pub mod mcp;
pub mod registry;

pub use base::{Tool, ToolError};
pub use filter::{is_read_only_tool_name, AllowAll, ReadOnlyFilter, ToolFilter};
pub use mcp::{McpClient, McpError, McpToolset};
pub use registry::ToolRegistry;
