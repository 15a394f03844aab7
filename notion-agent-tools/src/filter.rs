//! Tool access policy
//!
//! The read-only policy matches case-insensitive substrings of the tool name.
//! Deny patterns are checked first and always win; names matching neither
//! list are rejected.

use super::base::Tool;

/// Name fragments that indicate a mutating operation
const DENY_PATTERNS: &[&str] = &[
    "delete", "update", "patch", "create", "append", "move", "archive", "restore", "set-", "write",
];

/// Name fragments that indicate a read operation
const ALLOW_PATTERNS: &[&str] = &[
    "fetch",
    "search",
    "retrieve",
    "get-",
    "query-data-source",
    "database-query",
    "list",
];

/// Decides which tools may be exposed to the model
pub trait ToolFilter: Send + Sync {
    /// Decide by tool name alone
    fn allows_name(&self, name: &str) -> bool;

    /// Decide for a concrete tool
    fn allows(&self, tool: &dyn Tool) -> bool {
        self.allows_name(tool.name())
    }
}

/// Returns true when `name` looks like a read-only operation.
pub fn is_read_only_tool_name(name: &str) -> bool {
    let name = name.to_lowercase();
    if DENY_PATTERNS.iter().any(|p| name.contains(p)) {
        return false;
    }
    ALLOW_PATTERNS.iter().any(|p| name.contains(p))
}

/// Admits only tools whose names look read-only
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyFilter;

impl ToolFilter for ReadOnlyFilter {
    fn allows_name(&self, name: &str) -> bool {
        is_read_only_tool_name(name)
    }
}

/// Admits every tool
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ToolFilter for AllowAll {
    fn allows_name(&self, _name: &str) -> bool {
        true
    }
}
