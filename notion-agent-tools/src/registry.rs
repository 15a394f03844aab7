//! Tool registry

use super::base::Tool;
use super::filter::{AllowAll, ToolFilter};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of tools the model may call, guarded by a [`ToolFilter`]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    filter: Arc<dyn ToolFilter>,
}

impl ToolRegistry {
    /// Create a registry that admits every tool
    pub fn new() -> Self {
        Self::with_filter(Arc::new(AllowAll))
    }

    /// Create a registry that only admits tools the filter allows
    pub fn with_filter(filter: Arc<dyn ToolFilter>) -> Self {
        Self {
            tools: HashMap::new(),
            filter,
        }
    }

    /// Register a tool. Returns false when the filter rejected it.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> bool {
        if !self.filter.allows(tool.as_ref()) {
            debug!("Tool '{}' rejected by filter", tool.name());
            return false;
        }
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
        true
    }

    /// Get all tool definitions in OpenAI format, sorted by name
    pub fn get_definitions(&self) -> Vec<Value> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools.into_iter().map(|tool| tool.to_schema()).collect()
    }

    /// Execute a tool by name. Failures come back as `Error...` text for the model.
    pub async fn execute(&self, name: &str, params: Value) -> String {
        if !self.filter.allows_name(name) {
            return format!("Error: Tool '{}' is not permitted in read-only mode", name);
        }

        let tool = match self.tools.get(name) {
            Some(tool) => tool,
            None => return format!("Error: Tool '{}' not found", name),
        };

        let errors = tool.validate_params(&params);
        if !errors.is_empty() {
            return format!(
                "Error: Invalid parameters for tool '{}': {}",
                name,
                errors.join("; ")
            );
        }

        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => format!("Error executing {}: {}", name, e),
        }
    }

    /// Get list of registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ToolError;
    use crate::filter::ReadOnlyFilter;
    use async_trait::async_trait;

    struct MockTool {
        name: &'static str,
        fail: bool,
    }

    impl MockTool {
        fn named(name: &'static str) -> Arc<dyn Tool> {
            Arc::new(Self { name, fail: false })
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "A mock tool"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            })
        }

        async fn execute(&self, args: Value) -> crate::base::Result<String> {
            if self.fail {
                return Err(ToolError::ExecutionFailed("boom".to_string()));
            }
            Ok(format!("{} result for {}", self.name, args["query"]))
        }
    }

    #[test]
    fn test_register_respects_filter() {
        let mut registry = ToolRegistry::with_filter(Arc::new(ReadOnlyFilter));
        assert!(registry.register(MockTool::named("notion-search")));
        assert!(!registry.register(MockTool::named("notion-update-page")));
        assert!(!registry.register(MockTool::named("notion-duplicate-page")));
        assert_eq!(registry.tool_names(), vec!["notion-search".to_string()]);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(MockTool::named("notion-search"));
        registry.register(MockTool::named("notion-search"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_definitions_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::named("notion-search"));
        registry.register(MockTool::named("notion-fetch"));
        let names: Vec<_> = registry
            .get_definitions()
            .into_iter()
            .map(|d| d["function"]["name"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, vec!["notion-fetch", "notion-search"]);
    }

    #[tokio::test]
    async fn test_execute_tool() {
        let mut registry = ToolRegistry::with_filter(Arc::new(ReadOnlyFilter));
        registry.register(MockTool::named("notion-search"));
        let result = registry
            .execute("notion-search", serde_json::json!({"query": "todo"}))
            .await;
        assert_eq!(result, "notion-search result for \"todo\"");
    }

    #[tokio::test]
    async fn test_execute_refuses_denied_and_unknown() {
        let registry = ToolRegistry::with_filter(Arc::new(ReadOnlyFilter));
        assert_eq!(
            registry
                .execute("notion-create-pages", serde_json::json!({}))
                .await,
            "Error: Tool 'notion-create-pages' is not permitted in read-only mode"
        );
        assert_eq!(
            registry.execute("notion-fetch", serde_json::json!({})).await,
            "Error: Tool 'notion-fetch' not found"
        );
    }

    #[tokio::test]
    async fn test_execute_reports_invalid_params_and_failures() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::named("notion-search"));
        registry.register(Arc::new(MockTool {
            name: "notion-fetch",
            fail: true,
        }));

        let invalid = registry.execute("notion-search", serde_json::json!({})).await;
        assert!(invalid.starts_with("Error: Invalid parameters for tool 'notion-search'"));

        let failed = registry
            .execute("notion-fetch", serde_json::json!({"query": "x"}))
            .await;
        assert_eq!(failed, "Error executing notion-fetch: Execution failed: boom");
    }
}
