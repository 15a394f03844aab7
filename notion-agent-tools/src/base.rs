//! Base trait for tools

use async_trait::async_trait;
use serde_json::Value;

/// A named operation the model may invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the tool parameters schema (JSON Schema format)
    fn parameters(&self) -> Value;

    /// Execute the tool with arguments
    async fn execute(&self, args: Value) -> Result<String>;

    /// Check arguments against the `required` list of the schema
    fn validate_params(&self, params: &Value) -> Vec<String> {
        let Some(params_obj) = params.as_object() else {
            return vec!["Parameters must be an object".to_string()];
        };

        let schema = self.parameters();
        schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|required| {
                required
                    .iter()
                    .filter_map(|field| field.as_str())
                    .filter(|field| !params_obj.contains_key(*field))
                    .map(|field| format!("Missing required field: {}", field))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Convert tool to OpenAI function schema format
    fn to_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

/// Tool errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool error: {0}")]
    Error(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool '{0}' is not permitted in read-only mode")]
    NotPermitted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SearchTool;

    #[async_trait]
    impl Tool for SearchTool {
        fn name(&self) -> &str {
            "notion-search"
        }

        fn description(&self) -> &str {
            "Search the workspace"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            })
        }

        async fn execute(&self, _args: Value) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_validate_params_reports_missing_fields() {
        assert!(SearchTool.validate_params(&json!({"query": "todo"})).is_empty());
        assert_eq!(
            SearchTool.validate_params(&json!({})),
            vec!["Missing required field: query".to_string()]
        );
        assert_eq!(SearchTool.validate_params(&json!("query")).len(), 1);
    }

    #[test]
    fn test_to_schema_uses_function_format() {
        let schema = SearchTool.to_schema();
        assert_eq!(schema["type"], json!("function"));
        assert_eq!(schema["function"]["name"], json!("notion-search"));
        assert_eq!(schema["function"]["parameters"]["required"], json!(["query"]));
    }
}
