//! Remote MCP tools exposed through the [`Tool`] trait.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::client::{McpClient, McpResult, RemoteTool};
use crate::base::{Result, Tool, ToolError};
use crate::filter::ToolFilter;

/// One remote tool bound to a shared MCP session
pub struct McpTool {
    client: Arc<Mutex<McpClient>>,
    name: String,
    description: String,
    parameters: Value,
}

impl McpTool {
    fn new(client: Arc<Mutex<McpClient>>, remote: RemoteTool) -> Self {
        let description = remote
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| remote.name.clone());
        Self {
            client,
            parameters: remote
                .input_schema
                .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            name: remote.name,
            description,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, args: Value) -> Result<String> {
        if !args.is_object() {
            return Err(ToolError::InvalidArguments(
                "MCP tool arguments must be a JSON object".to_string(),
            ));
        }

        let mut client = self.client.lock().await;
        client
            .call_tool(&self.name, args)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

/// The filtered tool catalog of one MCP server
pub struct McpToolset {
    tools: Vec<Arc<dyn Tool>>,
}

impl McpToolset {
    /// Connect, list the catalog and keep only tools the filter admits.
    pub async fn connect(
        url: &str,
        token: &str,
        timeout: Duration,
        filter: &dyn ToolFilter,
    ) -> McpResult<Self> {
        let client = McpClient::new(url, token, timeout)?;
        Self::from_client(client, filter).await
    }

    async fn from_client(mut client: McpClient, filter: &dyn ToolFilter) -> McpResult<Self> {
        let remote = client.list_tools().await?;
        let total = remote.len();
        let client = Arc::new(Mutex::new(client));

        let tools: Vec<Arc<dyn Tool>> = remote
            .into_iter()
            .filter(|t| {
                let allowed = filter.allows_name(&t.name);
                if !allowed {
                    debug!("Hiding MCP tool '{}'", t.name);
                }
                allowed
            })
            .map(|t| Arc::new(McpTool::new(Arc::clone(&client), t)) as Arc<dyn Tool>)
            .collect();

        info!("Exposing {} of {} MCP tools", tools.len(), total);
        Ok(Self { tools })
    }

    /// Tools admitted by the filter
    pub fn into_tools(self) -> Vec<Arc<dyn Tool>> {
        self.tools
    }
}
