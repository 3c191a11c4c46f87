//! Extension tools: anything an embedding application registers beyond the
//! built-in table.

use async_trait::async_trait;
use forgeloop_core::ToolDefinition;
use forgeloop_core::ToolResult;
use forgeloop_core::error::ToolError;
use std::collections::BTreeMap;

/// A tool provided from outside this crate.
#[async_trait]
pub trait ExtensionTool: Send + Sync {
    /// Unique name; must not collide with a built-in tool.
    fn name(&self) -> &str;

    /// Sent to the model with the schema.
    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Name-indexed extension tools. Iteration order is by name so the
/// provider sees a stable tool list.
#[derive(Default)]
pub struct ExtensionRegistry {
    tools: BTreeMap<String, Box<dyn ExtensionTool>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn ExtensionTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(arguments).await
    }
}
