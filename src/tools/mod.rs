//! Locally executed assistant tools.
//!
//! Tools are registered by name in a [`ToolRegistry`]. When a run reaches
//! `requires_action`, the [`ToolDispatcher`] resolves each requested call in
//! the registry and executes the whole batch concurrently.

pub mod dispatcher;
pub mod labs;

pub use dispatcher::ToolDispatcher;
pub use labs::{GetLabTool, GetModulesTool, GetUnitsTool};

use async_trait::async_trait;
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};

use crate::content::ContentSource;
use crate::error::ToolError;

/// Result of a tool invocation.
///
/// Serializes to a JSON string or a JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ToolValue {
    /// A human-readable message.
    Text(String),
    /// An ordered list of names.
    List(Vec<String>),
}

impl From<String> for ToolValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for ToolValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

/// A tool the assistant can call.
#[async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> serde_json::Value;
    async fn call(&self, args: serde_json::Value) -> Result<ToolValue, ToolError>;
}

/// Name-keyed collection of tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three lab tools.
    ///
    /// `get_lab` always reads from `lab_account_id`; the other tools take the
    /// account from their arguments.
    pub fn with_lab_tools(content: Arc<dyn ContentSource>, lab_account_id: impl Into<String>) -> Self {
        Self::new()
            .with_tool(Arc::new(GetLabTool::new(
                Arc::clone(&content),
                lab_account_id,
            )))
            .with_tool(Arc::new(GetModulesTool::new(Arc::clone(&content))))
            .with_tool(Arc::new(GetUnitsTool::new(content)))
    }

    /// Register a tool, replacing any tool with the same name.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
        }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions in `OpenAI` function-tool format.
    pub fn openai_tools_json(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.schema(),
                    }
                })
            })
            .collect()
    }
}
