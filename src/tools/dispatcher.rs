//! Concurrent execution of a run's tool-call batch.

use futures::future::try_join_all;
use std::sync::Arc;

use super::ToolRegistry;
use crate::assistant::{ToolCall, ToolOutput};
use crate::error::ToolError;

/// Executes tool-call batches against a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Get the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run every call of the batch concurrently.
    ///
    /// Returns one output per call, tagged with the call id. The first
    /// failure aborts the batch and drops the remaining futures, so either
    /// all outputs are returned or none.
    pub async fn dispatch(&self, tool_calls: &[ToolCall]) -> Result<Vec<ToolOutput>, ToolError> {
        tracing::info!(tool_call_count = tool_calls.len(), "Dispatching tool calls");

        let outputs = try_join_all(tool_calls.iter().map(|call| self.execute(call))).await?;

        tracing::info!(output_count = outputs.len(), "All tool calls executed");
        Ok(outputs)
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let tool_name = &call.function.name;
        let tool = self.registry.get(tool_name)?;

        let args: serde_json::Value = serde_json::from_str(&call.function.arguments).map_err(
            |source| ToolError::MalformedArguments {
                call_id: call.id.clone(),
                source,
            },
        )?;

        tracing::info!(
            tool_call_id = %call.id,
            tool_name = %tool_name,
            "Executing tool call"
        );
        tracing::debug!(
            tool_call_id = %call.id,
            arguments = %call.function.arguments,
            "Tool call arguments"
        );

        let value = tool.call(args).await.inspect_err(|e| {
            tracing::error!(
                tool_call_id = %call.id,
                tool_name = %tool_name,
                error = %e,
                "Tool call failed"
            );
        })?;

        let output = serde_json::to_string(&value).map_err(|source| ToolError::Serialization {
            call_id: call.id.clone(),
            source,
        })?;

        tracing::debug!(
            tool_call_id = %call.id,
            result_length = output.len(),
            "Tool call succeeded"
        );

        Ok(ToolOutput {
            tool_call_id: call.id.clone(),
            output,
        })
    }
}
