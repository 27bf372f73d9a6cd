//! Assistant runtime types and client traits.
//!
//! This module models the thread/run resources of the `OpenAI` Assistants v2
//! API and the operations the relay needs from it.
//!
//! # Overview
//!
//! The [`AssistantRuntime`] trait is the seam between the relay and the
//! external runtime. [`OpenAiAssistantsClient`] implements it over HTTP; the
//! [`RunOrchestrator`] drives a run through its lifecycle on top of any
//! implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use assistant_relay::assistant::{AssistantSettings, OpenAiAssistantsClient};
//!
//! let settings = AssistantSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//! };
//! let client = OpenAiAssistantsClient::new(settings);
//! ```

pub mod extractor;
pub mod openai;
pub mod orchestrator;

pub use extractor::extract_reply;
pub use openai::OpenAiAssistantsClient;
pub use orchestrator::{PollPolicy, RunOrchestrator, RunPhase};

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Prefix every assistant id issued by the runtime carries.
pub const ASSISTANT_ID_PREFIX: &str = "asst_";

/// Assistant runtime connection settings.
#[derive(Clone)]
pub struct AssistantSettings {
    /// Base URL for the runtime API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// API key for bearer authentication.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AssistantSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// An assistant definition as returned by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    /// Assistant identifier (`asst_...`).
    pub id: String,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Thread identifier (`thread_...`).
    pub id: String,
}

/// Status of a run as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting to be picked up.
    Queued,
    /// The assistant is working.
    InProgress,
    /// The assistant is waiting for tool outputs.
    RequiresAction,
    /// A cancellation was requested.
    Cancelling,
    /// The run was cancelled.
    Cancelled,
    /// The run failed; see [`Run::last_error`].
    Failed,
    /// The run finished successfully.
    Completed,
    /// The run ended before finishing (token limits, etc.).
    Incomplete,
    /// The run expired upstream.
    Expired,
    /// Any status this relay does not know about.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the run is still waiting on the assistant.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of an assistant against a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier (`run_...`).
    pub id: String,
    /// Owning thread.
    #[serde(default)]
    pub thread_id: String,
    /// Current status.
    pub status: RunStatus,
    /// Error reported by the runtime when the run failed.
    #[serde(default)]
    pub last_error: Option<RunError>,
    /// Pending action, present while status is `requires_action`.
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
}

impl Run {
    /// Tool calls the run is waiting on, if any.
    ///
    /// Returns `None` when the required-action payload is missing or carries
    /// an empty batch.
    #[must_use]
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        self.required_action
            .as_ref()
            .map(|action| action.submit_tool_outputs.tool_calls.as_slice())
            .filter(|calls| !calls.is_empty())
    }

    /// Failure reason reported by the runtime.
    #[must_use]
    pub fn failure_reason(&self) -> &str {
        self.last_error
            .as_ref()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or("Error desconocido")
    }
}

/// Error detail attached to a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// Action a run requires before it can continue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredAction {
    /// Tool outputs the run is waiting for.
    pub submit_tool_outputs: SubmitToolOutputs,
}

/// Batch of tool calls awaiting outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    /// Requested tool calls.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// A tool call requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,
    /// Type of tool (always "function" for now).
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    /// Function details.
    pub function: ToolCallFunction,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    /// Build a function tool call.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function details in a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    /// Function name.
    pub name: String,
    /// Arguments as JSON string.
    pub arguments: String,
}

/// The serialized result of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Id of the tool call this output answers.
    pub tool_call_id: String,
    /// JSON-encoded result.
    pub output: String,
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// A message stored in a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Message identifier.
    #[serde(default)]
    pub id: String,
    /// Role of the author.
    pub role: MessageRole,
    /// Content segments.
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Create an assistant message made of text segments.
    pub fn assistant_text<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: String::new(),
            role: MessageRole::Assistant,
            content: segments.into_iter().map(MessageContent::text).collect(),
        }
    }

    /// Text values of all `text` segments, in order.
    pub fn text_segments(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|part| match part {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

/// A content segment of a thread message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Text content.
    Text {
        /// The text payload.
        text: MessageText,
    },
    /// Image files, refusals and other non-text segments.
    #[serde(other)]
    Other,
}

impl MessageContent {
    /// Create a text segment.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            text: MessageText {
                value: value.into(),
            },
        }
    }
}

/// Text payload of a message segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageText {
    /// The text value.
    #[serde(default)]
    pub value: String,
}

/// Operations the relay needs from the assistant runtime.
///
/// Implementations must be cheap to share; the orchestrator holds one behind
/// an `Arc` for the lifetime of the process.
#[async_trait::async_trait]
pub trait AssistantRuntime: Send + Sync {
    /// Look up an assistant by id.
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, RuntimeError>;

    /// Create an empty thread.
    async fn create_thread(&self) -> Result<Thread, RuntimeError>;

    /// Append a message to a thread.
    async fn add_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, RuntimeError>;

    /// Start a run of `assistant_id` on a thread.
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, RuntimeError>;

    /// Fetch the current state of a run.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RuntimeError>;

    /// Submit outputs for the run's pending tool calls.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, RuntimeError>;

    /// Request cancellation of a run.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RuntimeError>;

    /// List the messages of a thread in the runtime's default order.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_with_tool_calls() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "object": "thread.run",
            "thread_id": "thread_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "get_lab", "arguments": "{\"name\":\"Ohm\"}" }
                    }]
                }
            }
        }))
        .unwrap();

        assert_eq!(run.status, RunStatus::RequiresAction);
        let calls = run.tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_lab");
    }

    #[test]
    fn test_empty_tool_batch_is_none() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": { "submit_tool_outputs": { "tool_calls": [] } }
        }))
        .unwrap();
        assert!(run.tool_calls().is_none());
    }

    #[test]
    fn test_unknown_status() {
        let run: Run = serde_json::from_value(json!({ "id": "run_1", "status": "paused" })).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_pending());
    }

    #[test]
    fn test_failure_reason_fallback() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "status": "failed",
            "last_error": null
        }))
        .unwrap();
        assert_eq!(run.failure_reason(), "Error desconocido");
    }

    #[test]
    fn test_message_segments() {
        let msg: ThreadMessage = serde_json::from_value(json!({
            "id": "msg_1",
            "role": "assistant",
            "content": [
                { "type": "text", "text": { "value": "Hola", "annotations": [] } },
                { "type": "image_file", "image_file": { "file_id": "file_1" } },
                { "type": "text", "text": { "value": "mundo" } }
            ]
        }))
        .unwrap();

        let segments: Vec<&str> = msg.text_segments().collect();
        assert_eq!(segments, vec!["Hola", "mundo"]);
    }
}
