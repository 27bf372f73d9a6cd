//! `OpenAI` Assistants v2 API client.
//!
//! This module implements [`AssistantRuntime`] over the REST endpoints under
//! `/v1/assistants` and `/v1/threads`.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

use crate::error::RuntimeError;

use super::{
    Assistant, AssistantRuntime, AssistantSettings, MessageRole, Run, Thread, ThreadMessage,
    ToolOutput,
};

/// Beta header required by the Assistants v2 API.
const ASSISTANTS_BETA: &str = "assistants=v2";

/// Client for the `OpenAI` Assistants API.
#[derive(Clone)]
pub struct OpenAiAssistantsClient {
    http: reqwest::Client,
    settings: AssistantSettings,
}

impl std::fmt::Debug for OpenAiAssistantsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistantsClient")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Paginated list envelope.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

impl OpenAiAssistantsClient {
    /// Create a new client with the given settings.
    #[must_use]
    pub fn new(settings: AssistantSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.settings.base_url.trim_end_matches('/'));
        let mut rb = self
            .http
            .request(method, url)
            .header("OpenAI-Beta", ASSISTANTS_BETA);
        if let Some(key) = &self.settings.api_key {
            rb = rb.bearer_auth(key);
        }
        rb
    }

    async fn send<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
        what: &str,
    ) -> Result<T, RuntimeError> {
        let resp = rb.send().await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RuntimeError::NotFound(what.to_string()));
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RuntimeError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RuntimeError::InvalidResponse(format!("{what}: {e}")))
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait::async_trait]
impl AssistantRuntime for OpenAiAssistantsClient {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, RuntimeError> {
        let rb = self.request(Method::GET, &format!("/v1/assistants/{assistant_id}"));
        self.send(rb, &format!("assistant {assistant_id}")).await
    }

    async fn create_thread(&self) -> Result<Thread, RuntimeError> {
        let rb = self.request(Method::POST, "/v1/threads").json(&json!({}));
        self.send(rb, "thread").await
    }

    async fn add_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, RuntimeError> {
        let rb = self
            .request(Method::POST, &format!("/v1/threads/{thread_id}/messages"))
            .json(&json!({ "role": role, "content": content }));
        self.send(rb, &format!("thread {thread_id}")).await
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, RuntimeError> {
        let rb = self
            .request(Method::POST, &format!("/v1/threads/{thread_id}/runs"))
            .json(&json!({ "assistant_id": assistant_id }));
        self.send(rb, &format!("thread {thread_id}")).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RuntimeError> {
        let rb = self.request(
            Method::GET,
            &format!("/v1/threads/{thread_id}/runs/{run_id}"),
        );
        self.send(rb, &format!("run {run_id}")).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, RuntimeError> {
        let rb = self
            .request(
                Method::POST,
                &format!("/v1/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            )
            .json(&json!({ "tool_outputs": outputs }));
        self.send(rb, &format!("run {run_id}")).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RuntimeError> {
        let rb = self.request(
            Method::POST,
            &format!("/v1/threads/{thread_id}/runs/{run_id}/cancel"),
        );
        self.send(rb, &format!("run {run_id}")).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, RuntimeError> {
        let rb = self.request(Method::GET, &format!("/v1/threads/{thread_id}/messages"));
        let list: ListResponse<ThreadMessage> =
            self.send(rb, &format!("thread {thread_id}")).await?;
        Ok(list.data)
    }
}
