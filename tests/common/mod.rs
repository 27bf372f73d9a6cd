//! Shared test doubles for the assistant runtime and the content API.

#![allow(dead_code)]

use assistant_relay::assistant::{
    Assistant, AssistantRuntime, MessageRole, RequiredAction, Run, RunError, RunStatus,
    SubmitToolOutputs, Thread, ThreadMessage, ToolCall, ToolOutput,
};
use assistant_relay::config::{
    AppConfig, AssistantConfig, ContentConfig, ResilienceConfig, ServerConfig,
};
use assistant_relay::content::{ContentSource, LabHierarchy};
use assistant_relay::error::{LookupError, RuntimeError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const THREAD_ID: &str = "thread_test";
pub const RUN_ID: &str = "run_test";

// =============================================================================
// Run builders
// =============================================================================

pub fn run(status: RunStatus) -> Run {
    Run {
        id: RUN_ID.to_string(),
        thread_id: THREAD_ID.to_string(),
        status,
        last_error: None,
        required_action: None,
    }
}

pub fn failed_run(message: &str) -> Run {
    Run {
        last_error: Some(RunError {
            code: Some("server_error".to_string()),
            message: message.to_string(),
        }),
        ..run(RunStatus::Failed)
    }
}

pub fn run_requiring(tool_calls: Vec<ToolCall>) -> Run {
    Run {
        required_action: Some(RequiredAction {
            submit_tool_outputs: SubmitToolOutputs { tool_calls },
        }),
        ..run(RunStatus::RequiresAction)
    }
}

// =============================================================================
// Fake assistant runtime
// =============================================================================

/// One scripted answer to `retrieve_run`.
#[derive(Debug, Clone)]
pub enum Step {
    Status(Run),
    Fail,
    /// The fetch never resolves.
    Hang,
}

/// What the fake runtime was asked to do.
#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub assistant_lookups: usize,
    pub threads_created: usize,
    pub messages_added: Vec<String>,
    pub runs_created: usize,
    pub run_fetches: usize,
    pub submissions: Vec<Vec<ToolOutput>>,
    pub cancels: usize,
    pub message_lists: usize,
}

/// In-memory assistant runtime driven by a script of run statuses.
///
/// Once the script is exhausted, the last scripted run is returned again.
#[derive(Debug)]
pub struct FakeRuntime {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Run>,
    thread_messages: Mutex<Vec<ThreadMessage>>,
    calls: Mutex<Calls>,
    fail_cancel: bool,
    hang_submit: bool,
}

impl FakeRuntime {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(run(RunStatus::Queued)),
            thread_messages: Mutex::new(vec![ThreadMessage::assistant_text(["Hola, ¿en qué puedo ayudarte?"])]),
            calls: Mutex::new(Calls::default()),
            fail_cancel: false,
            hang_submit: false,
        }
    }

    /// Runtime whose run completes on the first status fetch.
    pub fn completing() -> Self {
        Self::new(vec![Step::Status(run(RunStatus::Completed))])
    }

    #[must_use]
    pub fn with_thread_messages(self, messages: Vec<ThreadMessage>) -> Self {
        *self.thread_messages.lock().unwrap() = messages;
        self
    }

    #[must_use]
    pub fn with_failing_cancel(mut self) -> Self {
        self.fail_cancel = true;
        self
    }

    #[must_use]
    pub fn with_hanging_submit(mut self) -> Self {
        self.hang_submit = true;
        self
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }

    fn unavailable() -> RuntimeError {
        RuntimeError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl AssistantRuntime for FakeRuntime {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, RuntimeError> {
        self.calls.lock().unwrap().assistant_lookups += 1;
        if assistant_id == "asst_missing" {
            return Err(RuntimeError::NotFound(format!("assistant {assistant_id}")));
        }
        Ok(Assistant {
            id: assistant_id.to_string(),
            name: Some("Tutor".to_string()),
        })
    }

    async fn create_thread(&self) -> Result<Thread, RuntimeError> {
        self.calls.lock().unwrap().threads_created += 1;
        Ok(Thread {
            id: THREAD_ID.to_string(),
        })
    }

    async fn add_message(
        &self,
        _thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, RuntimeError> {
        self.calls
            .lock()
            .unwrap()
            .messages_added
            .push(content.to_string());
        Ok(ThreadMessage {
            id: "msg_user".to_string(),
            role,
            content: vec![],
        })
    }

    async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<Run, RuntimeError> {
        self.calls.lock().unwrap().runs_created += 1;
        Ok(run(RunStatus::Queued))
    }

    async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, RuntimeError> {
        self.calls.lock().unwrap().run_fetches += 1;
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Status(run)) => {
                *self.last.lock().unwrap() = run.clone();
                Ok(run)
            }
            Some(Step::Fail) => Err(Self::unavailable()),
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, RuntimeError> {
        if self.hang_submit {
            return std::future::pending().await;
        }
        self.calls.lock().unwrap().submissions.push(outputs.to_vec());
        Ok(run(RunStatus::Queued))
    }

    async fn cancel_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, RuntimeError> {
        self.calls.lock().unwrap().cancels += 1;
        if self.fail_cancel {
            return Err(Self::unavailable());
        }
        Ok(run(RunStatus::Cancelling))
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, RuntimeError> {
        self.calls.lock().unwrap().message_lists += 1;
        Ok(self.thread_messages.lock().unwrap().clone())
    }
}

// =============================================================================
// Fixture content
// =============================================================================

/// Content source serving one fixed hierarchy.
#[derive(Debug)]
pub struct FixtureContent {
    hierarchy: LabHierarchy,
}

impl FixtureContent {
    pub fn labs() -> Self {
        let hierarchy = serde_json::from_value(json!({
            "laboratories": [{
                "name": "Ohm",
                "displayName": "Ley de Ohm",
                "modules": [
                    { "displayName": "Introducción", "challenges": [{ "name": "Reto 1" }] },
                    { "displayName": "Circuitos", "challenges": [{ "name": "Reto 2" }, { "name": "Reto 3" }] }
                ]
            }]
        }))
        .expect("valid fixture");
        Self { hierarchy }
    }
}

#[async_trait]
impl ContentSource for FixtureContent {
    async fn fetch_hierarchy(&self, _account_id: &str) -> Result<LabHierarchy, LookupError> {
        Ok(self.hierarchy.clone())
    }
}

// =============================================================================
// Config
// =============================================================================

/// Configuration with a fast polling policy for HTTP-level tests.
pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        assistant: AssistantConfig {
            api_key: "sk-test".to_string(),
            base_url: "http://localhost".to_string(),
            poll_timeout_ms: 2_000,
            poll_interval_ms: 1,
            retry_backoff_ms: 1,
            max_retries: 3,
        },
        content: ContentConfig {
            base_url: "http://localhost".to_string(),
            account_id: "1065649585".to_string(),
        },
        resilience: ResilienceConfig {
            rate_limit_enabled: true,
            rate_limit_max: 100,
            rate_limit_window_secs: 60,
            request_timeout_secs: 30,
        },
    }
}
