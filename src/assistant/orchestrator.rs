//! Run orchestrator with tool loop execution.
//!
//! The orchestrator manages the complete lifecycle of one relayed message:
//! 1. Validate the assistant and create a thread with the user message
//! 2. Start a run and poll its status
//! 3. Execute requested tool calls and submit their outputs
//! 4. Repeat until the run completes, fails, or times out
//! 5. Extract the assistant's reply from the thread
//!
//! Any failure after the run exists cancels it (best effort) before the
//! error is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use assistant_relay::assistant::{OpenAiAssistantsClient, PollPolicy, RunOrchestrator};
//!
//! let runtime = Arc::new(OpenAiAssistantsClient::new(settings));
//! let orchestrator = RunOrchestrator::new(runtime, Arc::new(tools), PollPolicy::default());
//!
//! let reply = orchestrator.handle_message("asst_abc", "Hola").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{RelayError, RuntimeError};
use crate::tools::{ToolDispatcher, ToolRegistry};

use super::{
    ASSISTANT_ID_PREFIX, AssistantRuntime, MessageRole, Run, RunStatus, extractor::extract_reply,
};

/// Timing and retry budget for polling a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum time from run start until the run must leave `queued`/`in_progress`.
    pub timeout: Duration,
    /// Wait between status fetches.
    pub interval: Duration,
    /// Failed status fetches tolerated over the whole run.
    pub max_retries: u32,
    /// Extra wait after a failed status fetch.
    pub retry_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            interval: Duration::from_millis(1_000),
            max_retries: 3,
            retry_backoff: Duration::from_millis(2_000),
        }
    }
}

/// Where a run stands from the orchestrator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// `queued` or `in_progress`, still inside the deadline.
    Pending,
    /// Waiting for tool outputs.
    RequiresAction,
    /// Finished successfully.
    Completed,
    /// Reported `failed` by the runtime.
    Failed,
    /// Still pending after the deadline passed.
    TimedOut,
    /// Any other status (`cancelled`, `expired`, ...).
    Unexpected(RunStatus),
}

impl RunPhase {
    /// Classify a run status against the polling deadline.
    #[must_use]
    pub fn of(status: RunStatus, deadline: Instant, now: Instant) -> Self {
        match status {
            s if s.is_pending() && now > deadline => Self::TimedOut,
            s if s.is_pending() => Self::Pending,
            RunStatus::RequiresAction => Self::RequiresAction,
            RunStatus::Completed => Self::Completed,
            RunStatus::Failed => Self::Failed,
            other => Self::Unexpected(other),
        }
    }
}

/// Drives assistant runs to completion.
#[derive(Clone)]
pub struct RunOrchestrator {
    runtime: Arc<dyn AssistantRuntime>,
    dispatcher: ToolDispatcher,
    policy: PollPolicy,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("policy", &self.policy)
            .field("tools", self.dispatcher.registry())
            .finish()
    }
}

impl RunOrchestrator {
    /// Create a new orchestrator over a runtime and a tool registry.
    pub fn new(
        runtime: Arc<dyn AssistantRuntime>,
        tools: Arc<ToolRegistry>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            runtime,
            dispatcher: ToolDispatcher::new(tools),
            policy,
        }
    }

    /// Get the polling policy.
    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Get the tool registry.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Relay one user message to an assistant and return its reply.
    #[instrument(
        skip(self, user_input),
        fields(
            request_id = tracing::field::Empty,
            thread_id = tracing::field::Empty,
            run_id = tracing::field::Empty
        )
    )]
    pub async fn handle_message(
        &self,
        assistant_id: &str,
        user_input: &str,
    ) -> Result<String, RelayError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        validate_assistant_id(assistant_id)?;

        self.runtime
            .retrieve_assistant(assistant_id)
            .await
            .map_err(|e| match e {
                RuntimeError::NotFound(_) => RelayError::AssistantNotFound(assistant_id.to_string()),
                other => RelayError::Runtime(other),
            })?;

        let thread = self.runtime.create_thread().await?;
        tracing::Span::current().record("thread_id", thread.id.as_str());

        self.runtime
            .add_message(&thread.id, MessageRole::User, user_input)
            .await?;

        let run = self.runtime.create_run(&thread.id, assistant_id).await?;
        tracing::Span::current().record("run_id", run.id.as_str());
        tracing::info!(
            name: "assistant.run.created",
            thread_id = %thread.id,
            run_id = %run.id,
            status = %run.status,
            "Run created"
        );

        let result = match self.poll_run(&thread.id, &run.id).await {
            Ok(()) => extract_reply(self.runtime.as_ref(), &thread.id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => {
                tracing::info!(
                    thread_id = %thread.id,
                    run_id = %run.id,
                    reply_length = reply.len(),
                    "Run completed"
                );
                Ok(reply)
            }
            Err(e) => {
                tracing::error!(
                    thread_id = %thread.id,
                    run_id = %run.id,
                    error = %e,
                    "Run failed, cancelling"
                );
                self.cancel_run(&thread.id, &run.id).await;
                Err(e)
            }
        }
    }

    /// Poll a run until it completes.
    ///
    /// The deadline is fixed when polling starts and bounds every upstream
    /// call and tool batch awaited here, not only the status check. Status
    /// fetch failures are retried until `max_retries` failures have
    /// accumulated; the next one is returned.
    pub async fn poll_run(&self, thread_id: &str, run_id: &str) -> Result<(), RelayError> {
        let deadline = Instant::now() + self.policy.timeout;
        let mut failures = 0_u32;
        let fetch = self.runtime.retrieve_run(thread_id, run_id);
        let mut run = self.before_deadline(deadline, run_id, fetch).await??;

        loop {
            let phase = RunPhase::of(run.status, deadline, Instant::now());
            tracing::debug!(
                thread_id = %thread_id,
                run_id = %run_id,
                status = %run.status,
                phase = ?phase,
                "Run status"
            );

            match phase {
                RunPhase::Pending => {
                    sleep(self.policy.interval).await;
                    let fetch = self.runtime.retrieve_run(thread_id, run_id);
                    let fetched = self.before_deadline(deadline, run_id, fetch).await?;
                    match fetched {
                        Ok(next) => run = next,
                        Err(e) => {
                            failures += 1;
                            if failures > self.policy.max_retries {
                                return Err(e.into());
                            }
                            tracing::warn!(
                                run_id = %run_id,
                                attempt = failures,
                                max_retries = self.policy.max_retries,
                                error = %e,
                                "Run status fetch failed, retrying"
                            );
                            sleep(self.policy.retry_backoff).await;
                        }
                    }
                }
                RunPhase::RequiresAction => {
                    run = self.submit_tool_calls(thread_id, &run, deadline).await?;
                }
                RunPhase::Completed => return Ok(()),
                RunPhase::Failed => {
                    return Err(RelayError::RunFailed(run.failure_reason().to_string()));
                }
                RunPhase::TimedOut => {
                    tracing::error!(
                        run_id = %run_id,
                        timeout = ?self.policy.timeout,
                        "Run timed out"
                    );
                    return Err(RelayError::Timeout);
                }
                RunPhase::Unexpected(status) => return Err(RelayError::UnexpectedStatus(status)),
            }
        }
    }

    /// Execute the run's pending tool calls, submit the outputs, and return
    /// the freshly fetched run.
    async fn submit_tool_calls(
        &self,
        thread_id: &str,
        run: &Run,
        deadline: Instant,
    ) -> Result<Run, RelayError> {
        let tool_calls = run
            .tool_calls()
            .ok_or_else(|| RelayError::MissingToolCalls(run.id.clone()))?;

        for call in tool_calls {
            tracing::info!(
                run_id = %run.id,
                tool_call_id = %call.id,
                tool_name = %call.function.name,
                "Tool call requested"
            );
        }

        let outputs = self
            .before_deadline(deadline, &run.id, self.dispatcher.dispatch(tool_calls))
            .await??;
        self.before_deadline(
            deadline,
            &run.id,
            self.runtime.submit_tool_outputs(thread_id, &run.id, &outputs),
        )
        .await??;

        tracing::info!(
            run_id = %run.id,
            output_count = outputs.len(),
            "Tool outputs submitted"
        );

        let fetch = self.runtime.retrieve_run(thread_id, &run.id);
        Ok(self.before_deadline(deadline, &run.id, fetch).await??)
    }

    /// Await `step`, or fail with [`RelayError::Timeout`] once `deadline` passes.
    async fn before_deadline<F: Future>(
        &self,
        deadline: Instant,
        run_id: &str,
        step: F,
    ) -> Result<F::Output, RelayError> {
        timeout_at(deadline, step).await.map_err(|elapsed| {
            tracing::error!(
                run_id = %run_id,
                timeout = ?self.policy.timeout,
                error = %elapsed,
                "Run timed out waiting on upstream"
            );
            RelayError::Timeout
        })
    }

    /// Best-effort cancellation; failures are logged and swallowed.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) {
        match self.runtime.cancel_run(thread_id, run_id).await {
            Ok(run) => tracing::info!(run_id = %run_id, status = %run.status, "Run cancelled"),
            Err(e) => tracing::warn!(run_id = %run_id, error = %e, "Error cancelando run"),
        }
    }
}

/// Reject assistant ids that cannot have been issued by the runtime.
pub fn validate_assistant_id(assistant_id: &str) -> Result<(), RelayError> {
    if assistant_id.starts_with(ASSISTANT_ID_PREFIX) {
        Ok(())
    } else {
        Err(RelayError::Validation(format!(
            "ID de asistente inválido: debe comenzar con '{ASSISTANT_ID_PREFIX}'"
        )))
    }
}
