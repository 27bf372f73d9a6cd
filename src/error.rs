//! Error taxonomy for the relay.
//!
//! Every fallible operation in the request path returns one of these types.
//! [`RelayError`] is the single error surfaced by the orchestrator and the
//! only one that is mapped onto an HTTP response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::assistant::RunStatus;

/// Errors raised while talking to the assistant runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The requested resource (assistant, thread, run) does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The runtime answered with a non-success status.
    #[error("assistant API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the runtime.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors raised while executing a batch of tool calls.
///
/// Any of these aborts the whole batch; no outputs are submitted.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The run asked for a tool that is not registered.
    #[error("Tool {0} is not implemented")]
    UnknownTool(String),

    /// The argument string of a tool call was not valid JSON.
    #[error("malformed arguments for tool call {call_id}: {source}")]
    MalformedArguments {
        /// Id of the offending tool call.
        call_id: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The arguments parsed but did not match what the tool expects.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments {
        /// Name of the tool.
        tool: String,
        /// What was wrong with the arguments.
        reason: String,
    },

    /// The tool result could not be serialized into an output string.
    #[error("failed to serialize output of tool call {call_id}: {source}")]
    Serialization {
        /// Id of the tool call.
        call_id: String,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the content API client.
///
/// Tool handlers downgrade these into user-facing strings; they never fail a
/// request on their own.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The account has no content.
    #[error("content not found for account {0}")]
    NotFound(String),

    /// The content API could not be reached or answered with an error.
    #[error("content API request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The content API answered with an unexpected status.
    #[error("content API returned status {0}")]
    Status(u16),

    /// The response body did not match the expected hierarchy shape.
    #[error("unexpected content shape: {0}")]
    InvalidShape(String),

    /// The configured base URL could not be combined with the account id.
    #[error("invalid content URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Top-level error for one relayed message.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The request body was missing fields or had invalid values.
    #[error("{0}")]
    Validation(String),

    /// The assistant id does not resolve upstream.
    #[error("assistant '{0}' not found")]
    AssistantNotFound(String),

    /// The run did not finish within the polling budget.
    #[error("Timeout esperando respuesta del asistente")]
    Timeout,

    /// A tool call batch could not be executed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The run reported `failed`.
    #[error("Run falló: {0}")]
    RunFailed(String),

    /// The run reached a status the relay does not handle.
    #[error("Estado inesperado: {0}")]
    UnexpectedStatus(RunStatus),

    /// The run required action but carried no tool calls.
    #[error("run {0} requires action but has no tool calls")]
    MissingToolCalls(String),

    /// The assistant produced no usable text.
    #[error("{0}")]
    EmptyResponse(String),

    /// Transport or API failure while talking to the assistant runtime.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl RelayError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AssistantNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Datos inválidos",
            Self::AssistantNotFound(_) => "Asistente no encontrado",
            _ => "Error procesando la solicitud",
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Generic error label.
    pub error: String,
    /// Human-readable detail.
    pub details: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.label().to_string(),
            details: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
