use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request, State, rejection::JsonRejection},
    http::{HeaderName, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::assistant::{AssistantRuntime, OpenAiAssistantsClient, RunOrchestrator};
use crate::config::AppConfig;
use crate::content::{ContentApiClient, ContentSource};
use crate::error::RelayError;
use crate::security::rate_limit::{AppRateLimiter, rate_limit_middleware};
use crate::tools::ToolRegistry;

/// Build the service graph against the real runtime and content API.
pub fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    let settings = config.assistant.settings();
    if settings.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; assistant requests will be rejected upstream");
    }

    let runtime: Arc<dyn AssistantRuntime> = Arc::new(OpenAiAssistantsClient::new(settings));
    let content: Arc<dyn ContentSource> = Arc::new(ContentApiClient::new(&config.content.base_url)?);

    Ok(build_state_with(config, runtime, content))
}

/// Build the service graph from explicit runtime and content collaborators.
pub fn build_state_with(
    config: Arc<AppConfig>,
    runtime: Arc<dyn AssistantRuntime>,
    content: Arc<dyn ContentSource>,
) -> AppState {
    let tools = Arc::new(ToolRegistry::with_lab_tools(
        content,
        config.content.account_id.clone(),
    ));

    for name in tools.names() {
        info!(name: "assistant.tool.registered", tool = %name, "Tool registered");
    }
    tracing::debug!(definitions = ?tools.openai_tools_json(), "Tool definitions");

    let orchestrator = Arc::new(RunOrchestrator::new(
        runtime,
        tools,
        config.assistant.poll_policy(),
    ));

    let rate_limiter = Arc::new(AppRateLimiter::new(
        config.resilience.rate_limit_max,
        Duration::from_secs(config.resilience.rate_limit_window_secs),
    ));

    AppState {
        orchestrator,
        rate_limiter,
        config,
    }
}

/// Build the HTTP router with all middleware applied.
pub fn router(state: AppState) -> Router {
    let timeout_duration = Duration::from_secs(state.config.resilience.request_timeout_secs);

    Router::new()
        .route("/api/assistants/message", post(api_message))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB limit
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => (
                            StatusCode::REQUEST_TIMEOUT,
                            Json(json!({
                                "error": "Request Timeout",
                                "message": "Request timed out",
                            })),
                        )
                            .into_response(),
                    }
                }
            },
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(cors_layer()),
        )
        .with_state(state)
}

/// CORS policy: any origin, with credentials.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
        .allow_credentials(true)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    info!(
        name: "assistant.config.loaded",
        base_url = %config.assistant.base_url,
        poll_timeout_ms = config.assistant.poll_timeout_ms,
        max_retries = config.assistant.max_retries,
        "Assistant configuration loaded"
    );

    let state = build_state(Arc::clone(&config))?;
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for the message API.
#[derive(Debug, Deserialize)]
struct MessageRequest {
    /// Assistant to relay to (`asst_...`).
    #[serde(rename = "assistantId", default)]
    assistant_id: Option<String>,
    /// User message content.
    #[serde(default)]
    user_input: Option<String>,
}

impl MessageRequest {
    /// Both fields must be present and non-empty.
    fn into_parts(self) -> Result<(String, String), RelayError> {
        match (self.assistant_id, self.user_input) {
            (Some(assistant_id), Some(user_input))
                if !assistant_id.is_empty() && !user_input.is_empty() =>
            {
                Ok((assistant_id, user_input))
            }
            _ => Err(RelayError::Validation(
                "assistantId y user_input son requeridos.".to_string(),
            )),
        }
    }
}

/// Response from the message API.
#[derive(Debug, Serialize)]
struct MessageResponse {
    /// The assistant's reply.
    reply: String,
}

/// POST /api/assistants/message - Relay a message and wait for the reply.
#[tracing::instrument(name = "api.assistants.message", skip_all)]
async fn api_message(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, RelayError> {
    let Json(req) = payload.map_err(|rejection| RelayError::Validation(rejection.body_text()))?;
    let (assistant_id, user_input) = req.into_parts()?;

    tracing::info!(
        assistant_id = %assistant_id,
        input_length = user_input.len(),
        "Received assistant message"
    );

    let reply = state
        .orchestrator
        .handle_message(&assistant_id, &user_input)
        .await?;

    Ok(Json(MessageResponse { reply }))
}

/// GET /health - Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

async fn not_found(req: Request) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Route {} {} not found", req.method(), req.uri().path()),
        })),
    )
        .into_response()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    tracing::error!(panic = %message, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Error interno del servidor",
            "message": message,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_parts_requires_both_fields() {
        let req: MessageRequest =
            serde_json::from_value(json!({ "assistantId": "asst_1", "user_input": "hola" }))
                .unwrap();
        assert_eq!(
            req.into_parts().unwrap(),
            ("asst_1".to_string(), "hola".to_string())
        );

        let req: MessageRequest = serde_json::from_value(json!({ "assistantId": "asst_1" })).unwrap();
        assert!(matches!(req.into_parts(), Err(RelayError::Validation(_))));

        let req: MessageRequest =
            serde_json::from_value(json!({ "assistantId": "", "user_input": "hola" })).unwrap();
        assert!(matches!(req.into_parts(), Err(RelayError::Validation(_))));
    }
}
