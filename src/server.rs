// HTTP surface for the command-execution service
//
// Routes (by service mode):
//   GET  /health      -> {"ok":true}
//   GET  /metrics     -> Prometheus text format
//   GET  /tasks       -> usage descriptor (direct) or task names (tasks)
//   POST /run         -> run a free-form command (direct mode)
//   POST /run/{task}  -> run an allowlisted task (tasks mode)
//
// Auth runs before any command logic: direct mode reads
// `Authorization: Bearer <token>`, tasks mode reads `X-Token: <token>`.

use crate::config::{Config, ServiceMode};
use crate::exec::{self, ExecutionResult};
use crate::metrics;
use crate::tasks;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

const UNAUTHORIZED_BEARER: &str =
    "unauthorized: expected Authorization header (Bearer <token>)";
const UNAUTHORIZED_X_TOKEN: &str = "unauthorized: expected X-Token header";

/// Error responses carried back to the caller as `{"error": ...}`.
///
/// Non-zero exit codes and timeouts are deliberately NOT here: once the
/// child ran, the outcome is a 200 response carrying `exit_code` and
/// `timed_out` for the caller to interpret.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or mismatched token, or no token configured at all.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The command matched the denylist; never executed.
    #[error("{0}")]
    Blocked(String),

    /// Empty, oversized, unknown-task, or resource failures.
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Blocked(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router for the configured service mode.
pub fn router(config: Arc<Config>) -> Router {
    let routes = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/tasks", get(tasks_handler));

    let routes = match config.mode {
        ServiceMode::Direct => routes.route("/run", post(run_command_handler)),
        ServiceMode::Tasks => routes.route("/run/{task}", post(run_task_handler)),
    };

    routes.layer(TraceLayer::new_for_http()).with_state(config)
}

/// Bind and serve until terminated by the host process manager.
pub async fn serve(config: Arc<Config>) -> Result<()> {
    let addr = SocketAddr::new(config.bind_addr, config.port);
    let app = router(config);

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error gathering metrics: {}", e),
        )
            .into_response(),
    }
}

async fn tasks_handler(State(config): State<Arc<Config>>) -> Json<Value> {
    match config.mode {
        ServiceMode::Direct => Json(json!({
            "mode": "direct_command",
            "usage": "POST /run with raw command body",
            "auth": "Authorization: Bearer <token>",
        })),
        ServiceMode::Tasks => Json(json!({
            "mode": "task_allowlist",
            "tasks": tasks::names(),
        })),
    }
}

async fn run_command_handler(
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize_bearer(&config, &headers).inspect_err(|e| record("/run", e.status()))?;

    let command = decode_json_string_like(body.trim());
    let command = command.trim();
    if command.is_empty() {
        record("/run", StatusCode::BAD_REQUEST);
        return Err(ApiError::BadRequest(
            "missing command: send command in request body".to_string(),
        ));
    }

    let result = exec::execute(command, config.command_timeout).await;
    render_result("/run", "command", command, result)
}

async fn run_task_handler(
    State(config): State<Arc<Config>>,
    Path(task): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize_x_token(&config, &headers).inspect_err(|e| record("/run/{task}", e.status()))?;

    if !tasks::is_valid_name(&task) {
        record("/run/{task}", StatusCode::BAD_REQUEST);
        return Err(ApiError::BadRequest("invalid task name".to_string()));
    }

    let result = exec::execute_task(&task, config.task_timeout).await;
    render_result("/run/{task}", "task", &task, result)
}

/// Turn an execution result into the wire shape: failures map to
/// 403 (blocked) or 400 (anything else); successes echo the command or
/// task name verbatim alongside exit status and captured output.
fn render_result(
    endpoint: &'static str,
    key: &str,
    echo: &str,
    result: ExecutionResult,
) -> Result<Json<Value>, ApiError> {
    if !result.accepted {
        let reason = result
            .failure_reason
            .unwrap_or_else(|| "execution failed".to_string());
        let err = if reason.starts_with("blocked command:") {
            ApiError::Blocked(reason)
        } else {
            ApiError::BadRequest(reason)
        };
        record(endpoint, err.status());
        return Err(err);
    }

    record(endpoint, StatusCode::OK);
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), Value::String(echo.to_string()));
    body.insert("exit_code".to_string(), json!(result.exit_code));
    body.insert("timed_out".to_string(), json!(result.timed_out));
    body.insert("output".to_string(), Value::String(result.output));
    Ok(Json(Value::Object(body)))
}

fn record(endpoint: &'static str, status: StatusCode) {
    metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
}

/// Extract the token from an `Authorization` header. The `Bearer ` prefix
/// is matched case-insensitively; a bare token is also accepted.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    let lower = value.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("bearer ") {
        let offset = value.len() - rest.len();
        Some(value[offset..].trim().to_string())
    } else {
        Some(value.to_string())
    }
}

fn authorize_bearer(config: &Config, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = config
        .token
        .as_deref()
        .ok_or(ApiError::Unauthorized(UNAUTHORIZED_BEARER))?;
    match bearer_token(headers) {
        Some(got) if got == expected => Ok(()),
        _ => Err(ApiError::Unauthorized(UNAUTHORIZED_BEARER)),
    }
}

fn authorize_x_token(config: &Config, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = config
        .token
        .as_deref()
        .ok_or(ApiError::Unauthorized(UNAUTHORIZED_X_TOKEN))?;
    let got = headers
        .get("x-token")
        .and_then(|v| v.to_str().ok())
        .map(str::trim);
    match got {
        Some(got) if got == expected => Ok(()),
        _ => Err(ApiError::Unauthorized(UNAUTHORIZED_X_TOKEN)),
    }
}

/// Unescape a request body that arrived as a JSON string literal; anything
/// else is used verbatim.
fn decode_json_string_like(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        if let Ok(decoded) = serde_json::from_str::<String>(raw) {
            return decoded;
        }
    }
    raw.to_string()
}
