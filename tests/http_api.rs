// Router-level tests for the HTTP surface, exercising auth, validation,
// execution, and response shapes without binding a real socket.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use cmdgate::config::{Config, ServiceMode};
use cmdgate::server;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "test-secret";

fn router(mode: ServiceMode, token: Option<&str>) -> Router {
    let config = Config {
        mode,
        token: token.map(String::from),
        ..Config::default()
    };
    server::router(Arc::new(config))
}

fn direct_router() -> Router {
    router(ServiceMode::Direct, Some(TOKEN))
}

fn tasks_router() -> Router {
    router(ServiceMode::Tasks, Some(TOKEN))
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_run(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/run")
        .header("Authorization", format!("Bearer {TOKEN}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = direct_router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"ok": true}));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    // Registration may already have happened in another test.
    let _ = cmdgate::metrics::init();

    // Drive one recorded request so the request counter family exists.
    let unauthorized = Request::builder()
        .method("POST")
        .uri("/run")
        .body(Body::empty())
        .unwrap();
    let _ = direct_router().oneshot(unauthorized).await.unwrap();

    let response = direct_router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn test_tasks_listing_direct_mode() {
    let response = direct_router()
        .oneshot(Request::get("/tasks").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["mode"], "direct_command");
    assert!(json["usage"].is_string());
}

#[tokio::test]
async fn test_tasks_listing_tasks_mode() {
    let response = tasks_router()
        .oneshot(Request::get("/tasks").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["mode"], "task_allowlist");
    let names: Vec<&str> = json["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(names.contains(&"uptime"));
    assert!(names.contains(&"hostname"));
}

#[tokio::test]
async fn test_run_missing_auth_header() {
    let request = Request::builder()
        .method("POST")
        .uri("/run")
        .body(Body::from("echo hi"))
        .unwrap();
    let response = direct_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("unauthorized"));
}

#[tokio::test]
async fn test_run_wrong_token() {
    let request = Request::builder()
        .method("POST")
        .uri("/run")
        .header("Authorization", "Bearer wrong")
        .body(Body::from("echo hi"))
        .unwrap();
    let response = direct_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_run_unauthorized_when_no_token_configured() {
    // No token in the environment means nothing can authorize.
    let request = post_run("echo hi");
    let response = router(ServiceMode::Direct, None)
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_run_blocked_command_is_403_and_never_runs() {
    let response = direct_router().oneshot(post_run("reboot")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "blocked command: power control command");
}

#[tokio::test]
async fn test_run_empty_body_is_400() {
    let response = direct_router().oneshot(post_run("   ")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("missing command"));
}

#[tokio::test]
async fn test_run_success_shape() {
    let response = direct_router()
        .oneshot(post_run("echo hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["command"], "echo hello");
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["timed_out"], false);
    assert_eq!(json["output"], "hello\n");
    // Success responses never carry an error field.
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_run_nonzero_exit_is_200() {
    let response = direct_router().oneshot(post_run("exit 3")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["exit_code"], 3);
    assert_eq!(json["timed_out"], false);
}

#[tokio::test]
async fn test_run_json_quoted_body_round_trip() {
    // A command with characters requiring escaping survives the JSON
    // round trip verbatim.
    let command = "echo \"quoted\"";
    let body = serde_json::to_string(command).unwrap();
    let response = direct_router().oneshot(post_run(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["command"], command);
    assert_eq!(json["output"], "quoted\n");
}

#[tokio::test]
async fn test_run_endpoint_absent_in_tasks_mode() {
    let response = tasks_router().oneshot(post_run("echo hi")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn post_task(name: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/run/{name}"));
    if let Some(token) = token {
        builder = builder.header("X-Token", token);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_task_missing_x_token() {
    let response = tasks_router()
        .oneshot(post_task("hostname", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("X-Token"));
}

#[tokio::test]
async fn test_task_bearer_header_does_not_authorize() {
    let request = Request::builder()
        .method("POST")
        .uri("/run/hostname")
        .header("Authorization", format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let response = tasks_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_task_unknown_name_is_400() {
    let response = tasks_router()
        .oneshot(post_task("not-a-task", Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "task not allowed");
}

#[tokio::test]
async fn test_task_invalid_name_is_400() {
    let response = tasks_router()
        .oneshot(post_task("bad.name", Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid task name");
}

#[tokio::test]
async fn test_task_success_shape() {
    let response = tasks_router()
        .oneshot(post_task("hostname", Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["task"], "hostname");
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["timed_out"], false);
    assert!(!json["output"].as_str().unwrap().is_empty());
}
