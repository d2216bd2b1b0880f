use super::*;
use crate::controller::test_helpers::{Script, ScriptedRunner};
use crate::credentials::CredentialCache;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use std::time::Duration;
use tower::ServiceExt;


const SOURCE: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Helper to create a test MediaDownloader instance wrapped in Arc
async fn create_test_downloader(
    runner: Arc<ScriptedRunner>,
) -> (Arc<MediaDownloader>, tempfile::TempDir) {
    let (downloader, temp_dir) =
        crate::controller::test_helpers::create_test_downloader(runner, CredentialCache::new())
            .await;
    (Arc::new(downloader), temp_dir)
}

fn router_for(downloader: &Arc<MediaDownloader>) -> Router {
    let config = Arc::new(downloader.config().clone());
    create_router(Arc::clone(downloader), config)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(ScriptedRunner::new())).await;

    // Port 0 = OS assigns a free port
    let mut config = downloader.config().clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        async move { start_api_server(downloader, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be running");
    api_handle.abort();
}

#[tokio::test]
async fn test_api_server_reports_bind_failure() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(ScriptedRunner::new())).await;

    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = downloader.config().clone();
    config.api.bind_address = blocker.local_addr().unwrap();

    let result = start_api_server(downloader, Arc::new(config)).await;
    assert!(matches!(result, Err(crate::Error::Io(_))));
}

#[tokio::test]
async fn test_cors_enabled() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(ScriptedRunner::new())).await;

    let mut config = downloader.config().clone();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(ScriptedRunner::new())).await;

    let mut config = downloader.config().clone();
    config.api.cors_enabled = false;
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(ScriptedRunner::new())).await;

    let mut config = downloader.config().clone();
    config.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://allowed.example"
    );
}

#[tokio::test]
async fn test_swagger_ui_toggle() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(ScriptedRunner::new())).await;

    let mut config = downloader.config().clone();
    config.api.swagger_ui = false;
    let app = create_router(Arc::clone(&downloader), Arc::new(config));
    let response = app.oneshot(empty_request("GET", "/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let app = router_for(&downloader);
    let response = app.oneshot(empty_request("GET", "/swagger-ui/")).await.unwrap();
    assert_ne!(response.status(), StatusCode::NOT_FOUND);
}
