//! Integration tests for health check endpoints

mod common;

use std::sync::Arc;

use axum::{body::Body, http::Request, http::StatusCode, Router};
use common::*;
use songline_api::config::GameSettings;
use songline_api::services::{RetryPolicy, UnconfiguredCatalog, UnconfiguredPlayback};
use songline_api::AppContext;
use tower::ServiceExt;

fn create_test_app() -> Router {
    test_context(distinct_tracks(8), Arc::new(RecordingProvider::default())).router()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_root_endpoint() {
    let response = create_test_app().oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();
    assert!(body_str.contains("Songline"));
}

#[tokio::test]
async fn test_simple_health_check() {
    let response = create_test_app().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_liveness_probe() {
    let response = create_test_app()
        .oneshot(get("/health/live"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "alive");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_without_card_source_is_unavailable() {
    let context = AppContext::new(
        Arc::new(UnconfiguredCatalog),
        Arc::new(UnconfiguredPlayback),
        None,
        GameSettings::default(),
        RetryPolicy::default(),
    );

    let response = context.router().oneshot(get("/health/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
}
