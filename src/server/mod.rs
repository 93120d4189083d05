//! HTTP server for the cascade merge bot.
//!
//! This module implements the HTTP server that:
//! - Accepts Bitbucket webhooks, checks the shared key, and starts handling
//! - Answers reachability and health probes
//!
//! # Endpoints
//!
//! - `POST /cascading-merge?key=<secret>` - Accepts Bitbucket webhook deliveries (returns 200)
//! - `GET /cascading-merge` - Reachability probe (returns 200)
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use tower_http::trace::TraceLayer;

use crate::dispatch::EventDispatcher;
use crate::effects::Platform;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{probe_handler, webhook_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
pub struct AppState<P: Platform> {
    inner: Arc<AppStateInner<P>>,
}

struct AppStateInner<P: Platform> {
    dispatcher: EventDispatcher<P>,

    /// Expected value of the `key` query parameter.
    shared_key: Vec<u8>,
}

impl<P: Platform> Clone for AppState<P> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Platform> AppState<P> {
    /// Creates a new `AppState`.
    pub fn new(dispatcher: EventDispatcher<P>, shared_key: impl Into<Vec<u8>>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                dispatcher,
                shared_key: shared_key.into(),
            }),
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher<P> {
        &self.inner.dispatcher
    }

    pub fn shared_key(&self) -> &[u8] {
        &self.inner.shared_key
    }
}

/// Builds the axum Router with all endpoints.
///
/// Methods other than POST and GET on `/cascading-merge` get 405.
pub fn build_router<P: Platform>(app_state: AppState<P>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route(
            "/cascading-merge",
            post(webhook_handler::<P>).get(probe_handler),
        )
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::dispatch::DispatcherConfig;
    use crate::effects::PlatformEffect;
    use crate::test_utils::MockPlatform;

    const KEY: &str = "s3cret";

    fn test_router(platform: &MockPlatform) -> axum::Router {
        let dispatcher = EventDispatcher::new(
            platform.clone(),
            DispatcherConfig::new("release/", "develop"),
        );
        build_router(AppState::new(dispatcher, KEY))
    }

    fn webhook_request(uri: &str, event_key: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-event-key", event_key)
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn merged_body() -> serde_json::Value {
        serde_json::json!({
            "pullrequest": {
                "id": 9,
                "source": { "branch": { "name": "bugfix/y" } },
                "destination": { "branch": { "name": "release/1.0" } },
                "author": { "uuid": "{author}" }
            },
            "repository": { "full_name": "acme/widgets" }
        })
    }

    /// Waits for the detached handling task to reach the platform.
    async fn wait_for_effects(platform: &MockPlatform, count: usize) -> Vec<PlatformEffect> {
        for _ in 0..200 {
            let effects = platform.effects();
            if effects.len() >= count {
                return effects;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        platform.effects()
    }

    // ─── Health and probe ───

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_router(&MockPlatform::new());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn get_cascading_merge_returns_200() {
        let app = test_router(&MockPlatform::new());

        let request = Request::builder()
            .uri("/cascading-merge")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn other_methods_return_405() {
        let app = test_router(&MockPlatform::new());

        for method in ["PUT", "DELETE", "PATCH"] {
            let request = Request::builder()
                .method(method)
                .uri("/cascading-merge")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        }
    }

    // ─── Webhook ───

    #[tokio::test]
    async fn webhook_with_valid_key_returns_empty_object_and_cascades() {
        let platform = MockPlatform::new()
            .with_branches(&["release/1.0", "release/1.1"]);
        let app = test_router(&platform);

        let request = webhook_request(
            "/cascading-merge?key=s3cret",
            "pullrequest:fulfilled",
            &merged_body(),
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"{}");

        let effects = wait_for_effects(&platform, 3).await;
        assert!(effects.contains(&PlatformEffect::ListBranches {
            name_prefix: "release/".to_string()
        }));
        assert_eq!(platform.created_requests().len(), 1);
    }

    #[tokio::test]
    async fn webhook_with_wrong_key_returns_401_and_does_nothing() {
        let platform = MockPlatform::new().with_branches(&["release/1.0", "release/1.1"]);
        let app = test_router(&platform);

        let request = webhook_request(
            "/cascading-merge?key=guess",
            "pullrequest:fulfilled",
            &merged_body(),
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(platform.effects().is_empty());
    }

    #[tokio::test]
    async fn webhook_without_key_returns_401() {
        let app = test_router(&MockPlatform::new());

        let request = webhook_request("/cascading-merge", "pullrequest:fulfilled", &merged_body());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn repeated_key_uses_first_value() {
        let platform = MockPlatform::new();
        let app = test_router(&platform);

        let request = webhook_request(
            "/cascading-merge?key=guess&key=s3cret",
            "pullrequest:fulfilled",
            &merged_body(),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = webhook_request(
            "/cascading-merge?key=s3cret&key=guess",
            "repo:commit_status_updated",
            &serde_json::json!({ "repository": { "full_name": "acme/widgets" } }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_payload_still_returns_200() {
        let platform = MockPlatform::new();
        let app = test_router(&platform);

        let request = Request::builder()
            .method("POST")
            .uri("/cascading-merge?key=s3cret")
            .header("x-event-key", "pullrequest:fulfilled")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(platform.effects().is_empty());
    }

    #[tokio::test]
    async fn other_event_key_rechecks_cascade_pull_requests() {
        let platform = MockPlatform::new();
        let app = test_router(&platform);

        let request = webhook_request(
            "/cascading-merge?key=s3cret",
            "repo:commit_status_updated",
            &serde_json::json!({ "repository": { "full_name": "acme/widgets" } }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let effects = wait_for_effects(&platform, 1).await;
        assert!(matches!(
            effects.as_slice(),
            [PlatformEffect::ListOpenPullRequestsByTitle { .. }]
        ));
    }
}
