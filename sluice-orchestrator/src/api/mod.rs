//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod event;
pub mod health;
pub mod ingestion;
pub mod outputs;
pub mod run;

use axum::{
    Router,
    routing::{get, post},
};
use sluice_core::dto::outputs::Outputs;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::repository::ingestion_repository::IngestionHistory;
use crate::repository::run_repository::RunRepository;
use crate::service::alert::MemorySubscriber;
use crate::service::dispatcher::EventTriggerDispatcher;
use crate::service::ingestion::IngestionTask;
use crate::substrate::JobEventBus;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub runs: Arc<dyn RunRepository>,
    pub dispatcher: Arc<EventTriggerDispatcher>,
    pub bus: JobEventBus,
    /// Absent when no ingestion endpoint is configured
    pub ingestion: Option<Arc<IngestionTask>>,
    pub ingestion_history: Arc<IngestionHistory>,
    pub alert_log: Arc<MemorySubscriber>,
    pub outputs: Arc<Outputs>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Run history
        .route("/runs", get(run::list_runs))
        .route("/runs/{id}", get(run::get_run))
        // Notifications
        .route(
            "/events/storage",
            post(event::post_storage_event).get(event::list_storage_events),
        )
        .route("/events/job-state", post(event::post_job_state))
        // Ingestion
        .route("/ingestion/trigger", post(ingestion::trigger_ingestion))
        .route("/ingestion/history", get(ingestion::ingestion_history))
        // Operator views
        .route("/alerts", get(outputs::list_alerts))
        .route("/outputs", get(outputs::get_outputs))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Services;
    use crate::config::Config;
    use crate::substrate::{ScriptedExecutor, ScriptedRun};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use sluice_core::domain::job::JobState;
    use std::time::Duration;
    use tower::ServiceExt;

    fn services() -> Services {
        let executor = Arc::new(ScriptedExecutor::new(ScriptedRun::new(
            Duration::from_secs(1),
            JobState::Succeeded,
        )));
        let config = Config {
            landing_root: std::env::temp_dir().join("sluice-api-tests"),
            ..Config::default()
        };
        Services::build(config, executor)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(services().state());
        let (status, body) = send(app, get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_storage_notification_starts_run() {
        let services = services();
        let app = create_router(services.state());

        let notification = json!({
            "bucket": { "name": "data-landing-zone" },
            "object": { "key": "daa_market/2024/6/daa_market.csv" },
            "eventType": "Created"
        });
        let (status, body) = send(app.clone(), post_json("/events/storage", notification)).await;

        assert_eq!(status, StatusCode::OK);
        let run_ids = body["run_ids"].as_array().unwrap();
        assert_eq!(run_ids.len(), 1);

        let uri = format!("/runs/{}", run_ids[0].as_str().unwrap());
        let (status, run) = send(app.clone(), get_request(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["input_key"], "daa_market/2024/6/daa_market.csv");

        let (_, events) = send(app, get_request("/events/storage")).await;
        assert_eq!(events.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_prefix_starts_nothing() {
        let app = create_router(services().state());
        let notification = json!({
            "bucket": { "name": "data-landing-zone" },
            "object": { "key": "archive/old.csv" },
            "eventType": "Created"
        });

        let (status, body) = send(app, post_json("/events/storage", notification)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["run_ids"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_run_is_404() {
        let app = create_router(services().state());
        let uri = format!("/runs/{}", uuid::Uuid::new_v4());

        let (status, body) = send(app, get_request(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_job_state_notification_reaches_alerts() {
        let mut services = services();
        let (shutdown, _) = tokio::sync::broadcast::channel(1);
        let handles = services.start(&shutdown);
        let app = create_router(services.state());

        let (status, _) = send(
            app.clone(),
            post_json(
                "/events/job-state",
                json!({ "crawlerName": "energy-market-crawler", "state": "Failed" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let (_, alerts) = send(app, get_request("/alerts")).await;
        let alerts = alerts.as_array().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["name"], "energy-market-crawler");
        assert_eq!(alerts[0]["source"], "CrawlJob");

        let _ = shutdown.send(());
        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_invalid_job_state_notification_rejected() {
        let app = create_router(services().state());
        let (status, body) = send(
            app,
            post_json("/events/job-state", json!({ "state": "FAILED" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_trigger_without_ingestion_url() {
        let app = create_router(services().state());
        let request = Request::builder()
            .method("POST")
            .uri("/ingestion/trigger")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_outputs() {
        let app = create_router(services().state());
        let (status, body) = send(app, get_request("/outputs")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["landing_bucket"], "data-landing-zone");
        assert_eq!(body["catalog_job_name"], "energy-market-crawler");
        assert_eq!(body["workflow_id"], crate::service::pipeline::WORKFLOW_ID);
    }
}
