//! 전체 API 라우터 통합 테스트 (인메모리 저장소 + 고정 제공자)

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use monitor_analytics::AnomalyConfig;
use monitor_api::routes::create_api_router;
use monitor_api::AppState;
use monitor_collector::modules::RunCoordinator;
use monitor_collector::CollectorConfig;
use monitor_core::{
    Cadence, CollectionRun, ObservationValue, ProviderObservation, RunStatus, RunType, Series,
    SeriesCatalog,
};
use monitor_data::{DataError, MemoryStore, MonitorStore, ObservationProvider};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

/// `BROKEN`은 항상 실패, 나머지는 매일 2.5를 반환
struct FixedProvider;

#[async_trait]
impl ObservationProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch_observations(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> monitor_data::Result<Vec<ProviderObservation>> {
        if series_id == "BROKEN" {
            return Err(DataError::FetchError("upstream 500".to_string()));
        }
        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| ProviderObservation::new(d, ObservationValue::Value(2.5)))
            .collect())
    }
}

fn app() -> Router {
    let store: Arc<dyn MonitorStore> = Arc::new(MemoryStore::new());
    let catalog = Arc::new(SeriesCatalog::new(vec![
        Series::new("DFF", "Federal Funds Effective Rate", Cadence::Daily),
        Series::new("DGS10", "10-Year Treasury Yield", Cadence::Daily),
        Series::new("BROKEN", "Always failing", Cadence::Daily),
    ]));
    let config = CollectorConfig {
        full_sync_years: 1,
        ..CollectorConfig::default()
    };
    let coordinator = Arc::new(RunCoordinator::new(
        Arc::clone(&catalog),
        Arc::clone(&store),
        Arc::new(FixedProvider),
        &config,
    ));
    let state = AppState::new(
        store,
        catalog,
        coordinator,
        AnomalyConfig::default(),
        SecretString::from("s3cret"),
    );
    create_api_router().with_state(Arc::new(state))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn collect_with_bearer(body: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/collect")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_routes_are_nested() {
    let app = app();

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, json) = call(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["components"]["catalog"]["message"], "3 series tracked");
}

#[tokio::test]
async fn test_bearer_with_wrong_secret_is_rejected() {
    let app = app();
    let (status, json) = call(&app, collect_with_bearer("{}", "guess")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test(start_paused = true)]
async fn test_partial_run_is_visible_in_stats_and_checkpoints() {
    let app = app();

    let (status, json) = call(&app, collect_with_bearer(r#"{"mode":"daily"}"#, "s3cret")).await;
    assert_eq!(status, StatusCode::OK);

    let run: CollectionRun = serde_json::from_value(json).unwrap();
    assert_eq!(run.run_type, RunType::Manual);
    assert_eq!(run.total_series, 3);
    assert_eq!(run.failed_series, 1);
    assert_eq!(run.status, RunStatus::Partial);
    assert!(run.errors.contains_key("BROKEN"));

    let (status, json) = call(&app, get("/api/v1/collect/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stats"]["last_run"]["id"], run.id.to_string());
    assert_eq!(json["stats"]["series_counts"]["daily"], 3);

    let (status, json) = call(
        &app,
        get(&format!("/api/v1/collect/checkpoints?runId={}&source=BROKEN", run.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let checkpoints = json["checkpoints"].as_array().unwrap();
    assert!(checkpoints.iter().any(|c| c["status"] == "error"));
    assert!(checkpoints.iter().all(|c| c["source"] == "BROKEN"));
}

#[tokio::test(start_paused = true)]
async fn test_series_scan_after_collection() {
    let app = app();

    let (status, _) = call(
        &app,
        collect_with_bearer(r#"{"mode":"incremental","seriesIds":["dff"]}"#, "s3cret"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 상수 시계열은 z = 0
    let (status, json) = call(&app, get("/api/v1/anomaly/series/DFF")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], 2.5);
    assert_eq!(json["zScore"], 0.0);
    assert_eq!(json["isAnomalous"], false);

    let (status, _) = call(&app, get("/api/v1/anomaly/series/DGS10")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkpoints_rejects_malformed_run_id() {
    let app = app();
    let response = app
        .oneshot(get("/api/v1/collect/checkpoints?runId=not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
