//! 경제 지표 모니터 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다. 수집 트리거, 스케줄러 통계,
//! 이상 탐지 조회 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use monitor_api::metrics::setup_metrics_recorder;
use monitor_api::middleware::metrics_layer;
use monitor_api::openapi::swagger_ui_router;
use monitor_api::routes::create_api_router;
use monitor_api::state::AppState;
use monitor_collector::modules::{RunCoordinator, RunOptions};
use monitor_collector::CollectorConfig;
use monitor_core::{init_logging, AppConfig, LogConfig, RunMode, RunType, SeriesCatalog};
use monitor_data::{open_store, FredClient, MonitorStore};

/// CORS 레이어 생성.
///
/// `CORS_ORIGINS`(쉼표 구분)가 설정되어 있으면 해당 origin만 허용하고,
/// 없으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let configured = std::env::var("CORS_ORIGINS")
        .ok()
        .filter(|origins| !origins.is_empty());

    let allow_origin = match &configured {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        None => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static(monitor_api::routes::SECRET_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router().with_state(state))
        // OpenAPI 문서 및 Swagger UI
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        // 수집 트리거는 실행 완료까지 대기하므로 타임아웃을 길게 둠
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout(),
        ))
        .layer(cors_layer())
}

/// 요청 타임아웃 (`REQUEST_TIMEOUT_SECS`, 기본 600초).
fn request_timeout() -> Duration {
    let secs = std::env::var("REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(600);
    Duration::from_secs(secs)
}

/// 내장 스케줄러 활성화 여부 (`EMBEDDED_SCHEDULER=true`).
fn is_embedded_scheduler_enabled() -> bool {
    std::env::var("EMBEDDED_SCHEDULER")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON 스펙을 stdout으로 출력하고 종료합니다.
fn handle_export_openapi() -> Result<(), Box<dyn std::error::Error>> {
    use monitor_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;
        println!("{}", json);
        std::process::exit(0);
    }

    Ok(())
}

/// 주기적 증분 수집 태스크.
///
/// 종료 토큰이 취소되면 진행 중인 실행의 체크포인트를 중단 상태로 남기고
/// 종료합니다.
async fn run_scheduler(
    coordinator: Arc<RunCoordinator>,
    interval: Duration,
    shutdown_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => break,
            _ = ticker.tick() => {
                let collection = coordinator.run_collection(RunOptions::new(
                    RunType::Scheduled,
                    RunMode::Incremental,
                ));
                tokio::pin!(collection);

                tokio::select! {
                    _ = shutdown_token.cancelled() => {
                        if let Some(run_id) = coordinator.current_run_id() {
                            match coordinator.checkpoints().mark_interrupted(run_id).await {
                                Ok(paused) => info!(run_id = %run_id, paused = paused, "중단된 체크포인트 저장 완료"),
                                Err(e) => error!(run_id = %run_id, error = %e, "체크포인트 중단 처리 실패"),
                            }
                        }
                        break;
                    }
                    result = &mut collection => match result {
                        Ok(run) => info!(run_id = %run.id, status = run.status.as_str(), "예약 수집 완료"),
                        Err(e) => warn!(error = %e, "이전 수집 실행이 진행 중이라 이번 주기를 건너뜀"),
                    },
                }
            }
        }
    }

    info!("내장 스케줄러 종료");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    handle_export_openapi()?;

    let config_path =
        std::env::var("MONITOR_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let app_config = AppConfig::load(&config_path)?;

    init_logging(LogConfig::from_settings(&app_config.logging))?;
    info!("Starting Economic Data Monitor API server...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = app_config.server.bind_address().parse().map_err(|e| {
        error!(
            host = %app_config.server.host,
            port = app_config.server.port,
            error = %e,
            "소켓 주소 설정이 유효하지 않습니다. MONITOR__SERVER__HOST, MONITOR__SERVER__PORT를 확인하세요."
        );
        e
    })?;

    let collector_config = CollectorConfig::from_app_config(&app_config);
    let catalog = Arc::new(SeriesCatalog::from_config(&app_config.series));
    let store = open_store(&app_config).await?;
    let provider = Arc::new(FredClient::from_config(&app_config.provider)?);
    let coordinator = Arc::new(RunCoordinator::new(
        Arc::clone(&catalog),
        Arc::clone(&store),
        provider,
        &collector_config,
    ));

    let state = Arc::new(AppState::new(
        Arc::clone(&store),
        catalog,
        Arc::clone(&coordinator),
        collector_config.anomaly,
        app_config.collector.trigger_secret.clone(),
    ));

    info!(
        version = %state.version,
        backend = ?store.backend(),
        series = state.catalog.len(),
        has_trigger_secret = state.has_trigger_secret(),
        "Application state initialized"
    );
    if !state.has_trigger_secret() {
        warn!("TRIGGER_SECRET not set, collection trigger endpoint will reject all requests");
    }

    let shutdown_token = CancellationToken::new();

    let scheduler = if is_embedded_scheduler_enabled() {
        info!(
            interval_minutes = collector_config.daemon.interval_minutes,
            "내장 스케줄러 시작"
        );
        Some(tokio::spawn(run_scheduler(
            Arc::clone(&coordinator),
            collector_config.daemon.interval(),
            shutdown_token.clone(),
        )))
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if let Some(handle) = scheduler {
        // 체크포인트 저장에 최대 10초 대기
        if tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .is_err()
        {
            warn!("Scheduler cleanup timeout, forcing shutdown");
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 수신 시 종료 토큰을 취소합니다. 시그널 핸들러 설치에
/// 실패하면 해당 시그널은 기다리지 않습니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
