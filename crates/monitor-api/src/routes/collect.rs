//! 수집 트리거 및 스케줄러 통계 endpoint.
//!
//! - `POST /api/v1/collect` - 공유 비밀로 인증된 수동 수집 실행
//! - `GET /api/v1/collect/stats` - 주기별 시계열 수, 최근 실행, 데이터 신선도
//! - `GET /api/v1/collect/checkpoints` - 체크포인트 조회

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use monitor_collector::modules::RunOptions;
use monitor_collector::{CollectorError, SchedulerStats};
use monitor_core::{Checkpoint, CollectionRun, RunMode, RunType};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{
    api_error, bad_request, internal_error, unauthorized, ApiErrorResponse, ApiResult,
};
use crate::metrics::record_trigger;
use crate::state::AppState;

/// 트리거 비밀 전용 헤더
pub const SECRET_HEADER: &str = "x-collector-secret";

/// 최근 실행 조회 상한
const MAX_RECENT_RUNS: usize = 100;

// ==================== 요청/응답 타입 ====================

/// 수집 트리거 요청.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectRequest {
    /// 수집 모드 (incremental, full, daily, weekly, monthly, quarterly, recovery)
    #[serde(default = "default_mode")]
    pub mode: String,

    /// 특정 시계열만 수집
    #[serde(default)]
    pub series_ids: Option<Vec<String>>,
}

fn default_mode() -> String {
    "incremental".to_string()
}

/// 통계 조회 쿼리.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// 최근 실행 표시 개수 (기본 10, 최대 100)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// 스케줄러 통계 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// 생성 시각
    pub generated_at: DateTime<Utc>,
    /// 신선도 구간별 시계열 수 (fresh, warning, stale, no_data)
    pub freshness_counts: BTreeMap<String, usize>,
    /// 주기별 시계열 수, 마지막/최근 실행, 시계열별 신선도
    #[schema(value_type = Object)]
    pub stats: SchedulerStats,
}

/// 체크포인트 조회 쿼리.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CheckpointQuery {
    /// 실행 ID 필터
    pub run_id: Option<Uuid>,
    /// 소스 필터 (시계열 ID 또는 group:{주기})
    pub source: Option<String>,
}

/// 체크포인트 목록 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckpointsResponse {
    /// 조회 건수
    pub total: usize,
    /// 체크포인트 (생성 순)
    pub checkpoints: Vec<Checkpoint>,
}

// ==================== 헬퍼 ====================

/// 요청 헤더에서 트리거 비밀 추출.
///
/// `X-Collector-Secret`이 우선이며 없으면 `Authorization: Bearer`를 사용합니다.
pub fn provided_secret(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
        .map(str::trim)
}

/// 트리거 요청을 실행 옵션으로 변환.
pub fn parse_run_options(request: &CollectRequest) -> Result<RunOptions, String> {
    let mode = request.mode.trim().to_lowercase();
    let options = if mode == "recovery" {
        RunOptions::recovery()
    } else {
        let run_mode: RunMode = mode.parse().map_err(|e| format!("{}", e))?;
        RunOptions::new(RunType::Manual, run_mode)
    };

    let ids: Vec<String> = request
        .series_ids
        .iter()
        .flatten()
        .map(|id| id.trim().to_uppercase())
        .filter(|id| !id.is_empty())
        .collect();

    Ok(if ids.is_empty() {
        options
    } else {
        options.with_series(ids)
    })
}

// ==================== 핸들러 ====================

/// 수동 수집 실행.
///
/// 실행이 끝날 때까지 대기한 뒤 최종 실행 기록을 반환합니다.
/// 이미 진행 중인 실행이 있으면 409.
#[utoipa::path(
    post,
    path = "/api/v1/collect",
    request_body = CollectRequest,
    params(
        ("X-Collector-Secret" = Option<String>, Header, description = "트리거 공유 비밀 (또는 Authorization: Bearer)")
    ),
    responses(
        (status = 200, description = "수집 실행 완료", body = CollectionRun),
        (status = 400, description = "잘못된 수집 모드", body = ApiErrorResponse),
        (status = 401, description = "트리거 인증 실패", body = ApiErrorResponse),
        (status = 409, description = "다른 수집 실행 진행 중", body = ApiErrorResponse)
    ),
    tag = "collect"
)]
pub async fn trigger_collection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CollectRequest>,
) -> ApiResult<Json<CollectionRun>> {
    let authorized = provided_secret(&headers)
        .map(|secret| state.verify_trigger_secret(secret))
        .unwrap_or(false);
    if !authorized {
        warn!(mode = %request.mode, "수집 트리거 인증 실패");
        record_trigger("unauthorized");
        return Err(unauthorized("트리거 인증 실패"));
    }

    let options = parse_run_options(&request).map_err(|e| {
        record_trigger("invalid");
        bad_request(e)
    })?;

    info!(
        mode = %request.mode,
        series = ?options.series_ids,
        "수동 수집 트리거"
    );
    match state.coordinator.run_collection(options).await {
        Ok(run) => {
            record_trigger(run.status.as_str());
            Ok(Json(run))
        }
        Err(CollectorError::RunInProgress(run_id)) => {
            record_trigger("conflict");
            Err(api_error(
                StatusCode::CONFLICT,
                "RUN_IN_PROGRESS",
                format!("수집 실행이 이미 진행 중입니다: {}", run_id),
            ))
        }
        Err(e) => {
            record_trigger("error");
            Err(internal_error(e.to_string()))
        }
    }
}

/// 스케줄러 통계 조회.
#[utoipa::path(
    get,
    path = "/api/v1/collect/stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "스케줄러 통계", body = StatsResponse),
        (status = 500, description = "저장소 오류", body = ApiErrorResponse)
    ),
    tag = "collect"
)]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<StatsResponse>> {
    let limit = query.limit.clamp(1, MAX_RECENT_RUNS);
    let now = Utc::now();

    let stats = SchedulerStats::collect(
        state.store.as_ref(),
        &state.catalog,
        now.date_naive(),
        limit,
    )
    .await
    .map_err(|e| internal_error(format!("통계 조회 실패: {}", e)))?;

    let freshness_counts = stats
        .freshness_counts()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    Ok(Json(StatsResponse {
        generated_at: now,
        freshness_counts,
        stats,
    }))
}

/// 체크포인트 조회.
#[utoipa::path(
    get,
    path = "/api/v1/collect/checkpoints",
    params(CheckpointQuery),
    responses(
        (status = 200, description = "체크포인트 목록", body = CheckpointsResponse),
        (status = 500, description = "저장소 오류", body = ApiErrorResponse)
    ),
    tag = "collect"
)]
pub async fn list_checkpoints(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckpointQuery>,
) -> ApiResult<Json<CheckpointsResponse>> {
    let checkpoints = state
        .coordinator
        .checkpoints()
        .list_checkpoints(query.run_id, query.source.as_deref())
        .await
        .map_err(|e| internal_error(format!("체크포인트 조회 실패: {}", e)))?;

    Ok(Json(CheckpointsResponse {
        total: checkpoints.len(),
        checkpoints,
    }))
}

/// 수집 라우터 생성.
pub fn collect_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(trigger_collection))
        .route("/stats", get(get_stats))
        .route("/checkpoints", get(list_checkpoints))
}
