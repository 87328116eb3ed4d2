//! 이상 탐지 조회 endpoint.
//!
//! 요청 본문의 값으로 계산하는 순수 분석과, 저장소 이력으로 계산하는 시계열
//! 스캔을 제공합니다.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use monitor_analytics::{
    classify, detect_garch_anomaly, fit_garch, forecast_volatility, AnomalyConfig,
    AnomalyOutcome, GarchAnomaly, VolatilityForecast,
};
use monitor_collector::modules::scan_series;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{bad_request, internal_error, not_found, ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 기본 GARCH 신뢰수준
const DEFAULT_CONFIDENCE: f64 = 0.95;

/// 기본 예측 기간
const DEFAULT_HORIZON: usize = 10;

// ==================== 요청/응답 타입 ====================

/// z-score 분류 요청.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZScoreRequest {
    /// 평가할 현재 값
    pub current_value: f64,
    /// 시간순 이력 (오래된 값 → 최신 값)
    pub historical_values: Vec<f64>,
    /// 분류 설정 (생략 시 서버 기본값, 일부 필드만 지정 가능)
    #[schema(value_type = Option<Object>)]
    pub config: Option<AnomalyConfig>,
}

/// 분류 결과 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZScoreResponse {
    /// warning 이상 여부
    pub is_anomalous: bool,
    /// 심각도 ("normal" | "warning" | "critical")
    pub severity: String,
    /// z-score (이력 부족 시 0)
    pub z_score: f64,
    /// 상세 분류 결과 (`status`: classified | insufficient_data)
    #[schema(value_type = Object)]
    pub outcome: AnomalyOutcome,
}

impl From<AnomalyOutcome> for ZScoreResponse {
    fn from(outcome: AnomalyOutcome) -> Self {
        Self {
            is_anomalous: outcome.is_anomalous(),
            severity: outcome.severity().as_str().to_string(),
            z_score: outcome.z_score(),
            outcome,
        }
    }
}

/// GARCH 이상 탐지 요청.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GarchRequest {
    /// 평가할 현재 값 (양수)
    pub current_value: f64,
    /// 시간순 이력 (양수)
    pub historical_values: Vec<f64>,
    /// VaR 신뢰수준 (0.90~0.99, 기본 0.95)
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// GARCH 이상 탐지 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct GarchResponse {
    /// 조건부 변동성 기반 판정
    #[schema(value_type = Object)]
    pub anomaly: GarchAnomaly,
}

/// 변동성 예측 요청.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequest {
    /// 시간순 이력 (양수)
    pub historical_values: Vec<f64>,
    /// 예측 기간 (기본 10)
    #[serde(default = "default_horizon")]
    pub horizon: usize,
}

fn default_horizon() -> usize {
    DEFAULT_HORIZON
}

/// 적합된 모델 요약.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GarchModelSummary {
    pub mu: f64,
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    /// α + β
    pub persistence: f64,
    /// 충격 반감기 (지속성이 1 이상이면 없음)
    pub half_life: Option<f64>,
    pub aic: f64,
    pub bic: f64,
    /// 사용한 수익률 개수
    pub observations: usize,
    /// 현재 조건부 변동성 (%)
    pub current_volatility: f64,
}

/// 변동성 예측 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastResponse {
    pub model: GarchModelSummary,
    #[schema(value_type = Object)]
    pub forecast: VolatilityForecast,
}

/// 저장 이력 스캔 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeriesAnomalyResponse {
    pub series_id: String,
    /// 최신 관측일
    pub date: NaiveDate,
    /// 최신 관측값
    pub value: f64,
    #[serde(flatten)]
    pub result: ZScoreResponse,
}

// ==================== 검증 ====================

/// 분류 설정 검증.
pub fn validate_config(config: &AnomalyConfig) -> Result<(), String> {
    let thresholds = [config.warning_threshold, config.critical_threshold];
    if thresholds.iter().any(|t| !t.is_finite() || *t <= 0.0) {
        return Err("임계값은 양수여야 합니다".to_string());
    }
    if config.warning_threshold > config.critical_threshold {
        return Err(format!(
            "warningThreshold({})는 criticalThreshold({}) 이하여야 합니다",
            config.warning_threshold, config.critical_threshold
        ));
    }
    if config.window_size == 0 {
        return Err("windowSize는 1 이상이어야 합니다".to_string());
    }
    Ok(())
}

// ==================== 핸들러 ====================

/// 롤링 윈도우 z-score 분류.
#[utoipa::path(
    post,
    path = "/api/v1/anomaly/zscore",
    request_body = ZScoreRequest,
    responses(
        (status = 200, description = "분류 결과", body = ZScoreResponse),
        (status = 400, description = "잘못된 입력", body = ApiErrorResponse)
    ),
    tag = "anomaly"
)]
pub async fn zscore(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ZScoreRequest>,
) -> ApiResult<Json<ZScoreResponse>> {
    if !request.current_value.is_finite() {
        return Err(bad_request("currentValue는 유한한 값이어야 합니다"));
    }
    let config = request.config.unwrap_or(state.anomaly);
    validate_config(&config).map_err(bad_request)?;

    let outcome = classify(request.current_value, &request.historical_values, &config);
    Ok(Json(outcome.into()))
}

/// GARCH(1,1) 조건부 변동성 기반 이상 탐지.
#[utoipa::path(
    post,
    path = "/api/v1/anomaly/garch",
    request_body = GarchRequest,
    responses(
        (status = 200, description = "판정 결과", body = GarchResponse),
        (status = 400, description = "데이터 부족 또는 잘못된 입력", body = ApiErrorResponse)
    ),
    tag = "anomaly"
)]
pub async fn garch(Json(request): Json<GarchRequest>) -> ApiResult<Json<GarchResponse>> {
    let anomaly = detect_garch_anomaly(
        request.current_value,
        &request.historical_values,
        request.confidence_level,
    )
    .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(GarchResponse { anomaly }))
}

/// GARCH(1,1) 변동성 예측.
#[utoipa::path(
    post,
    path = "/api/v1/anomaly/garch/forecast",
    request_body = ForecastRequest,
    responses(
        (status = 200, description = "예측 결과", body = ForecastResponse),
        (status = 400, description = "데이터 부족 또는 잘못된 기간", body = ApiErrorResponse)
    ),
    tag = "anomaly"
)]
pub async fn garch_forecast(
    Json(request): Json<ForecastRequest>,
) -> ApiResult<Json<ForecastResponse>> {
    let fit = fit_garch(&request.historical_values).map_err(|e| bad_request(e.to_string()))?;
    let forecast =
        forecast_volatility(&fit, request.horizon).map_err(|e| bad_request(e.to_string()))?;

    let model = GarchModelSummary {
        mu: fit.mu,
        omega: fit.omega,
        alpha: fit.alpha,
        beta: fit.beta,
        persistence: fit.persistence,
        half_life: fit.half_life,
        aic: fit.aic,
        bic: fit.bic,
        observations: fit.observations,
        current_volatility: fit.regimes.current,
    };

    Ok(Json(ForecastResponse { model, forecast }))
}

/// 저장된 이력으로 시계열 최신 값 평가.
#[utoipa::path(
    get,
    path = "/api/v1/anomaly/series/{id}",
    params(
        ("id" = String, Path, description = "시계열 ID (예: UNRATE)")
    ),
    responses(
        (status = 200, description = "최신 관측값 분류", body = SeriesAnomalyResponse),
        (status = 404, description = "저장된 관측값 없음", body = ApiErrorResponse),
        (status = 500, description = "저장소 오류", body = ApiErrorResponse)
    ),
    tag = "anomaly"
)]
pub async fn series_anomaly(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SeriesAnomalyResponse>> {
    let series_id = id.trim().to_uppercase();

    let anomaly = scan_series(state.store.as_ref(), &series_id, &state.anomaly)
        .await
        .map_err(|e| internal_error(format!("이력 조회 실패: {}", e)))?
        .ok_or_else(|| not_found(format!("저장된 관측값이 없습니다: {}", series_id)))?;

    Ok(Json(SeriesAnomalyResponse {
        series_id: anomaly.series_id,
        date: anomaly.date,
        value: anomaly.value,
        result: anomaly.outcome.into(),
    }))
}

/// 이상 탐지 라우터 생성.
pub fn anomaly_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/zscore", post(zscore))
        .route("/garch", post(garch))
        .route("/garch/forecast", post(garch_forecast))
        .route("/series/{id}", get(series_anomaly))
}
