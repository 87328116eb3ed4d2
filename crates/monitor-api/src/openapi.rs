//! OpenAPI 문서화 설정.
//!
//! utoipa로 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 분석 crate의 결과 타입은 `#[schema(value_type = Object)]`로 JSON 객체로
//! 노출하고, 도메인 타입은 `monitor-core`의 `utoipa-support` feature로
//! 스키마를 얻습니다.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use monitor_core::{
    BatchItem, Cadence, Checkpoint, CheckpointKind, CheckpointPayload, CheckpointStatus,
    CollectionRun, FetchResult, ItemOutcome, RunMode, RunStatus, RunType,
};

use crate::error::ApiErrorResponse;
use crate::routes::{
    CheckpointsResponse, CollectRequest, ComponentHealth, ComponentStatus, ForecastRequest,
    ForecastResponse, GarchModelSummary, GarchRequest, GarchResponse, HealthResponse,
    SeriesAnomalyResponse, StatsResponse, ZScoreRequest, ZScoreResponse,
};

/// Economic Data Monitor API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Economic Data Monitor API",
        version = "0.1.0",
        description = r#"
# 경제 지표 수집/모니터링 REST API

## 주요 기능

- **수집 트리거**: 증분/전체/주기별/복구 수집 실행
- **스케줄러 통계**: 주기별 시계열 수, 최근 실행, 데이터 신선도
- **체크포인트**: 수집 진행 상태 및 복구 정보 조회
- **이상 탐지**: 롤링 z-score, GARCH(1,1) 변동성 기반 판정과 예측

## 인증

`POST /api/v1/collect`는 공유 비밀이 필요합니다.
`X-Collector-Secret: <secret>` 또는 `Authorization: Bearer <secret>` 헤더를 포함하세요.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    tags(
        (name = "health", description = "서버 상태 확인"),
        (name = "collect", description = "수집 실행 및 스케줄러 통계"),
        (name = "anomaly", description = "이상 탐지")
    ),
    components(
        schemas(
            // ===== Common =====
            ApiErrorResponse,

            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Collect =====
            CollectRequest,
            StatsResponse,
            CheckpointsResponse,
            CollectionRun,
            FetchResult,
            RunType,
            RunMode,
            RunStatus,
            Cadence,
            Checkpoint,
            CheckpointKind,
            CheckpointStatus,
            CheckpointPayload,
            BatchItem,
            ItemOutcome,

            // ===== Anomaly =====
            ZScoreRequest,
            ZScoreResponse,
            GarchRequest,
            GarchResponse,
            ForecastRequest,
            ForecastResponse,
            GarchModelSummary,
            SeriesAnomalyResponse,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Collect =====
        crate::routes::collect::trigger_collection,
        crate::routes::collect::get_stats,
        crate::routes::collect::list_checkpoints,

        // ===== Anomaly =====
        crate::routes::anomaly::zscore,
        crate::routes::anomaly::garch,
        crate::routes::anomaly::garch_forecast,
        crate::routes::anomaly::series_anomaly,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("Economic Data Monitor API"));

        // 태그
        assert!(json.contains("health"));
        assert!(json.contains("collect"));
        assert!(json.contains("anomaly"));

        // 경로
        assert!(json.contains("/health/ready"));
        assert!(json.contains("/api/v1/collect"));
        assert!(json.contains("/api/v1/collect/stats"));
        assert!(json.contains("/api/v1/collect/checkpoints"));
        assert!(json.contains("/api/v1/anomaly/zscore"));
        assert!(json.contains("/api/v1/anomaly/garch/forecast"));
        assert!(json.contains("/api/v1/anomaly/series/{id}"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }

    #[test]
    fn test_openapi_contains_schemas() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();

        assert!(json.contains("HealthResponse"));
        assert!(json.contains("CollectionRun"));
        assert!(json.contains("Checkpoint"));
        assert!(json.contains("ZScoreRequest"));
        assert!(json.contains("ApiErrorResponse"));
    }
}
