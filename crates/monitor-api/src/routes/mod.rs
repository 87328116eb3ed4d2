//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/collect` - 수집 트리거, 스케줄러 통계, 체크포인트
//! - `/api/v1/anomaly` - z-score / GARCH 이상 탐지, 저장 이력 스캔

pub mod anomaly;
pub mod collect;
pub mod health;

pub use anomaly::{
    anomaly_router, ForecastRequest, ForecastResponse, GarchModelSummary, GarchRequest,
    GarchResponse, SeriesAnomalyResponse, ZScoreRequest, ZScoreResponse,
};
pub use collect::{
    collect_router, CheckpointsResponse, CollectRequest, StatsResponse, SECRET_HEADER,
};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/collect", collect_router())
        .nest("/api/v1/anomaly", anomaly_router())
}
