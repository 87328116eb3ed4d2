//! # Monitor API
//!
//! 경제 지표 수집기의 REST API 서버.
//!
//! - 수동 수집 트리거 (공유 비밀 인증)
//! - 스케줄러 통계 및 체크포인트 조회
//! - 이상 탐지 조회 (z-score, GARCH)
//! - 헬스 체크, Prometheus 메트릭, OpenAPI 문서

pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::{ApiErrorResponse, ApiResult};
pub use state::AppState;
