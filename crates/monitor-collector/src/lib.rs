//! 경제 지표 수집 스케줄러.
//!
//! 이 crate는 API 서버와 독립적으로 실행할 수 있는 수집기를 제공합니다:
//! - 주기별 배치 수집 (동시성 제한, 요청 간격 유지)
//! - 체크포인트 기반 중단 복구
//! - 수집 후 데이터 품질 점검
//! - 저장 이력 기반 이상 탐지

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::{CollectorConfig, DaemonConfig};
pub use error::{CollectorError, Result};
pub use stats::{Freshness, SchedulerStats, SeriesFreshness};
