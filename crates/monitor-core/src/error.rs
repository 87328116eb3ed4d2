//! 모니터링 시스템의 에러 타입.
//!
//! 이 모듈은 시스템 전반에서 공유되는 에러 타입을 정의합니다.

use thiserror::Error;

/// 핵심 모니터링 에러.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 외부 데이터 제공자 에러
    #[error("데이터 제공자 에러: {0}")]
    Provider(String),

    /// 요청 한도 초과
    #[error("요청 한도 초과: {0}")]
    RateLimit(String),

    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 타임아웃
    #[error("타임아웃: {0}")]
    Timeout(String),

    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 모니터링 작업을 위한 Result 타입.
pub type MonitorResult<T> = Result<T, MonitorError>;

impl MonitorError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MonitorError::Network(_) | MonitorError::RateLimit(_) | MonitorError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for MonitorError {
    fn from(err: config::ConfigError) -> Self {
        MonitorError::Config(err.to_string())
    }
}
