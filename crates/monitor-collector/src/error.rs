//! 에러 타입 정의.

use monitor_data::DataError;
use std::fmt;
use uuid::Uuid;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 저장소/제공자 에러
    Data(DataError),
    /// 설정 에러
    Config(String),
    /// 체크포인트 에러 (없음, 불일치)
    Checkpoint(String),
    /// 다른 수집 실행이 진행 중
    RunInProgress(Uuid),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(e) => write!(f, "Data error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Checkpoint(msg) => write!(f, "Checkpoint error: {}", msg),
            Self::RunInProgress(id) => write!(f, "Collection run already in progress: {}", id),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Data(e) => Some(e),
            Self::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

impl From<monitor_core::MonitorError> for CollectorError {
    fn from(err: monitor_core::MonitorError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
