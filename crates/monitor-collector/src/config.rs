//! Collector 실행 설정.
//!
//! `AppConfig`의 `collector`/`anomaly` 섹션에서 시작해, 운영 환경에서 자주
//! 바꾸는 값은 환경변수로 직접 덮어씁니다.
//!
//! | 환경변수 | 기본값 |
//! |---|---|
//! | `COLLECT_BATCH_SIZE` | 3 |
//! | `DAEMON_INTERVAL_MINUTES` | 60 |
//! | `FULL_SYNC_YEARS` | 5 |
//! | `CHECKPOINT_MAX_RETRIES` | 3 |

use monitor_analytics::AnomalyConfig;
use monitor_core::AppConfig;
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 동시 수집 배치 크기
    pub batch_size: usize,
    /// 전체 동기화 조회 기간 (년)
    pub full_sync_years: i64,
    /// 체크포인트 에러 누적 한도
    pub max_checkpoint_retries: i32,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
    /// 저장 이력 이상 탐지 설정
    pub anomaly: AnomalyConfig,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 수집 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            full_sync_years: 5,
            max_checkpoint_retries: 3,
            daemon: DaemonConfig {
                interval_minutes: 60,
            },
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// 애플리케이션 설정에서 생성 (환경변수 우선)
    pub fn from_app_config(app: &AppConfig) -> Self {
        let settings = &app.collector;
        Self {
            batch_size: env_var_parse("COLLECT_BATCH_SIZE", settings.batch_size).max(1),
            full_sync_years: env_var_parse("FULL_SYNC_YEARS", settings.full_sync_years),
            max_checkpoint_retries: env_var_parse(
                "CHECKPOINT_MAX_RETRIES",
                settings.max_checkpoint_retries,
            ),
            daemon: DaemonConfig {
                interval_minutes: env_var_parse(
                    "DAEMON_INTERVAL_MINUTES",
                    settings.daemon_interval_minutes,
                ),
            },
            anomaly: AnomalyConfig::from(&app.anomaly),
        }
    }

    /// 배치 크기 지정
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl DaemonConfig {
    /// 수집 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_app_config() {
        let app = AppConfig::default();
        let config = CollectorConfig::from_app_config(&app);
        assert_eq!(config.full_sync_years, 5);
        assert_eq!(config.anomaly.window_size, 24);
        assert!(config.batch_size >= 1);
    }

    #[test]
    fn test_batch_size_never_zero() {
        let config = CollectorConfig::default().with_batch_size(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.daemon.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_env_var_parse_falls_back() {
        assert_eq!(env_var_parse("MONITOR_TEST_UNSET_VARIABLE", 42u64), 42);
    }
}
