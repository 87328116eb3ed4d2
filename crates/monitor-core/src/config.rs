//! 설정 관리.
//!
//! 기본값 → `config/default.toml` (선택) → `MONITOR__` 접두사 환경변수 순으로
//! 덮어쓰며 애플리케이션 설정을 구성합니다.
//!
//! ```text
//! MONITOR__SERVER__PORT=8080
//! MONITOR__STORE__BACKEND=memory
//! MONITOR__PROVIDER__API_KEY=...
//! ```

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::Series;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 저장소 선택
    pub store: StoreConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 외부 데이터 제공자 설정
    pub provider: ProviderConfig,
    /// 수집기 설정
    pub collector: CollectorSettings,
    /// 이상 탐지 설정
    pub anomaly: AnomalySettings,
    /// 추적 대상 시계열 (비어 있으면 기본 카탈로그)
    pub series: Vec<Series>,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// "host:port" 형식 주소
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL
    pub url: String,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 최소 연결 수
    pub min_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 유휴 타임아웃 (초)
    pub idle_timeout_secs: u64,
    /// 시작 시 마이그레이션 실행 여부
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 300,
            run_migrations: true,
        }
    }
}

/// 저장소 구현 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// PostgreSQL
    #[default]
    Postgres,
    /// 인메모리 (개발/테스트용)
    Memory,
}

/// 저장소 선택 설정 (시작 시 한 번 결정).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 저장소 구현
    pub backend: StoreBackend,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 외부 시계열 제공자 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API 기본 URL
    pub base_url: String,
    /// API 키
    pub api_key: SecretString,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stlouisfed.org/fred".to_string(),
            api_key: SecretString::default(),
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    /// 요청 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 수집기 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// 동시 수집 배치 크기
    pub batch_size: usize,
    /// 전체 동기화 시 조회 기간 (년)
    pub full_sync_years: i64,
    /// 체크포인트 에러 누적 한도 (초과 시 restart 권고)
    pub max_checkpoint_retries: i32,
    /// 데몬 실행 주기 (분)
    pub daemon_interval_minutes: u64,
    /// 트리거 엔드포인트 공유 비밀
    pub trigger_secret: SecretString,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            full_sync_years: 5,
            max_checkpoint_retries: 3,
            daemon_interval_minutes: 60,
            trigger_secret: SecretString::default(),
        }
    }
}

impl CollectorSettings {
    /// 데몬 실행 주기를 Duration으로 반환
    pub fn daemon_interval(&self) -> Duration {
        Duration::from_secs(self.daemon_interval_minutes * 60)
    }
}

/// 이상 탐지 기본 설정.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalySettings {
    /// 경고 임계값 (|z|)
    pub warning_threshold: f64,
    /// 위험 임계값 (|z|)
    pub critical_threshold: f64,
    /// 최소 데이터 수
    pub min_data_points: usize,
    /// 롤링 윈도우 크기
    pub window_size: usize,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            warning_threshold: 2.0,
            critical_threshold: 3.0,
            min_data_points: 12,
            window_size: 24,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없어도 기본값과 환경 변수만으로 구성됩니다. 전용 키가 비어 있으면
    /// `DATABASE_URL`, `PROVIDER_API_KEY`, `TRIGGER_SECRET` 환경변수를 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.apply_env_fallbacks();
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    fn apply_env_fallbacks(&mut self) {
        use secrecy::ExposeSecret;

        if self.database.url.is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.database.url = url;
            }
        }
        if self.provider.api_key.expose_secret().is_empty() {
            if let Ok(key) = std::env::var("PROVIDER_API_KEY") {
                self.provider.api_key = SecretString::from(key);
            }
        }
        if self.collector.trigger_secret.expose_secret().is_empty() {
            if let Ok(secret) = std::env::var("TRIGGER_SECRET") {
                self.collector.trigger_secret = SecretString::from(secret);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.collector.batch_size, 3);
        assert_eq!(config.collector.full_sync_years, 5);
        assert_eq!(config.anomaly.min_data_points, 12);
        assert_eq!(config.anomaly.window_size, 24);
        assert!(config.series.is_empty());
        assert_eq!(config.collector.daemon_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("monitor-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 8088

[store]
backend = "memory"

[anomaly]
window_size = 36

[[series]]
id = "ICSA"
name = "Initial Claims"
cadence = "weekly"
publication_weekday = "Thu"
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.anomaly.window_size, 36);
        assert_eq!(config.anomaly.min_data_points, 12);
        assert_eq!(config.series.len(), 1);
        assert_eq!(config.series[0].publication_weekday, Some(chrono::Weekday::Thu));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.collector.max_checkpoint_retries, 3);
    }
}
