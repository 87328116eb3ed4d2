//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 Arc로 래핑되어 여러 요청 간에 공유됩니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use monitor_analytics::AnomalyConfig;
use monitor_collector::modules::RunCoordinator;
use monitor_core::SeriesCatalog;
use monitor_data::MonitorStore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 관측값/실행/체크포인트 저장소
    pub store: Arc<dyn MonitorStore>,

    /// 추적 대상 시계열 카탈로그
    pub catalog: Arc<SeriesCatalog>,

    /// 수집 실행 조정자
    pub coordinator: Arc<RunCoordinator>,

    /// 저장 이력 스캔 및 요청 기본 이상 탐지 설정
    pub anomaly: AnomalyConfig,

    /// 트리거 공유 비밀
    trigger_secret: SecretString,

    /// 서버 시작 시간
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    pub fn new(
        store: Arc<dyn MonitorStore>,
        catalog: Arc<SeriesCatalog>,
        coordinator: Arc<RunCoordinator>,
        anomaly: AnomalyConfig,
        trigger_secret: SecretString,
    ) -> Self {
        Self {
            store,
            catalog,
            coordinator,
            anomaly,
            trigger_secret,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }

    /// 저장소 연결 상태 확인.
    pub async fn is_store_healthy(&self) -> bool {
        self.store.health_check().await.is_ok()
    }

    /// 트리거 공유 비밀이 설정되었는지 여부.
    pub fn has_trigger_secret(&self) -> bool {
        !self.trigger_secret.expose_secret().is_empty()
    }

    /// 제시된 비밀을 검증합니다.
    ///
    /// 두 값의 SHA-256 다이제스트를 비교합니다. 비밀이 설정되지 않았으면 항상 거부.
    pub fn verify_trigger_secret(&self, provided: &str) -> bool {
        if !self.has_trigger_secret() {
            return false;
        }
        let expected = Sha256::digest(self.trigger_secret.expose_secret().as_bytes());
        let actual = Sha256::digest(provided.as_bytes());
        expected == actual
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 인메모리 저장소와 매일 1.0을 반환하는 제공자를 사용합니다.
/// 비밀은 `test-secret`.
#[cfg(test)]
pub fn create_test_state() -> AppState {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use monitor_collector::CollectorConfig;
    use monitor_core::{Cadence, ObservationValue, ProviderObservation, Series};
    use monitor_data::{MemoryStore, ObservationProvider};

    struct FlatProvider;

    #[async_trait]
    impl ObservationProvider for FlatProvider {
        fn name(&self) -> &str {
            "flat"
        }

        async fn fetch_observations(
            &self,
            _series_id: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> monitor_data::Result<Vec<ProviderObservation>> {
            Ok(start
                .iter_days()
                .take_while(|d| *d <= end)
                .map(|d| ProviderObservation::new(d, ObservationValue::Value(1.0)))
                .collect())
        }
    }

    let store: Arc<dyn MonitorStore> = Arc::new(MemoryStore::new());
    let catalog = Arc::new(SeriesCatalog::new(vec![
        Series::new("DFF", "Federal Funds Effective Rate", Cadence::Daily),
        Series::new("UNRATE", "Unemployment Rate", Cadence::Monthly),
    ]));
    let config = CollectorConfig {
        full_sync_years: 1,
        ..CollectorConfig::default()
    };
    let coordinator = Arc::new(RunCoordinator::new(
        Arc::clone(&catalog),
        Arc::clone(&store),
        Arc::new(FlatProvider),
        &config,
    ));

    AppState::new(
        store,
        catalog,
        coordinator,
        AnomalyConfig::default(),
        SecretString::from("test-secret"),
    )
}
