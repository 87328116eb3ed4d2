//! 저장소 모듈.
//!
//! 관측값, 수집 실행 기록, 체크포인트, 데이터 품질 이슈를 위한 저장소 trait과
//! PostgreSQL / 인메모리 구현을 제공합니다.
//!
//! 구현 선택은 시작 시 `StoreConfig::backend`로 한 번만 결정합니다
//! ([`open_store`]).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use monitor_core::{
    AppConfig, Checkpoint, CollectionRun, DataQualityIssue, Observation, StoreBackend,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

pub use memory::MemoryStore;
pub use postgres::{Database, PgStore};

/// 관측값 저장소.
///
/// 모든 쓰기는 (series_id, date) 키 upsert이므로 같은 데이터를 반복 저장해도
/// 레코드가 늘어나지 않습니다.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// 관측값 upsert. 영향받은 레코드 수를 반환합니다.
    async fn upsert_observations(&self, records: &[Observation]) -> Result<usize>;

    /// 시계열의 가장 최근 관측값
    async fn latest_observation(&self, series_id: &str) -> Result<Option<Observation>>;

    /// 최근 `limit`개 관측값 (날짜 오름차순)
    async fn recent_observations(&self, series_id: &str, limit: usize) -> Result<Vec<Observation>>;
}

/// 수집 실행 기록 저장소.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// 실행 기록 생성
    async fn insert_run(&self, run: &CollectionRun) -> Result<()>;

    /// 실행 기록 갱신
    async fn update_run(&self, run: &CollectionRun) -> Result<()>;

    /// 최근 실행 기록 (최신순)
    async fn recent_runs(&self, limit: usize) -> Result<Vec<CollectionRun>>;

    /// 실행에서 발견된 데이터 품질 이슈 저장
    async fn insert_quality_issues(&self, run_id: Uuid, issues: &[DataQualityIssue])
        -> Result<usize>;
}

/// 체크포인트 저장소 (추가 전용).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 체크포인트 생성
    async fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// 체크포인트 상태/위치 갱신
    async fn update_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// ID로 조회
    async fn get_checkpoint(&self, id: &str) -> Result<Option<Checkpoint>>;

    /// 조건 조회 (생성 순서, 오래된 것부터)
    async fn query_checkpoints(
        &self,
        run_id: Option<Uuid>,
        source: Option<&str>,
    ) -> Result<Vec<Checkpoint>>;
}

/// 수집 파이프라인이 사용하는 전체 저장소.
#[async_trait]
pub trait MonitorStore: ObservationStore + RunStore + CheckpointStore {
    /// 저장소 종류
    fn backend(&self) -> StoreBackend;

    /// 저장소 접근 가능 여부 확인
    async fn health_check(&self) -> Result<()>;
}

/// 같은 배치 안의 중복 키를 마지막 값으로 정리합니다.
///
/// PostgreSQL `ON CONFLICT`는 한 문장에서 같은 키를 두 번 갱신할 수 없습니다.
pub fn dedupe_observations(records: &[Observation]) -> Vec<Observation> {
    let mut by_key: BTreeMap<(&str, chrono::NaiveDate), &Observation> = BTreeMap::new();
    for record in records {
        by_key.insert((record.series_id.as_str(), record.date), record);
    }
    by_key.into_values().cloned().collect()
}

/// 설정에 따라 저장소를 엽니다.
///
/// PostgreSQL 백엔드는 연결 후 `run_migrations`가 켜져 있으면 마이그레이션을
/// 실행합니다.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn MonitorStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("인메모리 저장소 사용");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            if config.database.run_migrations {
                db.migrate().await?;
            }
            Ok(Arc::new(PgStore::new(db)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_dedupe_keeps_last_value() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let v = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let records = vec![
            Observation::new("UNRATE", d, 3.9, v),
            Observation::new("UNRATE", d, 3.8, v),
            Observation::new("CPIAUCSL", d, 310.3, v),
        ];
        let deduped = dedupe_observations(&records);
        assert_eq!(deduped.len(), 2);
        let unrate = deduped.iter().find(|o| o.series_id == "UNRATE").unwrap();
        assert_eq!(unrate.value, 3.8);
    }
}
