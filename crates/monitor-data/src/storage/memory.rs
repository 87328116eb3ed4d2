//! 인메모리 저장소.
//!
//! 개발 환경과 테스트에서 PostgreSQL 없이 파이프라인 전체를 실행하기 위한
//! [`MonitorStore`] 구현입니다. 키 의미(upsert, 추가 전용 체크포인트)는
//! PostgreSQL 구현과 같습니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use monitor_core::{Checkpoint, CollectionRun, DataQualityIssue, Observation, StoreBackend};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CheckpointStore, MonitorStore, ObservationStore, RunStore};
use crate::error::{DataError, Result};

#[derive(Default)]
struct Inner {
    observations: BTreeMap<(String, NaiveDate), Observation>,
    runs: Vec<CollectionRun>,
    checkpoints: Vec<Checkpoint>,
    issues: Vec<(Uuid, DataQualityIssue)>,
}

/// 인메모리 [`MonitorStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// 빈 저장소 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 관측값 수
    pub async fn observation_count(&self) -> usize {
        self.inner.read().await.observations.len()
    }

    /// 저장된 품질 이슈 (Run ID와 함께)
    pub async fn quality_issues(&self) -> Vec<(Uuid, DataQualityIssue)> {
        self.inner.read().await.issues.clone()
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn upsert_observations(&self, records: &[Observation]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        for record in records {
            inner
                .observations
                .insert((record.series_id.clone(), record.date), record.clone());
        }
        Ok(records.len())
    }

    async fn latest_observation(&self, series_id: &str) -> Result<Option<Observation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .observations
            .values()
            .filter(|o| o.series_id == series_id)
            .max_by_key(|o| o.date)
            .cloned())
    }

    async fn recent_observations(&self, series_id: &str, limit: usize) -> Result<Vec<Observation>> {
        let inner = self.inner.read().await;
        let matching: Vec<&Observation> = inner
            .observations
            .values()
            .filter(|o| o.series_id == series_id)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn insert_run(&self, run: &CollectionRun) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.runs.iter().any(|r| r.id == run.id) {
            return Err(DataError::DuplicateError(format!("collection run {}", run.id)));
        }
        inner.runs.push(run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &CollectionRun) -> Result<()> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .runs
            .iter_mut()
            .find(|r| r.id == run.id)
            .ok_or_else(|| DataError::NotFound(format!("collection run {}", run.id)))?;
        *existing = run.clone();
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<CollectionRun>> {
        let inner = self.inner.read().await;
        let mut runs = inner.runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn insert_quality_issues(
        &self,
        run_id: Uuid,
        issues: &[DataQualityIssue],
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        inner
            .issues
            .extend(issues.iter().cloned().map(|issue| (run_id, issue)));
        Ok(issues.len())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.checkpoints.iter().any(|c| c.id == checkpoint.id) {
            return Err(DataError::DuplicateError(format!(
                "checkpoint {}",
                checkpoint.id
            )));
        }
        inner.checkpoints.push(checkpoint.clone());
        Ok(())
    }

    async fn update_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .checkpoints
            .iter_mut()
            .find(|c| c.id == checkpoint.id)
            .ok_or_else(|| DataError::NotFound(format!("checkpoint {}", checkpoint.id)))?;
        *existing = checkpoint.clone();
        Ok(())
    }

    async fn get_checkpoint(&self, id: &str) -> Result<Option<Checkpoint>> {
        let inner = self.inner.read().await;
        Ok(inner.checkpoints.iter().find(|c| c.id == id).cloned())
    }

    async fn query_checkpoints(
        &self,
        run_id: Option<Uuid>,
        source: Option<&str>,
    ) -> Result<Vec<Checkpoint>> {
        let inner = self.inner.read().await;
        Ok(inner
            .checkpoints
            .iter()
            .filter(|c| run_id.is_none() || c.run_id == run_id)
            .filter(|c| source.map_or(true, |s| c.source == s))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
