//! 시계열 단위 수집 (Fetch Orchestrator).
//!
//! 1. 조회 윈도우 시작일 결정 (전체 동기화 / 마지막 관측 − 윈도우 / 재개 위치)
//! 2. 제공자 호출을 선형 백오프로 재시도
//! 3. 센티널을 제외한 숫자 관측값만 (series_id, date) 키로 upsert
//! 4. 발표 캘린더 기준 누락 날짜 계산
//!
//! 어떤 실패도 이 경계 밖으로 전파하지 않고 항상 [`FetchResult`]를 반환합니다.

use chrono::{Months, NaiveDate, Utc};
use monitor_core::{calendar, FetchResult, Observation, Series, WindowPolicy};
use monitor_data::{MonitorStore, ObservationProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 수집 옵션
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// 전체 동기화 (마지막 관측 무시)
    pub force_full_sync: bool,
    /// 체크포인트 재개 위치 (증분 시작일보다 이르면 우선)
    pub resume_from: Option<NaiveDate>,
}

impl FetchOptions {
    /// 전체 동기화 옵션
    pub fn full_sync() -> Self {
        Self {
            force_full_sync: true,
            resume_from: None,
        }
    }

    /// 재개 위치 지정 옵션
    pub fn resume(from: Option<NaiveDate>) -> Self {
        Self {
            force_full_sync: false,
            resume_from: from,
        }
    }
}

/// 시계열 수집기.
#[derive(Clone)]
pub struct FetchOrchestrator {
    provider: Arc<dyn ObservationProvider>,
    store: Arc<dyn MonitorStore>,
    full_sync_years: i64,
}

impl FetchOrchestrator {
    /// 새 수집기 생성
    pub fn new(
        provider: Arc<dyn ObservationProvider>,
        store: Arc<dyn MonitorStore>,
        full_sync_years: i64,
    ) -> Self {
        Self {
            provider,
            store,
            full_sync_years,
        }
    }

    /// 전체 동기화 시작일
    pub fn full_sync_start(&self, today: NaiveDate) -> NaiveDate {
        let months = u32::try_from(self.full_sync_years.max(0) * 12).unwrap_or(u32::MAX);
        today
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN)
    }

    /// 조회 윈도우 시작일 결정.
    ///
    /// 저장된 관측이 없으면 전체 동기화 기간을 사용합니다. 마지막 관측 조회에
    /// 실패하면 오늘 기준 윈도우로 대신합니다.
    pub async fn resolve_window(
        &self,
        series: &Series,
        policy: &WindowPolicy,
        options: FetchOptions,
        today: NaiveDate,
    ) -> NaiveDate {
        if options.force_full_sync {
            return self.full_sync_start(today);
        }

        let incremental = match self.store.latest_observation(&series.id).await {
            Ok(Some(latest)) => latest.date - chrono::Duration::days(policy.max_window_days),
            Ok(None) => self.full_sync_start(today),
            Err(e) => {
                warn!(
                    series_id = %series.id,
                    error = %e,
                    "마지막 관측 조회 실패, 기본 윈도우 사용"
                );
                today - chrono::Duration::days(policy.max_window_days)
            }
        };

        match options.resume_from {
            Some(resume) if resume < incremental => resume,
            _ => incremental,
        }
    }

    /// 오늘 기준으로 시계열을 수집합니다.
    pub async fn fetch(
        &self,
        series: &Series,
        policy: &WindowPolicy,
        options: FetchOptions,
    ) -> FetchResult {
        let today = Utc::now().date_naive();
        let window_start = self.resolve_window(series, policy, options, today).await;
        self.fetch_window(series, policy, window_start, today).await
    }

    /// `[window_start, today]` 구간을 수집합니다.
    pub async fn fetch_window(
        &self,
        series: &Series,
        policy: &WindowPolicy,
        window_start: NaiveDate,
        today: NaiveDate,
    ) -> FetchResult {
        let started = Instant::now();
        let mut result = FetchResult::new(series.id.clone(), series.cadence, window_start, today);
        let attempts = policy.retry_attempts.max(1);

        let mut observations = None;
        for attempt in 1..=attempts {
            match self
                .provider
                .fetch_observations(&series.id, window_start, today)
                .await
            {
                Ok(obs) => {
                    observations = Some(obs);
                    break;
                }
                Err(e) => {
                    warn!(
                        series_id = %series.id,
                        attempt = attempt,
                        max_attempts = attempts,
                        error = %e,
                        "제공자 요청 실패"
                    );
                    result
                        .errors
                        .push(format!("attempt {}/{}: {}", attempt, attempts, e));
                    if attempt < attempts {
                        tokio::time::sleep(policy.retry_delay() * attempt).await;
                    }
                }
            }
        }

        let Some(observations) = observations else {
            result.elapsed_ms = started.elapsed().as_millis() as u64;
            return result;
        };

        result.fetched = observations.len();
        let returned: Vec<NaiveDate> = observations.iter().map(|o| o.date).collect();
        let records: Vec<Observation> = observations
            .iter()
            .filter_map(|o| {
                o.value
                    .as_f64()
                    .map(|v| Observation::new(series.id.clone(), o.date, v, today))
            })
            .collect();
        result.skipped = observations.len() - records.len();

        result.success = true;
        if !records.is_empty() {
            match self.store.upsert_observations(&records).await {
                Ok(inserted) => result.inserted = inserted,
                Err(e) => {
                    warn!(series_id = %series.id, error = %e, "관측값 저장 실패");
                    result.errors.push(format!("upsert: {}", e));
                    result.success = false;
                }
            }
        }

        result.missing_dates = calendar::missing_dates(series, window_start, today, &returned);
        result.elapsed_ms = started.elapsed().as_millis() as u64;

        if result.success {
            info!(
                series_id = %series.id,
                fetched = result.fetched,
                inserted = result.inserted,
                skipped = result.skipped,
                missing = result.missing_dates.len(),
                "수집 및 저장 완료"
            );
        } else {
            debug!(series_id = %series.id, errors = result.errors.len(), "수집 부분 실패");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use monitor_core::{
        Cadence, Checkpoint, CollectionRun, DataQualityIssue, ObservationValue,
        ProviderObservation, StoreBackend,
    };
    use monitor_data::{
        CheckpointStore, DataError, MemoryStore, ObservationStore, Result as DataResult, RunStore,
    };
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// 처음 `failures`번 실패한 뒤 고정 관측 목록을 반환하는 제공자
    struct FixedProvider {
        failures: Mutex<usize>,
        observations: Vec<ProviderObservation>,
    }

    impl FixedProvider {
        fn new(failures: usize, observations: Vec<ProviderObservation>) -> Self {
            Self {
                failures: Mutex::new(failures),
                observations,
            }
        }
    }

    #[async_trait]
    impl ObservationProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_observations(
            &self,
            series_id: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> DataResult<Vec<ProviderObservation>> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(DataError::Timeout(format!("{} timed out", series_id)));
            }
            Ok(self.observations.clone())
        }
    }

    /// 관측값 쓰기만 실패하는 저장소
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ObservationStore for ReadOnlyStore {
        async fn upsert_observations(&self, _records: &[Observation]) -> DataResult<usize> {
            Err(DataError::QueryError("read-only replica".to_string()))
        }

        async fn latest_observation(&self, series_id: &str) -> DataResult<Option<Observation>> {
            self.inner.latest_observation(series_id).await
        }

        async fn recent_observations(
            &self,
            series_id: &str,
            limit: usize,
        ) -> DataResult<Vec<Observation>> {
            self.inner.recent_observations(series_id, limit).await
        }
    }

    #[async_trait]
    impl RunStore for ReadOnlyStore {
        async fn insert_run(&self, run: &CollectionRun) -> DataResult<()> {
            self.inner.insert_run(run).await
        }

        async fn update_run(&self, run: &CollectionRun) -> DataResult<()> {
            self.inner.update_run(run).await
        }

        async fn recent_runs(&self, limit: usize) -> DataResult<Vec<CollectionRun>> {
            self.inner.recent_runs(limit).await
        }

        async fn insert_quality_issues(
            &self,
            run_id: Uuid,
            issues: &[DataQualityIssue],
        ) -> DataResult<usize> {
            self.inner.insert_quality_issues(run_id, issues).await
        }
    }

    #[async_trait]
    impl CheckpointStore for ReadOnlyStore {
        async fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> DataResult<()> {
            self.inner.insert_checkpoint(checkpoint).await
        }

        async fn update_checkpoint(&self, checkpoint: &Checkpoint) -> DataResult<()> {
            self.inner.update_checkpoint(checkpoint).await
        }

        async fn get_checkpoint(&self, id: &str) -> DataResult<Option<Checkpoint>> {
            self.inner.get_checkpoint(id).await
        }

        async fn query_checkpoints(
            &self,
            run_id: Option<Uuid>,
            source: Option<&str>,
        ) -> DataResult<Vec<Checkpoint>> {
            self.inner.query_checkpoints(run_id, source).await
        }
    }

    #[async_trait]
    impl MonitorStore for ReadOnlyStore {
        fn backend(&self) -> StoreBackend {
            StoreBackend::Memory
        }

        async fn health_check(&self) -> DataResult<()> {
            Ok(())
        }
    }

    fn dff() -> Series {
        Series::new("DFF", "Federal Funds Effective Rate", Cadence::Daily)
    }

    /// 2024-07-01(월) ~ 07-05(금), 7/4는 공휴일이라 반환되지 않음
    fn july_week() -> Vec<ProviderObservation> {
        vec![
            ProviderObservation::new(date(2024, 7, 1), ObservationValue::Value(5.33)),
            ProviderObservation::new(date(2024, 7, 2), ObservationValue::Missing),
            ProviderObservation::new(date(2024, 7, 3), ObservationValue::Unavailable),
            ProviderObservation::new(date(2024, 7, 5), ObservationValue::Value(5.32)),
        ]
    }

    fn orchestrator(
        provider: FixedProvider,
        store: Arc<dyn MonitorStore>,
        years: i64,
    ) -> FetchOrchestrator {
        FetchOrchestrator::new(Arc::new(provider), store, years)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinels_are_skipped_not_missing() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = orchestrator(FixedProvider::new(0, july_week()), store.clone(), 5);
        let policy = WindowPolicy::for_cadence(Cadence::Daily);

        let result = fetcher
            .fetch_window(&dff(), &policy, date(2024, 7, 1), date(2024, 7, 10))
            .await;

        assert!(result.success);
        assert_eq!(result.fetched, 4);
        assert_eq!(result.inserted, 2);
        assert_eq!(result.skipped, 2);
        assert!(result.missing_dates.is_empty());
        assert!(result.errors.is_empty());
        assert_eq!(store.observation_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_failure_keeps_counts() {
        let store = Arc::new(ReadOnlyStore::default());
        let fetcher = orchestrator(FixedProvider::new(0, july_week()), store, 5);
        let policy = WindowPolicy::for_cadence(Cadence::Daily);

        let result = fetcher
            .fetch_window(&dff(), &policy, date(2024, 7, 1), date(2024, 7, 10))
            .await;

        assert!(!result.success);
        assert_eq!(result.fetched, 4);
        assert_eq!(result.inserted, 0);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("upsert:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_retry_keeps_error_history() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = orchestrator(FixedProvider::new(1, july_week()), store, 5);
        let policy = WindowPolicy::for_cadence(Cadence::Daily);

        let result = fetcher
            .fetch_window(&dff(), &policy, date(2024, 7, 1), date(2024, 7, 10))
            .await;

        assert!(result.success);
        assert_eq!(result.inserted, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("attempt 1/3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_back_off_linearly() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = orchestrator(FixedProvider::new(usize::MAX, Vec::new()), store, 5);
        let policy = WindowPolicy::for_cadence(Cadence::Daily);

        let started = tokio::time::Instant::now();
        let result = fetcher
            .fetch_window(&dff(), &policy, date(2024, 7, 1), date(2024, 7, 10))
            .await;
        let waited = started.elapsed();

        // 1초 후 2초, 마지막 시도 뒤에는 대기하지 않음
        assert!(!result.success);
        assert_eq!(result.errors.len(), 3);
        assert!(waited >= Duration::from_millis(3000));
        assert!(waited < Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_window_resolution() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = orchestrator(FixedProvider::new(0, Vec::new()), store.clone(), 5);
        let policy = WindowPolicy::for_cadence(Cadence::Daily);
        let today = date(2024, 6, 15);

        // 저장된 관측이 없으면 전체 동기화
        let start = fetcher
            .resolve_window(&dff(), &policy, FetchOptions::default(), today)
            .await;
        assert_eq!(start, date(2019, 6, 15));

        store
            .upsert_observations(&[Observation::new("DFF", date(2024, 6, 10), 5.33, today)])
            .await
            .unwrap();

        let start = fetcher
            .resolve_window(&dff(), &policy, FetchOptions::default(), today)
            .await;
        assert_eq!(start, date(2024, 6, 3));

        let start = fetcher
            .resolve_window(&dff(), &policy, FetchOptions::full_sync(), today)
            .await;
        assert_eq!(start, date(2019, 6, 15));

        let start = fetcher
            .resolve_window(&dff(), &policy, FetchOptions::resume(Some(date(2024, 5, 1))), today)
            .await;
        assert_eq!(start, date(2024, 5, 1));
    }
}
