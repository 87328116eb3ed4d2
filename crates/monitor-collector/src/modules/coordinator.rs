//! 수집 실행 조정 (Run Coordinator).
//!
//! 대상 시계열을 주기별로 묶고, 주기 그룹마다 고정 크기 배치로 동시 수집한 뒤
//! 배치 사이에 `rateLimitDelay × batchSize` 만큼 대기합니다. 결과는
//! [`CollectionRun`]으로 집계되어 시작/종료 시점에 저장됩니다.
//!
//! 진행 상태는 체크포인트로 남습니다:
//! - 시계열 수집 시작 시 데이터 체크포인트 (active)
//! - 성공 시 완료, 실패 시 중단(paused) + 에러 체크포인트
//! - 배치마다 `group:{주기}` 소스의 누적 배치 체크포인트
//!
//! 복구 실행(`recovery`)에서는 직전 배치 체크포인트에서 성공한 시계열을 건너뛰고,
//! 나머지는 시계열별 복구 판단(skip/restart/resume)에 따라 수집합니다.

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use metrics::counter;
use monitor_core::{
    date_from_position, position_from_date, BatchItem, Cadence, CheckpointPayload,
    CheckpointStatus, CollectionRun, FetchResult, ItemOutcome, RunMode, RunType, Series,
    SeriesCatalog, WindowPolicy,
};
use monitor_data::{MonitorStore, ObservationProvider};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::checkpoint::{CheckpointManager, RecoveryAction, RecoveryOptions};
use super::fetch::{FetchOptions, FetchOrchestrator};
use super::quality::DataQualityMonitor;
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};

/// 실행 옵션
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// 트리거 종류
    pub run_type: RunType,
    /// 수집 모드
    pub mode: RunMode,
    /// 명시 대상 시계열 (없으면 모드 기준)
    pub series_ids: Option<Vec<String>>,
}

impl RunOptions {
    /// 트리거 종류와 모드로 생성
    pub fn new(run_type: RunType, mode: RunMode) -> Self {
        Self {
            run_type,
            mode,
            series_ids: None,
        }
    }

    /// 대상 시계열 지정
    pub fn with_series(mut self, series_ids: Vec<String>) -> Self {
        self.series_ids = Some(series_ids);
        self
    }

    /// 체크포인트 기반 복구 실행 옵션
    pub fn recovery() -> Self {
        Self::new(RunType::Recovery, RunMode::Incremental)
    }

    fn force_full_sync(&self) -> bool {
        self.mode.forces_full_sync()
    }
}

/// 주기 그룹의 배치 체크포인트 소스 이름
pub fn group_source(cadence: Cadence) -> String {
    format!("group:{}", cadence.as_str())
}

/// 점유한 실행 슬롯. 실행이 끝나거나 future가 취소되면 자신의 ID일 때만 비웁니다.
struct RunSlot<'a> {
    slot: &'a Mutex<Option<Uuid>>,
    run_id: Uuid,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.slot.lock() {
            if *guard == Some(self.run_id) {
                *guard = None;
            }
        }
    }
}

/// 수집 실행 조정자.
pub struct RunCoordinator {
    catalog: Arc<SeriesCatalog>,
    store: Arc<dyn MonitorStore>,
    orchestrator: FetchOrchestrator,
    checkpoints: CheckpointManager,
    quality: DataQualityMonitor,
    batch_size: usize,
    current_run: Mutex<Option<Uuid>>,
}

impl RunCoordinator {
    /// 새 조정자 생성
    pub fn new(
        catalog: Arc<SeriesCatalog>,
        store: Arc<dyn MonitorStore>,
        provider: Arc<dyn ObservationProvider>,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            orchestrator: FetchOrchestrator::new(
                provider,
                Arc::clone(&store),
                config.full_sync_years,
            ),
            checkpoints: CheckpointManager::new(Arc::clone(&store), config.max_checkpoint_retries),
            quality: DataQualityMonitor::new(),
            batch_size: config.batch_size.max(1),
            catalog,
            store,
            current_run: Mutex::new(None),
        }
    }

    /// 체크포인트 관리자
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// 시계열 카탈로그
    pub fn catalog(&self) -> &SeriesCatalog {
        &self.catalog
    }

    /// 진행 중인 실행 ID
    pub fn current_run_id(&self) -> Option<Uuid> {
        self.current_run.lock().ok().and_then(|guard| *guard)
    }

    /// 실행 슬롯 점유. 비어 있을 때만 `run_id`로 채웁니다 (확인과 점유가 한 잠금 안에서 일어남).
    fn claim_run(&self, run_id: Uuid) -> Result<RunSlot<'_>> {
        let mut guard = self
            .current_run
            .lock()
            .map_err(|_| CollectorError::Checkpoint("run slot lock poisoned".to_string()))?;
        if let Some(active) = *guard {
            return Err(CollectorError::RunInProgress(active));
        }
        *guard = Some(run_id);
        Ok(RunSlot {
            slot: &self.current_run,
            run_id,
        })
    }

    /// 대상 시계열 결정: 명시 ID → 모드의 주기 그룹 → 전체
    pub fn resolve_targets(&self, options: &RunOptions) -> Vec<Series> {
        match &options.series_ids {
            Some(ids) if !ids.is_empty() => {
                let mut seen = HashSet::new();
                ids.iter()
                    .map(|id| id.trim())
                    .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
                    .map(|id| self.catalog.resolve(id))
                    .collect()
            }
            _ => match options.mode.cadence() {
                Some(cadence) => self.catalog.by_cadence(cadence),
                None => self.catalog.all().to_vec(),
            },
        }
    }

    /// 수집 실행.
    ///
    /// 한 번에 하나의 실행만 허용합니다. 다른 실행이 진행 중이면
    /// [`CollectorError::RunInProgress`]를 반환하고 아무것도 수집하지 않습니다.
    /// 수집 중 실패는 전파하지 않으며, 실행 기록의 상태와 에러 맵으로 남습니다.
    pub async fn run_collection(&self, options: RunOptions) -> Result<CollectionRun> {
        let mut run = CollectionRun::start(options.run_type, options.mode);
        let _slot = self.claim_run(run.id)?;

        if let Err(e) = self.store.insert_run(&run).await {
            warn!(run_id = %run.id, error = %e, "실행 기록 저장 실패");
        }

        let targets = self.resolve_targets(&options);
        info!(
            run_id = %run.id,
            run_type = options.run_type.as_str(),
            mode = options.mode.as_str(),
            targets = targets.len(),
            "수집 실행 시작"
        );

        let today = Utc::now().date_naive();
        for cadence in Cadence::ALL {
            let group: Vec<Series> = targets
                .iter()
                .filter(|s| s.cadence == cadence)
                .cloned()
                .collect();
            if group.is_empty() {
                continue;
            }
            for result in self.run_group(run.id, cadence, group, &options, today).await {
                run.record(result);
            }
        }

        run.finalize();

        let issues = self.quality.evaluate(&run.results);
        for issue in &issues {
            counter!("collector_quality_issues_total", "type" => issue.issue_type.as_str())
                .increment(1);
        }
        if !issues.is_empty() {
            if let Err(e) = self.store.insert_quality_issues(run.id, &issues).await {
                warn!(run_id = %run.id, error = %e, "품질 이슈 저장 실패");
            }
        }

        if let Err(e) = self.store.update_run(&run).await {
            warn!(run_id = %run.id, error = %e, "실행 기록 갱신 실패");
        }

        counter!("collector_runs_total", "status" => run.status.as_str()).increment(1);
        run.log_summary();
        Ok(run)
    }

    /// 주기 그룹 1개를 배치 단위로 수집
    async fn run_group(
        &self,
        run_id: Uuid,
        cadence: Cadence,
        group: Vec<Series>,
        options: &RunOptions,
        today: NaiveDate,
    ) -> Vec<FetchResult> {
        let policy = self.catalog.window_policy(cadence);
        let source = group_source(cadence);
        let recovery = options.run_type == RunType::Recovery;

        let mut batch_items: Vec<BatchItem> = Vec::new();
        let mut pending = group;

        if recovery {
            match self.checkpoints.latest_batch_items(&source).await {
                Ok(done) => {
                    let done: Vec<BatchItem> = done
                        .into_iter()
                        .filter(|item| pending.iter().any(|s| s.id == item.item_id))
                        .collect();
                    let done_ids: HashSet<&str> =
                        done.iter().map(|item| item.item_id.as_str()).collect();
                    pending.retain(|s| !done_ids.contains(s.id.as_str()));
                    if !done.is_empty() {
                        info!(
                            cadence = cadence.as_str(),
                            skipped = done.len(),
                            remaining = pending.len(),
                            "이전 배치에서 성공한 시계열 건너뜀"
                        );
                    }
                    batch_items.extend(done);
                }
                Err(e) => {
                    warn!(cadence = cadence.as_str(), error = %e, "배치 체크포인트 조회 실패");
                }
            }
        }

        let batches: Vec<&[Series]> = pending.chunks(self.batch_size).collect();
        let batch_count = batches.len();
        let mut results = Vec::with_capacity(pending.len());

        for (index, batch) in batches.into_iter().enumerate() {
            debug!(
                cadence = cadence.as_str(),
                batch = index + 1,
                total = batch_count,
                size = batch.len(),
                "배치 수집 시작"
            );

            let tasks = batch.iter().map(|series| {
                self.process_series(run_id, series, options, recovery, today)
                    .instrument(monitor_core::series_span!("collect_series", series.id, run_id))
            });

            for (item, result) in join_all(tasks).await {
                batch_items.push(item);
                if let Some(result) = result {
                    results.push(result);
                }
            }

            let batch_id = format!("{}:{}", run_id, index + 1);
            if let Err(e) = self
                .checkpoints
                .create_batch_checkpoint(Some(run_id), &source, &batch_id, batch_items.clone())
                .await
            {
                warn!(source = %source, error = %e, "배치 체크포인트 저장 실패");
            }

            if index + 1 < batch_count {
                tokio::time::sleep(rate_limit_pause(&policy, self.batch_size)).await;
            }
        }

        results
    }

    /// 시계열 1개 수집 및 체크포인트 기록.
    ///
    /// 복구 판단으로 건너뛴 경우 수집 결과는 `None`입니다.
    async fn process_series(
        &self,
        run_id: Uuid,
        series: &Series,
        options: &RunOptions,
        recovery: bool,
        today: NaiveDate,
    ) -> (BatchItem, Option<FetchResult>) {
        let policy = series.window_policy();
        let mut fetch_options = FetchOptions {
            force_full_sync: options.force_full_sync(),
            resume_from: None,
        };

        if recovery {
            match self
                .checkpoints
                .get_recovery_info(&series.id, RecoveryOptions::default())
                .await
            {
                Ok(info) => match info.action {
                    RecoveryAction::Skip => {
                        debug!(message = %info.message, "복구 판단: 건너뜀");
                        return (
                            BatchItem::new(&series.id, ItemOutcome::Skipped, None),
                            None,
                        );
                    }
                    RecoveryAction::Restart => {
                        warn!(message = %info.message, "복구 판단: 전체 재동기화");
                        fetch_options.force_full_sync = true;
                    }
                    RecoveryAction::Resume => {
                        debug!(message = %info.message, "복구 판단: 재개");
                        fetch_options.resume_from =
                            info.resume_position.and_then(date_from_position);
                    }
                },
                Err(e) => warn!(error = %e, "복구 정보 조회 실패, 일반 수집"),
            }
        }

        let window_start = self
            .orchestrator
            .resolve_window(series, &policy, fetch_options, today)
            .await;

        let checkpoint_id = match self
            .checkpoints
            .create_data_checkpoint(
                Some(run_id),
                &series.id,
                position_from_date(window_start),
                position_from_date(window_start),
                None,
                CheckpointPayload::Data {
                    window_start: Some(window_start),
                    window_end: Some(today),
                    last_date: None,
                },
            )
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "데이터 체크포인트 생성 실패");
                None
            }
        };

        let result = self
            .orchestrator
            .fetch_window(series, &policy, window_start, today)
            .await;

        let outcome = if result.success { "success" } else { "failed" };
        counter!(
            "collector_fetch_total",
            "cadence" => series.cadence.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        if result.success {
            counter!("collector_records_inserted_total").increment(result.inserted as u64);
            if let Some(id) = &checkpoint_id {
                if let Err(e) = self
                    .checkpoints
                    .update_status(
                        id,
                        CheckpointStatus::Completed,
                        Some(position_from_date(result.window_end)),
                        Some(result.inserted as i64),
                    )
                    .await
                {
                    warn!(error = %e, "체크포인트 완료 처리 실패");
                }
            }
            return (
                BatchItem::new(&series.id, ItemOutcome::Success, None),
                Some(result),
            );
        }

        let message = result
            .errors
            .last()
            .cloned()
            .unwrap_or_else(|| "unknown error".to_string());

        if let Some(id) = &checkpoint_id {
            if let Err(e) = self
                .checkpoints
                .update_status(id, CheckpointStatus::Paused, None, None)
                .await
            {
                warn!(error = %e, "체크포인트 중단 처리 실패");
            }
        }

        let mut context = BTreeMap::new();
        context.insert("cadence".to_string(), series.cadence.as_str().to_string());
        context.insert("window_start".to_string(), window_start.to_string());
        context.insert("window_end".to_string(), today.to_string());
        context.insert("attempts".to_string(), result.errors.len().to_string());
        if let Some(id) = &checkpoint_id {
            context.insert("checkpoint_id".to_string(), id.clone());
        }
        if let Err(e) = self
            .checkpoints
            .create_error_checkpoint(Some(run_id), &series.id, &message, context)
            .await
        {
            warn!(error = %e, "에러 체크포인트 생성 실패");
        }

        (
            BatchItem::new(&series.id, ItemOutcome::Failed, Some(message)),
            Some(result),
        )
    }
}

/// 배치 사이 대기 시간
fn rate_limit_pause(policy: &WindowPolicy, batch_size: usize) -> std::time::Duration {
    policy.rate_limit_delay() * u32::try_from(batch_size).unwrap_or(u32::MAX)
}
