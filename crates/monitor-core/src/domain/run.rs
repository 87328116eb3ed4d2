//! 수집 결과 및 수집 실행(Run) 기록.
//!
//! `FetchResult`는 시계열 하나의 수집 결과이고, `CollectionRun`은 스케줄러 1회
//! 실행 전체를 요약합니다. Run은 시작 시 `running`으로 생성되어 Run Coordinator만
//! 갱신하며, 종료 시 에러 비율로 최종 상태가 결정된 뒤 감사 기록으로 저장됩니다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::series::Cadence;
use crate::error::MonitorError;

// =============================================================================
// FetchResult
// =============================================================================

/// 시계열 1개의 수집 결과.
///
/// 부분 성공을 표현하기 위해 `inserted`, `skipped`, `errors`는 서로 독립적인
/// 카운터입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct FetchResult {
    /// 시계열 ID
    pub series_id: String,
    /// 업데이트 주기
    pub cadence: Cadence,
    /// 요청 윈도우 시작일
    pub window_start: NaiveDate,
    /// 요청 윈도우 종료일
    pub window_end: NaiveDate,
    /// 제공자가 반환한 관측 수
    pub fetched: usize,
    /// 저장된 관측 수
    pub inserted: usize,
    /// 센티널 등으로 건너뛴 관측 수
    pub skipped: usize,
    /// 기대했지만 반환되지 않은 날짜
    pub missing_dates: Vec<NaiveDate>,
    /// 에러 메시지 (시도별 누적)
    pub errors: Vec<String>,
    /// 소요 시간 (밀리초)
    pub elapsed_ms: u64,
    /// 성공 여부
    pub success: bool,
}

impl FetchResult {
    /// 빈 결과 생성 (아직 성공하지 않은 상태)
    pub fn new(
        series_id: impl Into<String>,
        cadence: Cadence,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Self {
        Self {
            series_id: series_id.into(),
            cadence,
            window_start,
            window_end,
            fetched: 0,
            inserted: 0,
            skipped: 0,
            missing_dates: Vec::new(),
            errors: Vec::new(),
            elapsed_ms: 0,
            success: false,
        }
    }

    /// 에러가 하나라도 기록되었는지 여부
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

// =============================================================================
// Run 분류
// =============================================================================

/// 수집 실행 트리거 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// 주기 실행 (데몬)
    Scheduled,
    /// 수동 실행 (CLI/API)
    Manual,
    /// 백필
    Backfill,
    /// 체크포인트 기반 복구
    Recovery,
}

impl RunType {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
            Self::Backfill => "backfill",
            Self::Recovery => "recovery",
        }
    }
}

impl FromStr for RunType {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "manual" => Ok(Self::Manual),
            "backfill" => Ok(Self::Backfill),
            "recovery" => Ok(Self::Recovery),
            other => Err(MonitorError::InvalidInput(format!(
                "알 수 없는 실행 종류: {}",
                other
            ))),
        }
    }
}

/// 수집 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// 전체 시계열, 최근 윈도우만
    Incremental,
    /// 전체 시계열, 장기 구간 재동기화
    Full,
    /// 일별 그룹만
    Daily,
    /// 주별 그룹만
    Weekly,
    /// 월별 그룹만
    Monthly,
    /// 분기별 그룹만
    Quarterly,
}

impl RunMode {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    /// 주기 그룹 모드이면 해당 주기
    pub fn cadence(&self) -> Option<Cadence> {
        match self {
            Self::Daily => Some(Cadence::Daily),
            Self::Weekly => Some(Cadence::Weekly),
            Self::Monthly => Some(Cadence::Monthly),
            Self::Quarterly => Some(Cadence::Quarterly),
            Self::Incremental | Self::Full => None,
        }
    }

    /// 주기에 대응하는 모드
    pub fn for_cadence(cadence: Cadence) -> Self {
        match cadence {
            Cadence::Daily => Self::Daily,
            Cadence::Weekly => Self::Weekly,
            Cadence::Monthly => Self::Monthly,
            Cadence::Quarterly => Self::Quarterly,
        }
    }

    /// 장기 구간 재동기화 여부
    pub fn forces_full_sync(&self) -> bool {
        matches!(self, Self::Full)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(Self::Incremental),
            "full" => Ok(Self::Full),
            other => other.parse::<Cadence>().map(Self::for_cadence).map_err(|_| {
                MonitorError::InvalidInput(format!("알 수 없는 수집 모드: {}", other))
            }),
        }
    }
}

/// 수집 실행 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// 실행 중
    Running,
    /// 실패 없이 완료
    Completed,
    /// 절반 미만 실패
    Partial,
    /// 절반 이상 실패
    Failed,
}

impl RunStatus {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// 에러가 발생한 시계열 비율로 최종 상태 결정.
    ///
    /// 재시도 끝에 성공한 시계열도 에러가 있었으면 센다. 0건이면 `completed`,
    /// 절반 미만이면 `partial`, 그 외 `failed`.
    pub fn from_counts(total: usize, with_errors: usize) -> Self {
        if with_errors == 0 {
            Self::Completed
        } else if with_errors * 2 < total {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

impl FromStr for RunStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(MonitorError::InvalidInput(format!(
                "알 수 없는 실행 상태: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// CollectionRun
// =============================================================================

/// 스케줄러 1회 실행 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct CollectionRun {
    /// Run ID
    pub id: Uuid,
    /// 트리거 종류
    pub run_type: RunType,
    /// 수집 모드
    pub mode: RunMode,
    /// 상태
    pub status: RunStatus,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각
    pub finished_at: Option<DateTime<Utc>>,
    /// 대상 시계열 수
    pub total_series: usize,
    /// 성공 시계열 수
    pub succeeded_series: usize,
    /// 실패 시계열 수
    pub failed_series: usize,
    /// 총 반환 관측 수
    pub total_fetched: usize,
    /// 총 저장 관측 수
    pub total_inserted: usize,
    /// 총 건너뛴 관측 수
    pub total_skipped: usize,
    /// 총 누락 날짜 수
    pub total_missing: usize,
    /// 시계열별 에러 목록
    pub errors: BTreeMap<String, Vec<String>>,
    /// 시계열별 수집 결과
    pub results: Vec<FetchResult>,
}

impl CollectionRun {
    /// 새 실행 시작 (status = running)
    pub fn start(run_type: RunType, mode: RunMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_type,
            mode,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            total_series: 0,
            succeeded_series: 0,
            failed_series: 0,
            total_fetched: 0,
            total_inserted: 0,
            total_skipped: 0,
            total_missing: 0,
            errors: BTreeMap::new(),
            results: Vec::new(),
        }
    }

    /// 시계열 수집 결과 반영
    pub fn record(&mut self, result: FetchResult) {
        self.total_series += 1;
        if result.success {
            self.succeeded_series += 1;
        } else {
            self.failed_series += 1;
        }
        self.total_fetched += result.fetched;
        self.total_inserted += result.inserted;
        self.total_skipped += result.skipped;
        self.total_missing += result.missing_dates.len();
        if result.has_errors() {
            self.errors
                .entry(result.series_id.clone())
                .or_default()
                .extend(result.errors.iter().cloned());
        }
        self.results.push(result);
    }

    /// 실행 종료: 종료 시각 기록 및 최종 상태 결정
    pub fn finalize(&mut self) {
        self.finished_at = Some(Utc::now());
        self.status = RunStatus::from_counts(self.total_series, self.errors.len());
    }

    /// 소요 시간 (밀리초)
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total_series == 0 {
            0.0
        } else {
            (self.succeeded_series as f64 / self.total_series as f64) * 100.0
        }
    }

    /// 실행 요약 로그 출력
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.id,
            run_type = self.run_type.as_str(),
            mode = self.mode.as_str(),
            status = self.status.as_str(),
            total = self.total_series,
            succeeded = self.succeeded_series,
            failed = self.failed_series,
            fetched = self.total_fetched,
            inserted = self.total_inserted,
            skipped = self.total_skipped,
            missing = self.total_missing,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed_ms = self.duration_ms().unwrap_or_default(),
            "수집 실행 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, success: bool, errors: usize) -> FetchResult {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut r = FetchResult::new(id, Cadence::Daily, date, date);
        r.success = success;
        r.errors = (0..errors).map(|i| format!("attempt {} failed", i + 1)).collect();
        r
    }

    fn run_with(failed: usize, total: usize) -> CollectionRun {
        let mut run = CollectionRun::start(RunType::Manual, RunMode::Incremental);
        for i in 0..total {
            let ok = i >= failed;
            run.record(result(&format!("S{}", i), ok, if ok { 0 } else { 3 }));
        }
        run.finalize();
        run
    }

    #[test]
    fn test_run_status_from_error_ratio() {
        assert_eq!(run_with(0, 10).status, RunStatus::Completed);
        assert_eq!(run_with(1, 10).status, RunStatus::Partial);
        assert_eq!(run_with(4, 10).status, RunStatus::Partial);
        assert_eq!(run_with(5, 10).status, RunStatus::Failed);
        assert_eq!(run_with(6, 10).status, RunStatus::Failed);
    }

    #[test]
    fn test_empty_run_is_completed() {
        let run = run_with(0, 0);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_error_map_keeps_recovered_retries() {
        let mut run = CollectionRun::start(RunType::Scheduled, RunMode::Daily);
        run.record(result("DGS10", true, 1));
        run.record(result("DGS2", false, 3));
        run.finalize();

        assert_eq!(run.succeeded_series, 1);
        assert_eq!(run.failed_series, 1);
        assert_eq!(run.errors["DGS10"].len(), 1);
        assert_eq!(run.errors["DGS2"].len(), 3);
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[test]
    fn test_recovered_retry_is_not_completed() {
        let mut run = CollectionRun::start(RunType::Manual, RunMode::Incremental);
        run.record(result("DFF", true, 1));
        run.record(result("SOFR", true, 0));
        run.record(result("DGS2", true, 0));
        run.finalize();

        assert_eq!(run.failed_series, 0);
        assert_eq!(run.status, RunStatus::Partial);
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("full".parse::<RunMode>().unwrap(), RunMode::Full);
        assert_eq!("Monthly".parse::<RunMode>().unwrap(), RunMode::Monthly);
        assert_eq!(RunMode::Weekly.cadence(), Some(Cadence::Weekly));
        assert!(RunMode::Full.forces_full_sync());
        assert!("hourly".parse::<RunMode>().is_err());
    }
}
