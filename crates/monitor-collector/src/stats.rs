//! 스케줄러 통계 및 데이터 신선도.
//!
//! 트리거 인터페이스와 함께 제공되는 읽기 전용 통계입니다: 주기별 시계열 수,
//! 마지막 실행, 최근 실행, 시계열별 신선도 (마지막 관측 이후 경과일).

use chrono::NaiveDate;
use monitor_core::{Cadence, CollectionRun, RunStatus, SeriesCatalog};
use monitor_data::MonitorStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::Result;

/// 신선도 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// 정상
    Fresh,
    /// 주의 (경고 기준 초과)
    Warning,
    /// 오래됨 (위험 기준 초과)
    Stale,
    /// 저장된 관측 없음
    NoData,
}

impl Freshness {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Warning => "warning",
            Self::Stale => "stale",
            Self::NoData => "no_data",
        }
    }
}

/// 주기별 신선도 기준 (경고, 위험) 일수
pub fn freshness_thresholds(cadence: Cadence) -> (i64, i64) {
    match cadence {
        Cadence::Daily => (3, 7),
        Cadence::Weekly => (10, 21),
        Cadence::Monthly => (45, 75),
        Cadence::Quarterly => (120, 200),
    }
}

/// 마지막 관측 이후 경과일로 신선도 판단
pub fn classify_freshness(cadence: Cadence, days_since: Option<i64>) -> Freshness {
    let Some(days) = days_since else {
        return Freshness::NoData;
    };
    let (warning, stale) = freshness_thresholds(cadence);
    if days > stale {
        Freshness::Stale
    } else if days > warning {
        Freshness::Warning
    } else {
        Freshness::Fresh
    }
}

/// 시계열별 신선도
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesFreshness {
    pub series_id: String,
    pub cadence: Cadence,
    pub last_date: Option<NaiveDate>,
    pub days_since: Option<i64>,
    pub freshness: Freshness,
}

/// 실행 요약 (최근 실행 목록용)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub run_type: String,
    pub mode: String,
    pub status: RunStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total_series: usize,
    pub failed_series: usize,
    pub total_inserted: usize,
}

impl From<&CollectionRun> for RunSummary {
    fn from(run: &CollectionRun) -> Self {
        Self {
            id: run.id,
            run_type: run.run_type.as_str().to_string(),
            mode: run.mode.as_str().to_string(),
            status: run.status,
            started_at: run.started_at,
            finished_at: run.finished_at,
            total_series: run.total_series,
            failed_series: run.failed_series,
            total_inserted: run.total_inserted,
        }
    }
}

/// 스케줄러 통계
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// 주기별 시계열 수
    pub series_counts: BTreeMap<Cadence, usize>,
    /// 마지막 실행
    pub last_run: Option<RunSummary>,
    /// 최근 실행 (최신순)
    pub recent_runs: Vec<RunSummary>,
    /// 시계열별 신선도
    pub freshness: Vec<SeriesFreshness>,
}

impl SchedulerStats {
    /// 저장소에서 통계 수집
    pub async fn collect(
        store: &dyn MonitorStore,
        catalog: &SeriesCatalog,
        today: NaiveDate,
        recent_limit: usize,
    ) -> Result<Self> {
        let runs = store.recent_runs(recent_limit).await?;
        let recent_runs: Vec<RunSummary> = runs.iter().map(RunSummary::from).collect();

        let mut freshness = Vec::with_capacity(catalog.len());
        for series in catalog.all() {
            let last_date = store
                .latest_observation(&series.id)
                .await?
                .map(|obs| obs.date);
            let days_since = last_date.map(|d| (today - d).num_days());
            freshness.push(SeriesFreshness {
                series_id: series.id.clone(),
                cadence: series.cadence,
                last_date,
                days_since,
                freshness: classify_freshness(series.cadence, days_since),
            });
        }

        Ok(Self {
            series_counts: catalog.counts_by_cadence(),
            last_run: recent_runs.first().cloned(),
            recent_runs,
            freshness,
        })
    }

    /// 신선도 구간별 시계열 수
    pub fn freshness_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.freshness {
            *counts.entry(item.freshness.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self) {
        let counts = self.freshness_counts();
        tracing::info!(
            series = self.freshness.len(),
            fresh = counts.get("fresh").copied().unwrap_or(0),
            warning = counts.get("warning").copied().unwrap_or(0),
            stale = counts.get("stale").copied().unwrap_or(0),
            no_data = counts.get("no_data").copied().unwrap_or(0),
            last_run = ?self.last_run.as_ref().map(|r| r.id),
            "스케줄러 통계"
        );
    }
}
