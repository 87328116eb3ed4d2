//! 시계열 참조 데이터와 업데이트 주기 분류.
//!
//! 각 시계열은 발표 주기(일/주/월/분기)를 가지며, 주기별로 요청 윈도우 크기와
//! 요청 간격이 달라집니다. 빠르게 움직이는 일별 지표는 짧은 윈도우로 자주,
//! 느린 지표는 긴 윈도우로 드물게 조회합니다.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::MonitorError;

/// 시계열 업데이트 주기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// 일별
    Daily,
    /// 주별
    Weekly,
    /// 월별
    Monthly,
    /// 분기별
    Quarterly,
}

impl Cadence {
    /// 전체 주기 (수집 순서)
    pub const ALL: [Cadence; 4] = [
        Cadence::Daily,
        Cadence::Weekly,
        Cadence::Monthly,
        Cadence::Quarterly,
    ];

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    /// 주기별 기본 윈도우 정책
    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy::for_cadence(*self)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "d" => Ok(Self::Daily),
            "weekly" | "w" => Ok(Self::Weekly),
            "monthly" | "m" => Ok(Self::Monthly),
            "quarterly" | "q" => Ok(Self::Quarterly),
            other => Err(MonitorError::InvalidInput(format!(
                "알 수 없는 주기: {}",
                other
            ))),
        }
    }
}

/// 주기별 조회 윈도우 및 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPolicy {
    /// 증분 조회 시 마지막 관측일로부터 되돌아갈 일수
    pub max_window_days: i64,
    /// 요청 간 딜레이 (밀리초)
    pub rate_limit_delay_ms: u64,
    /// 최대 시도 횟수
    pub retry_attempts: u32,
    /// 재시도 기본 딜레이 (밀리초, 시도 횟수에 비례해 증가)
    pub retry_delay_ms: u64,
    /// 발표 지연 일수 (이 기간 내 날짜는 아직 미발표로 간주)
    pub publication_lag_days: i64,
}

impl WindowPolicy {
    /// 주기별 기본 정책
    pub fn for_cadence(cadence: Cadence) -> Self {
        match cadence {
            Cadence::Daily => Self {
                max_window_days: 7,
                rate_limit_delay_ms: 200,
                retry_attempts: 3,
                retry_delay_ms: 1000,
                publication_lag_days: 3,
            },
            Cadence::Weekly => Self {
                max_window_days: 14,
                rate_limit_delay_ms: 300,
                retry_attempts: 3,
                retry_delay_ms: 2000,
                publication_lag_days: 10,
            },
            Cadence::Monthly => Self {
                max_window_days: 60,
                rate_limit_delay_ms: 500,
                retry_attempts: 3,
                retry_delay_ms: 2000,
                publication_lag_days: 45,
            },
            Cadence::Quarterly => Self {
                max_window_days: 180,
                rate_limit_delay_ms: 500,
                retry_attempts: 3,
                retry_delay_ms: 3000,
                publication_lag_days: 120,
            },
        }
    }

    /// 요청 간 딜레이를 Duration으로 반환
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// 재시도 기본 딜레이를 Duration으로 반환
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// 추적 대상 시계열 (불변 참조 데이터).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// 시계열 식별자 (예: "UNRATE")
    pub id: String,
    /// 표시 이름
    pub name: String,
    /// 업데이트 주기
    pub cadence: Cadence,
    /// 고정 발표 요일 (주별 시계열에서만 의미 있음)
    #[serde(default)]
    pub publication_weekday: Option<Weekday>,
    /// 주기 기본값 대신 사용할 발표 지연 일수
    #[serde(default)]
    pub publication_lag_days: Option<i64>,
}

impl Series {
    /// 새 시계열 생성
    pub fn new(id: impl Into<String>, name: impl Into<String>, cadence: Cadence) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cadence,
            publication_weekday: None,
            publication_lag_days: None,
        }
    }

    /// 발표 요일 지정
    pub fn with_weekday(mut self, weekday: Weekday) -> Self {
        self.publication_weekday = Some(weekday);
        self
    }

    /// 발표 지연 일수 지정
    pub fn with_publication_lag(mut self, days: i64) -> Self {
        self.publication_lag_days = Some(days);
        self
    }

    /// 이 시계열에 적용되는 윈도우 정책
    pub fn window_policy(&self) -> WindowPolicy {
        let mut policy = WindowPolicy::for_cadence(self.cadence);
        if let Some(lag) = self.publication_lag_days {
            policy.publication_lag_days = lag;
        }
        policy
    }
}

/// 시계열 카탈로그 (주기 분류기).
///
/// 정적 설정 위에서 동작하는 순수 조회이며, 등록되지 않은 시계열은
/// 가장 자주 재확인하는 `daily`로 분류합니다.
#[derive(Debug, Clone, Default)]
pub struct SeriesCatalog {
    series: Vec<Series>,
}

impl SeriesCatalog {
    /// 주어진 시계열 목록으로 카탈로그 생성
    pub fn new(series: Vec<Series>) -> Self {
        Self { series }
    }

    /// 설정 목록이 비어 있으면 기본 카탈로그 사용
    pub fn from_config(series: &[Series]) -> Self {
        if series.is_empty() {
            Self::default_catalog()
        } else {
            Self::new(series.to_vec())
        }
    }

    /// 기본 미국 경제 지표 카탈로그
    pub fn default_catalog() -> Self {
        Self::new(vec![
            Series::new("SOFR", "Secured Overnight Financing Rate", Cadence::Daily),
            Series::new("DFF", "Federal Funds Effective Rate", Cadence::Daily),
            Series::new("DGS2", "2-Year Treasury Yield", Cadence::Daily),
            Series::new("DGS10", "10-Year Treasury Yield", Cadence::Daily),
            Series::new("T10Y2Y", "10Y-2Y Treasury Spread", Cadence::Daily),
            Series::new("VIXCLS", "CBOE Volatility Index", Cadence::Daily),
            Series::new("DTWEXBGS", "Nominal Broad U.S. Dollar Index", Cadence::Daily),
            Series::new("ICSA", "Initial Jobless Claims", Cadence::Weekly)
                .with_weekday(Weekday::Sat),
            Series::new("WALCL", "Fed Total Assets", Cadence::Weekly).with_weekday(Weekday::Wed),
            Series::new("MORTGAGE30US", "30-Year Fixed Mortgage Rate", Cadence::Weekly)
                .with_weekday(Weekday::Thu),
            Series::new("UNRATE", "Unemployment Rate", Cadence::Monthly),
            Series::new("CPIAUCSL", "Consumer Price Index", Cadence::Monthly),
            Series::new("PAYEMS", "Nonfarm Payrolls", Cadence::Monthly),
            Series::new("FEDFUNDS", "Federal Funds Rate (Monthly)", Cadence::Monthly),
            Series::new("INDPRO", "Industrial Production Index", Cadence::Monthly),
            Series::new("GDP", "Gross Domestic Product", Cadence::Quarterly),
            Series::new("GDPC1", "Real Gross Domestic Product", Cadence::Quarterly),
        ])
    }

    /// 시계열의 업데이트 주기 (미등록 시 daily)
    pub fn classify(&self, series_id: &str) -> Cadence {
        self.get(series_id)
            .map(|s| s.cadence)
            .unwrap_or(Cadence::Daily)
    }

    /// 주기별 윈도우 정책
    pub fn window_policy(&self, cadence: Cadence) -> WindowPolicy {
        WindowPolicy::for_cadence(cadence)
    }

    /// ID로 시계열 조회
    pub fn get(&self, series_id: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.id == series_id)
    }

    /// ID로 시계열 조회 (미등록 시 daily 시계열로 간주)
    pub fn resolve(&self, series_id: &str) -> Series {
        self.get(series_id)
            .cloned()
            .unwrap_or_else(|| Series::new(series_id, series_id, Cadence::Daily))
    }

    /// 전체 시계열
    pub fn all(&self) -> &[Series] {
        &self.series
    }

    /// 특정 주기의 시계열
    pub fn by_cadence(&self, cadence: Cadence) -> Vec<Series> {
        self.series
            .iter()
            .filter(|s| s.cadence == cadence)
            .cloned()
            .collect()
    }

    /// 주기별 시계열 수
    pub fn counts_by_cadence(&self) -> BTreeMap<Cadence, usize> {
        let mut counts: BTreeMap<Cadence, usize> =
            Cadence::ALL.iter().map(|c| (*c, 0)).collect();
        for series in &self.series {
            *counts.entry(series.cadence).or_default() += 1;
        }
        counts
    }

    /// 등록된 시계열 수
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// 카탈로그가 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
