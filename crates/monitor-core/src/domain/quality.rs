//! 데이터 품질 이슈.
//!
//! 값 이상(anomaly)과 구분되는 *커버리지* 문제(누락/구간 누락/정체)를 표현합니다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 품질 이슈 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    /// 기대 날짜 누락
    Missing,
    /// 연속 구간 누락
    Gap,
    /// 반복 수집 실패로 데이터가 갱신되지 않음
    Stale,
}

impl IssueType {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Gap => "gap",
            Self::Stale => "stale",
        }
    }
}

/// 품질 이슈 심각도.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
}

impl IssueSeverity {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// 데이터 품질 이슈 (운영자 검토용, 생성 후 변경되지 않음).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct DataQualityIssue {
    /// 시계열 ID
    pub series_id: String,
    /// 이슈 종류
    pub issue_type: IssueType,
    /// 해당 날짜 또는 구간 시작
    pub date_from: Option<NaiveDate>,
    /// 구간 끝 (단일 날짜면 None)
    pub date_to: Option<NaiveDate>,
    /// 심각도
    pub severity: IssueSeverity,
    /// 설명
    pub description: String,
    /// 감지 시각
    pub detected_at: DateTime<Utc>,
}

impl DataQualityIssue {
    /// 단일 날짜 누락 이슈
    pub fn missing(series_id: impl Into<String>, date: NaiveDate) -> Self {
        let series_id = series_id.into();
        Self {
            description: format!("{} 관측값 누락: {}", series_id, date),
            series_id,
            issue_type: IssueType::Missing,
            date_from: Some(date),
            date_to: None,
            severity: IssueSeverity::Medium,
            detected_at: Utc::now(),
        }
    }

    /// 구간 누락 이슈
    pub fn gap(series_id: impl Into<String>, from: NaiveDate, to: NaiveDate, count: usize) -> Self {
        let series_id = series_id.into();
        Self {
            description: format!(
                "{} 관측값 {}건 누락 ({} ~ {})",
                series_id, count, from, to
            ),
            series_id,
            issue_type: IssueType::Gap,
            date_from: Some(from),
            date_to: Some(to),
            severity: IssueSeverity::High,
            detected_at: Utc::now(),
        }
    }

    /// 반복 실패 이슈
    pub fn stale(series_id: impl Into<String>, failures: usize) -> Self {
        let series_id = series_id.into();
        Self {
            description: format!("{} 수집 {}회 실패, 데이터가 갱신되지 않음", series_id, failures),
            series_id,
            issue_type: IssueType::Stale,
            date_from: None,
            date_to: None,
            severity: IssueSeverity::High,
            detected_at: Utc::now(),
        }
    }
}
