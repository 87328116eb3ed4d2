//! 데이터 품질 모니터.
//!
//! 실행 종료 후 수집 결과의 누락 날짜와 반복 실패를 품질 이슈로 변환합니다.
//! 휴일/주말 등 정상적인 미발표일은 이미 발표 캘린더에서 걸러진 상태로
//! 들어옵니다.

use monitor_core::{DataQualityIssue, FetchResult};

/// 시계열당 개별 `missing` 이슈 최대 개수
pub const MAX_MISSING_PER_SERIES: usize = 5;

/// `stale` 이슈를 만드는 실행 내 실패 횟수
pub const STALE_FAILURE_THRESHOLD: usize = 2;

/// 데이터 품질 모니터
#[derive(Debug, Clone)]
pub struct DataQualityMonitor {
    max_missing_per_series: usize,
    stale_failure_threshold: usize,
}

impl Default for DataQualityMonitor {
    fn default() -> Self {
        Self {
            max_missing_per_series: MAX_MISSING_PER_SERIES,
            stale_failure_threshold: STALE_FAILURE_THRESHOLD,
        }
    }
}

impl DataQualityMonitor {
    /// 기본 기준으로 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 수집 결과에서 품질 이슈 추출.
    ///
    /// - 누락 날짜는 앞에서부터 최대 5건까지 `missing`(medium)
    /// - 5건을 넘으면 전체 구간을 덮는 `gap`(high) 1건 추가
    /// - 같은 실행에서 2번 이상 실패했으면 재시도 끝에 성공했어도 `stale`(high) 1건
    pub fn evaluate(&self, results: &[FetchResult]) -> Vec<DataQualityIssue> {
        let mut issues = Vec::new();

        for result in results {
            issues.extend(
                result
                    .missing_dates
                    .iter()
                    .take(self.max_missing_per_series)
                    .map(|date| DataQualityIssue::missing(&result.series_id, *date)),
            );

            if result.missing_dates.len() > self.max_missing_per_series {
                if let (Some(first), Some(last)) =
                    (result.missing_dates.first(), result.missing_dates.last())
                {
                    issues.push(DataQualityIssue::gap(
                        &result.series_id,
                        *first,
                        *last,
                        result.missing_dates.len(),
                    ));
                }
            }

            if result.errors.len() >= self.stale_failure_threshold {
                issues.push(DataQualityIssue::stale(
                    &result.series_id,
                    result.errors.len(),
                ));
            }
        }

        if !issues.is_empty() {
            tracing::warn!(
                issues = issues.len(),
                series = results.len(),
                "데이터 품질 이슈 발견"
            );
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use monitor_core::{Cadence, IssueSeverity, IssueType};

    fn result(id: &str, missing: usize, success: bool, errors: usize) -> FetchResult {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut r = FetchResult::new(id, Cadence::Daily, start, start + Duration::days(30));
        r.missing_dates = (0..missing as i64).map(|i| start + Duration::days(i)).collect();
        r.success = success;
        r.errors = (0..errors).map(|i| format!("attempt {}/3: timeout", i + 1)).collect();
        r
    }

    #[test]
    fn test_clean_results_have_no_issues() {
        let monitor = DataQualityMonitor::new();
        assert!(monitor.evaluate(&[result("DFF", 0, true, 0)]).is_empty());
    }

    #[test]
    fn test_missing_dates_are_capped_with_gap_summary() {
        let issues = DataQualityMonitor::new().evaluate(&[result("DGS10", 9, true, 0)]);

        let missing: Vec<_> = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::Missing)
            .collect();
        assert_eq!(missing.len(), 5);
        assert!(missing.iter().all(|i| i.severity == IssueSeverity::Medium));

        let gaps: Vec<_> = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::Gap)
            .collect();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].severity, IssueSeverity::High);
        assert_eq!(gaps[0].date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(gaps[0].date_to, NaiveDate::from_ymd_opt(2024, 1, 9));
        assert!(gaps[0].description.contains('9'));
    }

    #[test]
    fn test_exactly_five_missing_has_no_gap() {
        let issues = DataQualityMonitor::new().evaluate(&[result("SOFR", 5, true, 0)]);
        assert_eq!(issues.len(), 5);
    }

    #[test]
    fn test_repeated_failure_is_stale() {
        let issues = DataQualityMonitor::new().evaluate(&[
            result("ICSA", 0, false, 3),
            result("WALCL", 0, false, 1),
            result("GDP", 0, true, 2),
        ]);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.issue_type == IssueType::Stale));
        assert!(issues.iter().all(|i| i.severity == IssueSeverity::High));
        assert_eq!(issues[0].series_id, "ICSA");
        // 두 번 실패 후 세 번째 시도에서 성공한 시계열도 포함
        assert_eq!(issues[1].series_id, "GDP");
        assert!(!issues.iter().any(|i| i.series_id == "WALCL"));
    }
}
