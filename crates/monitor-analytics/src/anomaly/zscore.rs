//! 롤링 윈도우 z-score 이상 탐지.
//!
//! 현재 값을 시계열 자신의 최근 이력과 비교해 분류합니다.
//!
//! # 알고리즘
//!
//! 1. 이력이 `min_data_points` 미만이면 중립 결과 (`InsufficientData`)
//! 2. 최근 `window_size`개 값만 사용 (롤링 윈도우)
//! 3. 표본 평균과 **표본 표준편차** (n−1로 나눔)
//! 4. `z = (현재 − 평균) / 표준편차` (표준편차 0이면 z = 0)
//! 5. 백분위: 윈도우에서 현재 값보다 *엄격히 작은* 값의 비율 (순위 기반)
//! 6. 추세: 윈도우 후반부 평균 vs 전반부 평균 (±2%)
//! 7. 변동성: 변동계수(표준편차/|평균|) 0.02 / 0.05 기준
//! 8. 심각도: |z| ≤ 경고 → normal, ≤ 위험 → warning, 그 외 critical
//!
//! 경제 시계열은 꼬리가 두꺼운 경우가 많아 백분위는 정규분포 가정 없이
//! 순위로 계산합니다.

use monitor_core::AnomalySettings;
use serde::{Deserialize, Serialize};

/// 추세 판단 기준 (전반부 대비 후반부 평균 변화율)
const TREND_THRESHOLD: f64 = 0.02;
/// 변동계수 low/medium 경계
const CV_LOW: f64 = 0.02;
/// 변동계수 medium/high 경계
const CV_HIGH: f64 = 0.05;

/// 이상 탐지 설정.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnomalyConfig {
    /// 경고 임계값 (|z|)
    pub warning_threshold: f64,
    /// 위험 임계값 (|z|)
    pub critical_threshold: f64,
    /// 분류에 필요한 최소 이력 수
    pub min_data_points: usize,
    /// 롤링 윈도우 크기
    pub window_size: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 2.0,
            critical_threshold: 3.0,
            min_data_points: 12,
            window_size: 24,
        }
    }
}

impl From<&AnomalySettings> for AnomalyConfig {
    fn from(settings: &AnomalySettings) -> Self {
        Self {
            warning_threshold: settings.warning_threshold,
            critical_threshold: settings.critical_threshold,
            min_data_points: settings.min_data_points,
            window_size: settings.window_size,
        }
    }
}

/// 이상 심각도.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// |z|와 임계값으로 심각도 결정
    pub fn from_z(z: f64, warning: f64, critical: f64) -> Self {
        let abs_z = z.abs();
        if abs_z <= warning {
            Self::Normal
        } else if abs_z <= critical {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

/// 윈도우 내 추세.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// 윈도우 변동성 수준.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
}

/// z-score 분류 결과 (저장되지 않는 파생값).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZScoreResult {
    /// z-score
    pub z_score: f64,
    /// 윈도우 평균
    pub mean: f64,
    /// 윈도우 표본 표준편차
    pub std_dev: f64,
    /// 평균 대비 편차 (%)
    pub deviation_pct: f64,
    /// 순위 기반 백분위 (0~100)
    pub percentile: f64,
    /// 심각도
    pub severity: Severity,
    /// 추세
    pub trend: Trend,
    /// 변동성
    pub volatility: VolatilityLevel,
    /// 분류에 사용된 윈도우 크기
    pub window_used: usize,
    /// 방향 설명 (한국어)
    pub description_ko: String,
    /// 방향 설명 (영어)
    pub description_en: String,
}

/// 이상 탐지 결과.
///
/// 이력이 부족한 경우를 별도 변형으로 분리해, 호출자가 z-score나 백분위의
/// 존재 여부를 확인하지 않고 사용하는 일을 막습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnomalyOutcome {
    /// 이력 부족 (항상 normal로 취급)
    InsufficientData { available: usize, required: usize },
    /// 분류 완료
    Classified(ZScoreResult),
}

impl AnomalyOutcome {
    /// z-score (이력 부족 시 0)
    pub fn z_score(&self) -> f64 {
        match self {
            Self::InsufficientData { .. } => 0.0,
            Self::Classified(result) => result.z_score,
        }
    }

    /// 심각도 (이력 부족 시 normal)
    pub fn severity(&self) -> Severity {
        match self {
            Self::InsufficientData { .. } => Severity::Normal,
            Self::Classified(result) => result.severity,
        }
    }

    /// 백분위 (이력 부족 시 50)
    pub fn percentile(&self) -> f64 {
        match self {
            Self::InsufficientData { .. } => 50.0,
            Self::Classified(result) => result.percentile,
        }
    }

    /// 경고 이상인지 여부
    pub fn is_anomalous(&self) -> bool {
        self.severity() != Severity::Normal
    }

    /// 분류 결과 참조
    pub fn as_classified(&self) -> Option<&ZScoreResult> {
        match self {
            Self::Classified(result) => Some(result),
            Self::InsufficientData { .. } => None,
        }
    }
}

/// 현재 값을 이력과 비교해 분류합니다.
///
/// `historical`은 시간순(오래된 값 → 최신 값)이어야 하며, 유한하지 않은 값은
/// 무시합니다.
pub fn classify(current: f64, historical: &[f64], config: &AnomalyConfig) -> AnomalyOutcome {
    let finite: Vec<f64> = historical.iter().copied().filter(|v| v.is_finite()).collect();

    if finite.len() < config.min_data_points || finite.is_empty() {
        return AnomalyOutcome::InsufficientData {
            available: finite.len(),
            required: config.min_data_points,
        };
    }

    let window_len = config.window_size.max(1).min(finite.len());
    let window = &finite[finite.len() - window_len..];

    let mean = mean(window);
    let std_dev = sample_std_dev(window, mean);
    let z_score = if std_dev > 0.0 && current.is_finite() {
        (current - mean) / std_dev
    } else {
        0.0
    };

    let deviation_pct = if mean != 0.0 {
        (current - mean) / mean.abs() * 100.0
    } else {
        0.0
    };

    let severity = Severity::from_z(z_score, config.warning_threshold, config.critical_threshold);
    let (description_ko, description_en) = describe(z_score, severity);

    AnomalyOutcome::Classified(ZScoreResult {
        z_score,
        mean,
        std_dev,
        deviation_pct,
        percentile: rank_percentile(current, window),
        severity,
        trend: trend(window),
        volatility: volatility(mean, std_dev),
        window_used: window_len,
        description_ko,
        description_en,
    })
}

/// 시간순 값 목록의 마지막 값을 그 이전 값들과 비교해 분류합니다.
///
/// 값이 없으면 `None`.
pub fn classify_latest(values: &[f64], config: &AnomalyConfig) -> Option<AnomalyOutcome> {
    let (current, historical) = values.split_last()?;
    Some(classify(*current, historical, config))
}

/// 산술 평균. 모든 값이 같으면 합산 반올림 오차 없이 그 값을 그대로 반환합니다.
fn mean(values: &[f64]) -> f64 {
    if is_constant(values) {
        return values[0];
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn is_constant(values: &[f64]) -> bool {
    values.first().is_some_and(|first| values.iter().all(|v| v == first))
}

/// 표본 표준편차 (n−1). 값이 하나이거나 모두 같으면 정확히 0.
fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 || is_constant(values) {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// 윈도우에서 현재 값보다 엄격히 작은 값의 비율 (%)
fn rank_percentile(current: f64, window: &[f64]) -> f64 {
    let below = window.iter().filter(|v| **v < current).count();
    below as f64 / window.len() as f64 * 100.0
}

fn trend(window: &[f64]) -> Trend {
    let mid = window.len() / 2;
    if mid == 0 {
        return Trend::Stable;
    }
    let older = mean(&window[..mid]);
    let newer = mean(&window[mid..]);

    let change = if older != 0.0 {
        (newer - older) / older.abs()
    } else {
        newer - older
    };

    if change > TREND_THRESHOLD {
        Trend::Up
    } else if change < -TREND_THRESHOLD {
        Trend::Down
    } else {
        Trend::Stable
    }
}

fn volatility(mean: f64, std_dev: f64) -> VolatilityLevel {
    if mean == 0.0 {
        return if std_dev == 0.0 {
            VolatilityLevel::Low
        } else {
            VolatilityLevel::High
        };
    }
    let cv = std_dev / mean.abs();
    if cv < CV_LOW {
        VolatilityLevel::Low
    } else if cv < CV_HIGH {
        VolatilityLevel::Medium
    } else {
        VolatilityLevel::High
    }
}

fn describe(z: f64, severity: Severity) -> (String, String) {
    let sigma = z.abs();
    let (dir_ko, dir_en) = if z > 0.0 {
        ("높음", "above")
    } else if z < 0.0 {
        ("낮음", "below")
    } else {
        return (
            "평균과 동일".to_string(),
            "at the historical average".to_string(),
        );
    };

    let ko = match severity {
        Severity::Normal => format!("평균 대비 {:.2}σ {} (정상 범위)", sigma, dir_ko),
        Severity::Warning => format!("평균 대비 {:.2}σ {} (주의)", sigma, dir_ko),
        Severity::Critical => format!("평균 대비 {:.2}σ {} (이상)", sigma, dir_ko),
    };
    let en = match severity {
        Severity::Normal => format!("{:.2}σ {} average (within normal range)", sigma, dir_en),
        Severity::Warning => format!("{:.2}σ {} average (unusual)", sigma, dir_en),
        Severity::Critical => format!("{:.2}σ {} average (anomalous)", sigma, dir_en),
    };
    (ko, en)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<f64> {
        (10..=21).map(f64::from).collect()
    }

    #[test]
    fn test_value_near_mean_is_normal() {
        let outcome = classify(15.0, &sample(), &AnomalyConfig::default());
        assert!(outcome.z_score().abs() < 1.0);
        assert_eq!(outcome.severity(), Severity::Normal);
    }

    #[test]
    fn test_extreme_value_is_critical() {
        let outcome = classify(100.0, &sample(), &AnomalyConfig::default());
        assert!(outcome.z_score() > 3.0);
        assert_eq!(outcome.severity(), Severity::Critical);
        assert_eq!(outcome.percentile(), 100.0);
    }

    #[test]
    fn test_sample_std_dev_uses_n_minus_one() {
        let outcome = classify(15.5, &sample(), &AnomalyConfig::default());
        let result = outcome.as_classified().unwrap();
        // 12개 연속 정수의 표본분산 = 13
        assert!((result.std_dev - 13f64.sqrt()).abs() < 1e-9);
        assert!((result.mean - 15.5).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_history_is_neutral() {
        let outcome = classify(1_000.0, &[1.0, 2.0, 3.0], &AnomalyConfig::default());
        assert_eq!(
            outcome,
            AnomalyOutcome::InsufficientData {
                available: 3,
                required: 12
            }
        );
        assert_eq!(outcome.z_score(), 0.0);
        assert_eq!(outcome.percentile(), 50.0);
        assert!(!outcome.is_anomalous());
    }

    #[test]
    fn test_constant_series_has_zero_z() {
        let flat = vec![4.25; 20];
        let outcome = classify(9.0, &flat, &AnomalyConfig::default());
        assert_eq!(outcome.z_score(), 0.0);
        assert_eq!(outcome.severity(), Severity::Normal);
        let result = outcome.as_classified().unwrap();
        assert_eq!(result.volatility, VolatilityLevel::Low);
        assert_eq!(result.trend, Trend::Stable);
    }

    #[test]
    fn test_constant_series_with_inexact_values_has_zero_z() {
        // 0.1, 5.33 등은 이진 표현이 정확하지 않아 합산 시 반올림 오차가 생김
        for level in [0.1, 5.33, -60.76, 1e-7] {
            let flat = vec![level; 12];
            let outcome = classify(0.6, &flat, &AnomalyConfig::default());
            assert_eq!(outcome.z_score(), 0.0, "level {}", level);
            assert_eq!(outcome.severity(), Severity::Normal);
            let result = outcome.as_classified().unwrap();
            assert_eq!(result.std_dev, 0.0);
            assert_eq!(result.mean, level);
        }
    }

    #[test]
    fn test_rolling_window_ignores_old_regime() {
        // 오래된 100 근처 값 30개 + 최근 5 근처 값 24개
        let mut history: Vec<f64> = (0..30).map(|i| 100.0 + (i % 3) as f64).collect();
        history.extend((0..24).map(|i| 5.0 + (i % 4) as f64 * 0.1));

        let config = AnomalyConfig::default();
        let result = classify(5.1, &history, &config);
        let classified = result.as_classified().unwrap();
        assert_eq!(classified.window_used, 24);
        assert!(classified.mean < 6.0);
        assert_eq!(classified.severity, Severity::Normal);
    }

    #[test]
    fn test_severity_boundaries_are_inclusive() {
        assert_eq!(Severity::from_z(2.0, 2.0, 3.0), Severity::Normal);
        assert_eq!(Severity::from_z(-2.5, 2.0, 3.0), Severity::Warning);
        assert_eq!(Severity::from_z(3.0, 2.0, 3.0), Severity::Warning);
        assert_eq!(Severity::from_z(3.01, 2.0, 3.0), Severity::Critical);
    }

    #[test]
    fn test_trend_and_volatility() {
        let rising: Vec<f64> = (0..24).map(|i| 100.0 + i as f64).collect();
        let outcome = classify(124.0, &rising, &AnomalyConfig::default());
        let result = outcome.as_classified().unwrap();
        assert_eq!(result.trend, Trend::Up);
        // cv = 7.07 / 111.5 ≈ 0.063
        assert_eq!(result.volatility, VolatilityLevel::High);

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        let outcome = classify(100.0, &falling, &AnomalyConfig::default());
        assert_eq!(outcome.as_classified().unwrap().trend, Trend::Down);
    }

    #[test]
    fn test_description_is_bilingual() {
        let outcome = classify(100.0, &sample(), &AnomalyConfig::default());
        let result = outcome.as_classified().unwrap();
        assert!(result.description_ko.contains("높음"));
        assert!(result.description_en.contains("above"));
    }

    #[test]
    fn test_classify_latest_splits_current() {
        let mut values = sample();
        values.push(100.0);
        let outcome = classify_latest(&values, &AnomalyConfig::default()).unwrap();
        assert_eq!(outcome.severity(), Severity::Critical);
        assert!(classify_latest(&[], &AnomalyConfig::default()).is_none());
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(classify(15.0, &sample(), &AnomalyConfig::default()))
            .unwrap();
        assert_eq!(json["status"], "classified");
        assert_eq!(json["severity"], "normal");

        let json = serde_json::to_value(classify(1.0, &[], &AnomalyConfig::default())).unwrap();
        assert_eq!(json["status"], "insufficient_data");
    }
}
