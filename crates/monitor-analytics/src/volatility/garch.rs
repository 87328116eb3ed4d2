//! GARCH(1,1) 변동성 모델.
//!
//! 금리처럼 변동성이 군집하는 일별 시계열에서 고정 표준편차 대신 시변
//! 조건부 변동성으로 이상 여부를 판단합니다.
//!
//! - 수익률: `r_t = 100 · ln(v_t / v_{t−1})`
//! - 분산식: `σ²_t = ω + α·e²_{t−1} + β·σ²_{t−1}`, `e_t = r_t − μ`
//! - 추정: 정규 준최대우도 + 분산 타게팅 (`ω = s²(1 − α − β)`),
//!   α ∈ [0.01, 0.30], β ∈ [0.50, 0.98] 격자 탐색

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::anomaly::{Severity, Trend};

/// 적합에 필요한 최소 수익률 개수
pub const MIN_RETURNS: usize = 100;
/// 최대 예측 기간
pub const MAX_HORIZON: usize = 30;
/// 연율화 거래일 수
const TRADING_DAYS: f64 = 252.0;
/// 95% 신뢰구간 z 값
const Z_95: f64 = 1.96;
/// 정상성 조건 상한 (α + β)
const MAX_PERSISTENCE: f64 = 0.999;

/// GARCH 관련 오류.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GarchError {
    /// 데이터 부족
    #[error("데이터 부족: 수익률 {required}개 필요, 현재 {available}개")]
    InsufficientData { required: usize, available: usize },

    /// 로그 수익률을 계산할 수 없는 값
    #[error("양수가 아닌 값 (index {index}): {value}")]
    NonPositiveValue { index: usize, value: f64 },

    /// 수익률 분산이 0
    #[error("수익률 분산이 0이라 모델을 적합할 수 없음")]
    ZeroVariance,

    /// 신뢰수준 범위 오류
    #[error("신뢰수준은 0.90~0.99 범위여야 함: {0}")]
    InvalidConfidence(f64),

    /// 예측 기간 범위 오류
    #[error("예측 기간은 1~{MAX_HORIZON} 범위여야 함: {0}")]
    InvalidHorizon(usize),
}

/// 조건부 변동성 경로의 구간 통계.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityRegimes {
    /// 평균 − 1 표준편차
    pub low: f64,
    /// 평균 + 1 표준편차
    pub high: f64,
    /// 마지막 조건부 변동성
    pub current: f64,
    /// 평균 조건부 변동성
    pub mean: f64,
}

/// 현재 변동성 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeState {
    Elevated,
    Normal,
    Subdued,
}

impl VolatilityRegimes {
    /// 현재 변동성이 어느 구간에 있는지
    pub fn state(&self) -> RegimeState {
        if self.current > self.high {
            RegimeState::Elevated
        } else if self.current < self.low {
            RegimeState::Subdued
        } else {
            RegimeState::Normal
        }
    }
}

/// GARCH(1,1) 적합 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarchFit {
    /// 평균 수익률
    pub mu: f64,
    /// 상수항
    pub omega: f64,
    /// 충격 반응 계수
    pub alpha: f64,
    /// 변동성 지속 계수
    pub beta: f64,
    /// α + β
    pub persistence: f64,
    /// 충격 반감기 (지속성이 1 이상이면 None)
    pub half_life: Option<f64>,
    /// 로그 우도
    pub log_likelihood: f64,
    /// AIC
    pub aic: f64,
    /// BIC
    pub bic: f64,
    /// 수익률 개수
    pub observations: usize,
    /// 조건부 변동성 경로 (%)
    pub conditional_volatility: Vec<f64>,
    /// 변동성 구간
    pub regimes: VolatilityRegimes,
    /// 마지막 잔차 (예측 시작점)
    pub last_residual: f64,
}

impl GarchFit {
    /// 다음 기간 조건부 분산
    pub fn next_variance(&self) -> f64 {
        let last_vol = self.regimes.current;
        self.omega + self.alpha * self.last_residual.powi(2) + self.beta * last_vol.powi(2)
    }

    /// 다음 기간 조건부 변동성 (%)
    pub fn next_volatility(&self) -> f64 {
        self.next_variance().sqrt()
    }
}

/// GARCH 기반 이상 탐지 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarchAnomaly {
    /// |z| > 2 여부
    pub is_anomaly: bool,
    /// 심각도
    pub severity: Severity,
    /// 현재 수익률 / 조건부 변동성
    pub z_score: f64,
    /// 현재 수익률 (%)
    pub current_return: f64,
    /// 사용한 조건부 변동성 (%)
    pub conditional_volatility: f64,
    /// t(4) 분포 기반 VaR (%)
    pub value_at_risk: f64,
    /// 신뢰수준
    pub confidence_level: f64,
    /// 현재 값
    pub current_value: f64,
    /// 설명
    pub explanation: String,
}

/// 변동성 예측 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityForecast {
    /// 예측 기간
    pub horizon: usize,
    /// 분산 예측
    pub variance: Vec<f64>,
    /// 변동성 예측 (%)
    pub volatility: Vec<f64>,
    /// 연율화 변동성 (%)
    pub annualized: Vec<f64>,
    /// 95% 하한
    pub lower: Vec<f64>,
    /// 95% 상한
    pub upper: Vec<f64>,
    /// 예측 구간 추세
    pub trend: Trend,
}

/// 값 시계열에서 퍼센트 로그 수익률을 계산합니다.
pub fn log_returns(values: &[f64]) -> Result<Vec<f64>, GarchError> {
    if let Some((index, value)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && **v > 0.0))
    {
        return Err(GarchError::NonPositiveValue {
            index,
            value: *value,
        });
    }
    Ok(values
        .windows(2)
        .map(|w| 100.0 * (w[1] / w[0]).ln())
        .collect())
}

/// 값 시계열에 GARCH(1,1)을 적합합니다.
pub fn fit_garch(values: &[f64]) -> Result<GarchFit, GarchError> {
    let returns = log_returns(values)?;
    if returns.len() < MIN_RETURNS {
        return Err(GarchError::InsufficientData {
            required: MIN_RETURNS,
            available: returns.len(),
        });
    }

    let n = returns.len();
    let mu = returns.iter().sum::<f64>() / n as f64;
    let residuals: Vec<f64> = returns.iter().map(|r| r - mu).collect();
    let sample_var = residuals.iter().map(|e| e * e).sum::<f64>() / n as f64;
    if sample_var <= f64::EPSILON {
        return Err(GarchError::ZeroVariance);
    }

    // (α, β, ω, LL)
    let mut best: Option<(f64, f64, f64, f64)> = None;
    for a in 1..=30 {
        let alpha = a as f64 / 100.0;
        for b in 50..=98 {
            let beta = b as f64 / 100.0;
            if alpha + beta >= MAX_PERSISTENCE {
                continue;
            }
            let omega = sample_var * (1.0 - alpha - beta);
            let ll = log_likelihood(&residuals, omega, alpha, beta, sample_var);
            if ll.is_finite() && best.map_or(true, |(_, _, _, best_ll)| ll > best_ll) {
                best = Some((alpha, beta, omega, ll));
            }
        }
    }
    let (alpha, beta, omega, ll) = best.ok_or(GarchError::ZeroVariance)?;

    let variances = variance_path(&residuals, omega, alpha, beta, sample_var);
    let conditional_volatility: Vec<f64> = variances.iter().map(|v| v.sqrt()).collect();

    let persistence = alpha + beta;
    let half_life = if persistence < 1.0 {
        Some(0.5f64.ln() / persistence.ln())
    } else {
        None
    };

    // k = μ, ω, α, β
    let k = 4.0;
    let aic = 2.0 * k - 2.0 * ll;
    let bic = k * (n as f64).ln() - 2.0 * ll;

    let vol_mean = conditional_volatility.iter().sum::<f64>() / n as f64;
    let vol_std = (conditional_volatility
        .iter()
        .map(|v| (v - vol_mean).powi(2))
        .sum::<f64>()
        / n as f64)
        .sqrt();
    let regimes = VolatilityRegimes {
        low: vol_mean - vol_std,
        high: vol_mean + vol_std,
        current: conditional_volatility[n - 1],
        mean: vol_mean,
    };

    debug!(
        observations = n,
        alpha,
        beta,
        persistence,
        log_likelihood = ll,
        "GARCH(1,1) 적합 완료"
    );

    Ok(GarchFit {
        mu,
        omega,
        alpha,
        beta,
        persistence,
        half_life,
        log_likelihood: ll,
        aic,
        bic,
        observations: n,
        conditional_volatility,
        regimes,
        last_residual: residuals[n - 1],
    })
}

/// 이력으로 적합한 GARCH의 다음 기간 변동성으로 현재 값을 평가합니다.
///
/// 현재 수익률은 이력의 마지막 값 대비 로그 수익률입니다.
pub fn detect_garch_anomaly(
    current: f64,
    historical: &[f64],
    confidence_level: f64,
) -> Result<GarchAnomaly, GarchError> {
    if !(0.90..=0.99).contains(&confidence_level) {
        return Err(GarchError::InvalidConfidence(confidence_level));
    }
    if !(current.is_finite() && current > 0.0) {
        return Err(GarchError::NonPositiveValue {
            index: historical.len(),
            value: current,
        });
    }

    let fit = fit_garch(historical)?;
    let previous = historical[historical.len() - 1];
    let current_return = 100.0 * (current / previous).ln();

    let sigma = fit.next_volatility();
    let z_score = if sigma > 0.0 {
        current_return / sigma
    } else {
        0.0
    };
    let value_at_risk = (student_t4_quantile(1.0 - confidence_level) * sigma).abs();

    let abs_z = z_score.abs();
    let severity = if abs_z < 2.0 {
        Severity::Normal
    } else if abs_z < 3.0 {
        Severity::Warning
    } else {
        Severity::Critical
    };

    let explanation = match severity {
        Severity::Normal => format!(
            "현재 값 {:.4} 변동 정상 (Z={:.2}), 조건부 변동성 {:.4}% 범위 내",
            current, z_score, sigma
        ),
        Severity::Warning => format!(
            "변동 확대 (Z={:.2}), 조건부 변동성 {:.4}%",
            z_score, sigma
        ),
        Severity::Critical => format!(
            "이상 변동 (Z={:.2}), 조건부 변동성 {:.4}%",
            z_score, sigma
        ),
    };

    Ok(GarchAnomaly {
        is_anomaly: abs_z > 2.0,
        severity,
        z_score,
        current_return,
        conditional_volatility: sigma,
        value_at_risk,
        confidence_level,
        current_value: current,
        explanation,
    })
}

/// 적합 결과로 향후 `horizon` 기간의 변동성을 예측합니다.
pub fn forecast_volatility(fit: &GarchFit, horizon: usize) -> Result<VolatilityForecast, GarchError> {
    if !(1..=MAX_HORIZON).contains(&horizon) {
        return Err(GarchError::InvalidHorizon(horizon));
    }

    let mut variance = Vec::with_capacity(horizon);
    let mut current = fit.next_variance();
    variance.push(current);
    for _ in 1..horizon {
        current = fit.omega + fit.persistence * current;
        variance.push(current);
    }

    let volatility: Vec<f64> = variance.iter().map(|v| v.sqrt()).collect();
    let annualized = volatility.iter().map(|v| v * TRADING_DAYS.sqrt()).collect();
    let root_n = (fit.observations as f64).sqrt();
    let lower = volatility.iter().map(|v| v - Z_95 * v / root_n).collect();
    let upper = volatility.iter().map(|v| v + Z_95 * v / root_n).collect();

    let first = volatility[0];
    let last = volatility[horizon - 1];
    let trend = if last > first {
        Trend::Up
    } else if last < first {
        Trend::Down
    } else {
        Trend::Stable
    };

    Ok(VolatilityForecast {
        horizon,
        variance,
        volatility,
        annualized,
        lower,
        upper,
        trend,
    })
}

/// 자유도 4 Student-t 분포의 분위수 (닫힌 형태).
pub fn student_t4_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    let a = 4.0 * p * (1.0 - p);
    let sqrt_a = a.sqrt();
    let q = (sqrt_a.acos() / 3.0).cos() / sqrt_a;
    (p - 0.5).signum() * 2.0 * (q - 1.0).max(0.0).sqrt()
}

fn variance_path(residuals: &[f64], omega: f64, alpha: f64, beta: f64, initial: f64) -> Vec<f64> {
    let mut path = Vec::with_capacity(residuals.len());
    let mut sigma2 = initial;
    path.push(sigma2);
    for e in &residuals[..residuals.len() - 1] {
        sigma2 = omega + alpha * e * e + beta * sigma2;
        path.push(sigma2);
    }
    path
}

fn log_likelihood(residuals: &[f64], omega: f64, alpha: f64, beta: f64, initial: f64) -> f64 {
    let ln_2pi = (2.0 * std::f64::consts::PI).ln();
    variance_path(residuals, omega, alpha, beta, initial)
        .iter()
        .zip(residuals)
        .map(|(s2, e)| -0.5 * (ln_2pi + s2.ln() + e * e / s2))
        .sum()
}
