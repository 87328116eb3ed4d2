//! # Monitor Analytics
//!
//! 시계열 값 이상 탐지를 제공합니다. 모든 함수는 I/O가 없는 순수 함수이므로
//! 동시에, 반복해서 호출해도 안전합니다.
//!
//! - **anomaly**: 롤링 윈도우 z-score 분류 (심각도/추세/변동성)
//! - **volatility**: GARCH(1,1) 조건부 변동성 모델 (적합/이상 탐지/예측)

pub mod anomaly;
pub mod volatility;

pub use anomaly::{
    classify, classify_latest, AnomalyConfig, AnomalyOutcome, Severity, Trend, VolatilityLevel,
    ZScoreResult,
};
pub use volatility::{
    detect_garch_anomaly, fit_garch, forecast_volatility, GarchAnomaly, GarchError, GarchFit,
    VolatilityForecast,
};
