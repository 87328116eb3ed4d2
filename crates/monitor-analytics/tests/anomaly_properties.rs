//! z-score 분류기 속성 기반 테스트.
//!
//! 임의 이력 샘플에 대해 분류기의 불변 조건이 유지되는지 proptest로 검증합니다.

use monitor_analytics::{classify, AnomalyConfig, AnomalyOutcome, Severity};
use proptest::prelude::*;

/// 경제 지표 범위의 유한한 값
fn arb_value() -> impl Strategy<Value = f64> {
    -1_000.0f64..1_000.0
}

/// 최소 데이터 수 이상인 이력
fn arb_history() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_value(), 12..60)
}

proptest! {
    #[test]
    fn insufficient_history_is_always_neutral(
        history in prop::collection::vec(arb_value(), 0..12),
        current in any::<f64>().prop_filter("finite", |v| v.is_finite()),
    ) {
        let outcome = classify(current, &history, &AnomalyConfig::default());
        let is_insufficient = matches!(outcome, AnomalyOutcome::InsufficientData { .. });
        prop_assert!(is_insufficient);
        prop_assert_eq!(outcome.z_score(), 0.0);
        prop_assert_eq!(outcome.severity(), Severity::Normal);
        prop_assert_eq!(outcome.percentile(), 50.0);
    }

    #[test]
    fn constant_history_has_zero_z(
        level in arb_value(),
        len in 12usize..48,
        current in arb_value(),
    ) {
        let history = vec![level; len];
        let outcome = classify(current, &history, &AnomalyConfig::default());
        prop_assert_eq!(outcome.z_score(), 0.0);
        prop_assert_eq!(outcome.severity(), Severity::Normal);
    }

    #[test]
    fn percentile_is_monotonic_in_current(
        history in arb_history(),
        a in arb_value(),
        b in arb_value(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let config = AnomalyConfig::default();
        let p_low = classify(low, &history, &config).percentile();
        let p_high = classify(high, &history, &config).percentile();
        prop_assert!(p_low <= p_high);
        prop_assert!((0.0..=100.0).contains(&p_high));
    }

    #[test]
    fn severity_grows_with_distance_from_mean(
        history in arb_history(),
        offset in 0.0f64..500.0,
    ) {
        let config = AnomalyConfig::default();
        let outcome = classify(0.0, &history, &config);
        let Some(base) = outcome.as_classified() else {
            return Err(TestCaseError::fail("classified expected"));
        };
        let near = classify(base.mean + offset, &history, &config).severity();
        let far = classify(base.mean + offset * 2.0, &history, &config).severity();
        prop_assert!(near <= far);
    }

    #[test]
    fn window_uses_at_most_window_size_values(history in arb_history()) {
        let config = AnomalyConfig::default();
        let outcome = classify(1.0, &history, &config);
        let result = outcome.as_classified().unwrap();
        prop_assert_eq!(result.window_used, history.len().min(config.window_size));
        prop_assert!(result.std_dev >= 0.0);
    }
}

#[test]
fn documented_examples() {
    let history: Vec<f64> = (10..=21).map(f64::from).collect();
    let config = AnomalyConfig::default();

    let near = classify(15.0, &history, &config);
    assert!(near.z_score().abs() < 1.0);
    assert_eq!(near.severity(), Severity::Normal);

    let far = classify(100.0, &history, &config);
    assert!(far.z_score().abs() > 3.0);
    assert_eq!(far.severity(), Severity::Critical);
}

#[test]
fn custom_thresholds_are_respected() {
    let history: Vec<f64> = (10..=21).map(f64::from).collect();
    let strict = AnomalyConfig {
        warning_threshold: 0.5,
        critical_threshold: 1.0,
        ..AnomalyConfig::default()
    };
    // z = (18 − 15.5) / √13 ≈ 0.69
    assert_eq!(classify(18.0, &history, &strict).severity(), Severity::Warning);
    assert_eq!(
        classify(18.0, &history, &AnomalyConfig::default()).severity(),
        Severity::Normal
    );
}
