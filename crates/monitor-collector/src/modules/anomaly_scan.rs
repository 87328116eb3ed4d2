//! 저장 이력 기반 이상 탐지.
//!
//! 저장소의 최근 `window_size + 1`개 관측값을 읽어 가장 최근 값을 이전 값들과
//! 비교합니다. 수집 경로와 독립적으로 동작합니다.

use chrono::NaiveDate;
use monitor_analytics::{classify_latest, AnomalyConfig, AnomalyOutcome, Severity};
use monitor_core::SeriesCatalog;
use monitor_data::MonitorStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::Result;

/// 시계열 최신 관측값의 이상 판정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesAnomaly {
    pub series_id: String,
    pub date: NaiveDate,
    pub value: f64,
    pub outcome: AnomalyOutcome,
}

/// 시계열 1개 검사. 저장된 관측값이 없으면 `None`.
pub async fn scan_series(
    store: &dyn MonitorStore,
    series_id: &str,
    config: &AnomalyConfig,
) -> Result<Option<SeriesAnomaly>> {
    let observations = store
        .recent_observations(series_id, config.window_size + 1)
        .await?;
    let Some(latest) = observations.last() else {
        return Ok(None);
    };

    let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
    let Some(outcome) = classify_latest(&values, config) else {
        return Ok(None);
    };

    Ok(Some(SeriesAnomaly {
        series_id: series_id.to_string(),
        date: latest.date,
        value: latest.value,
        outcome,
    }))
}

/// 카탈로그 전체 검사.
///
/// 개별 시계열 조회 실패는 경고만 남기고 나머지를 계속 검사합니다.
pub async fn scan_all(
    store: &dyn MonitorStore,
    catalog: &SeriesCatalog,
    config: &AnomalyConfig,
) -> Vec<SeriesAnomaly> {
    let mut found = Vec::with_capacity(catalog.len());

    for series in catalog.all() {
        match scan_series(store, &series.id, config).await {
            Ok(Some(anomaly)) => {
                match anomaly.outcome.severity() {
                    Severity::Critical => warn!(
                        series_id = %anomaly.series_id,
                        date = %anomaly.date,
                        value = anomaly.value,
                        z_score = anomaly.outcome.z_score(),
                        "심각한 이상값 감지"
                    ),
                    Severity::Warning => warn!(
                        series_id = %anomaly.series_id,
                        date = %anomaly.date,
                        value = anomaly.value,
                        z_score = anomaly.outcome.z_score(),
                        "이상값 경고"
                    ),
                    Severity::Normal => {}
                }
                found.push(anomaly);
            }
            Ok(None) => {}
            Err(e) => warn!(series_id = %series.id, error = %e, "이상 탐지 조회 실패"),
        }
    }

    let anomalous = found.iter().filter(|a| a.outcome.is_anomalous()).count();
    info!(scanned = found.len(), anomalous = anomalous, "이상 탐지 완료");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::{Cadence, Observation, Series};
    use monitor_data::{MemoryStore, ObservationStore};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day as i64)
    }

    async fn seed(store: &MemoryStore, id: &str, values: &[f64]) {
        let records: Vec<Observation> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation::new(id, date(i as u32), *v, date(60)))
            .collect();
        store.upsert_observations(&records).await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_flags_spike_against_stored_history() {
        let store = MemoryStore::new();
        let mut values: Vec<f64> = (0..24).map(|i| 100.0 + (i % 2) as f64).collect();
        values.push(120.0);
        seed(&store, "VIXCLS", &values).await;

        let result = scan_series(&store, "VIXCLS", &AnomalyConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.value, 120.0);
        assert_eq!(result.date, date(24));
        assert_eq!(result.outcome.severity(), Severity::Critical);
    }

    #[tokio::test]
    async fn test_short_history_is_neutral() {
        let store = MemoryStore::new();
        seed(&store, "GDP", &[1.0, 2.0, 50.0]).await;

        let result = scan_series(&store, "GDP", &AnomalyConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result.outcome,
            AnomalyOutcome::InsufficientData { .. }
        ));
        assert!(!result.outcome.is_anomalous());
    }

    #[tokio::test]
    async fn test_scan_all_skips_empty_series() {
        let store = MemoryStore::new();
        seed(&store, "DFF", &[5.33; 20]).await;
        let catalog = SeriesCatalog::new(vec![
            Series::new("DFF", "Fed Funds", Cadence::Daily),
            Series::new("UNRATE", "Unemployment", Cadence::Monthly),
        ]);

        let found = scan_all(&store, &catalog, &AnomalyConfig::default()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].series_id, "DFF");
        assert_eq!(found[0].outcome.z_score(), 0.0);
    }
}
