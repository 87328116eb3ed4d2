//! FRED (Federal Reserve Economic Data) API 클라이언트.
//!
//! `GET {base}/series/observations` 엔드포인트로 관측값을 조회합니다.
//!
//! # 응답 형식
//!
//! ```json
//! {"observations": [{"date": "2024-01-02", "value": "5.31"},
//!                   {"date": "2024-01-15", "value": "."}]}
//! ```
//!
//! 값 문자열은 `ObservationValue::parse`로 해석하므로 센티널이 숫자로
//! 흘러 들어가지 않습니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! let client = FredClient::from_config(&config.provider)?;
//! let obs = client.fetch_observations("DGS10", start, end).await?;
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use monitor_core::{ObservationValue, ProviderConfig, ProviderObservation};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::ObservationProvider;
use crate::error::{DataError, Result};

/// FRED API 클라이언트.
#[derive(Clone)]
pub struct FredClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl std::fmt::Debug for FredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FredClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_message: String,
}

impl FredClient {
    /// 새로운 FRED 클라이언트 생성.
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// 제공자 설정에서 클라이언트 생성.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if config.api_key.expose_secret().is_empty() {
            warn!("FRED API 키가 설정되지 않았습니다 (PROVIDER_API_KEY)");
        }
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.timeout(),
        )
    }

    /// 기본 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn parse_observations(raw: Vec<RawObservation>) -> Result<Vec<ProviderObservation>> {
        let mut parsed = raw
            .into_iter()
            .map(|obs| {
                let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
                    DataError::ParseError(format!("잘못된 관측일 '{}': {}", obs.date, e))
                })?;
                Ok(ProviderObservation::new(date, ObservationValue::parse(&obs.value)))
            })
            .collect::<Result<Vec<_>>>()?;

        parsed.sort_by_key(|obs| obs.date);
        Ok(parsed)
    }
}

#[async_trait]
impl ObservationProvider for FredClient {
    fn name(&self) -> &str {
        "fred"
    }

    async fn fetch_observations(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderObservation>> {
        let url = format!("{}/series/observations", self.base_url);
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();

        debug!(
            series_id = series_id,
            start = %start_str,
            end = %end_str,
            "FRED 관측값 요청"
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("series_id", series_id),
                ("api_key", self.api_key.expose_secret()),
                ("file_type", "json"),
                ("observation_start", start_str.as_str()),
                ("observation_end", end_str.as_str()),
            ])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited(format!("{} [{}]", series_id, status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error_message)
                .unwrap_or(body);
            return Err(DataError::FetchError(format!(
                "FRED API 오류 [{}]: {} - {}",
                series_id, status, message
            )));
        }

        let data: ObservationsResponse = response.json().await?;
        let observations = Self::parse_observations(data.observations)?;

        debug!(
            series_id = series_id,
            count = observations.len(),
            "FRED 관측값 수신"
        );
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_observations_sorts_and_maps_sentinels() {
        let raw = vec![
            RawObservation {
                date: "2024-01-03".into(),
                value: "4.01".into(),
            },
            RawObservation {
                date: "2024-01-02".into(),
                value: ".".into(),
            },
        ];
        let parsed = FredClient::parse_observations(raw).unwrap();
        assert_eq!(parsed[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(parsed[0].value, ObservationValue::Missing);
        assert_eq!(parsed[1].value, ObservationValue::Value(4.01));
    }

    #[test]
    fn test_parse_rejects_bad_date() {
        let raw = vec![RawObservation {
            date: "01/02/2024".into(),
            value: "1".into(),
        }];
        assert!(matches!(
            FredClient::parse_observations(raw),
            Err(DataError::ParseError(_))
        ));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = FredClient::new(
            "https://example.test/fred/",
            SecretString::from("super-secret"),
            Duration::from_secs(5),
        )
        .unwrap();
        let printed = format!("{:?}", client);
        assert!(!printed.contains("super-secret"));
        assert_eq!(client.base_url(), "https://example.test/fred");
    }
}
