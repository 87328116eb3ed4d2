//! FRED 클라이언트 통합 테스트 (mockito HTTP 서버)

use chrono::NaiveDate;
use mockito::Matcher;
use monitor_core::ObservationValue;
use monitor_data::{DataError, FredClient, ObservationProvider};
use secrecy::SecretString;
use std::time::Duration;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn client(base_url: &str) -> FredClient {
    FredClient::new(base_url, SecretString::from("test-key"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetch_parses_values_and_sentinels() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/series/observations")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("series_id".into(), "DGS10".into()),
            Matcher::UrlEncoded("api_key".into(), "test-key".into()),
            Matcher::UrlEncoded("file_type".into(), "json".into()),
            Matcher::UrlEncoded("observation_start".into(), "2024-01-01".into()),
            Matcher::UrlEncoded("observation_end".into(), "2024-01-05".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"observations": [
                {"realtime_start": "2024-01-08", "date": "2024-01-02", "value": "3.95"},
                {"realtime_start": "2024-01-08", "date": "2024-01-01", "value": "."},
                {"realtime_start": "2024-01-08", "date": "2024-01-03", "value": ""}
            ]}"#,
        )
        .create_async()
        .await;

    let observations = client(&server.url())
        .fetch_observations("DGS10", date(2024, 1, 1), date(2024, 1, 5))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(observations.len(), 3);
    assert_eq!(observations[0].date, date(2024, 1, 1));
    assert_eq!(observations[0].value, ObservationValue::Missing);
    assert_eq!(observations[1].value, ObservationValue::Value(3.95));
    assert_eq!(observations[2].value, ObservationValue::Unavailable);
}

#[tokio::test]
async fn test_rate_limit_maps_to_transient_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/series/observations")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body("Too Many Requests")
        .create_async()
        .await;

    let err = client(&server.url())
        .fetch_observations("UNRATE", date(2024, 1, 1), date(2024, 3, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::RateLimited(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_provider_error_message_is_surfaced() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/series/observations")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error_code": 400, "error_message": "Bad Request. The series does not exist."}"#)
        .create_async()
        .await;

    let err = client(&server.url())
        .fetch_observations("NOPE", date(2024, 1, 1), date(2024, 3, 1))
        .await
        .unwrap_err();

    match err {
        DataError::FetchError(message) => {
            assert!(message.contains("NOPE"));
            assert!(message.contains("series does not exist"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_observation_list() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/series/observations")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"count": 0, "observations": []}"#)
        .create_async()
        .await;

    let observations = client(&server.url())
        .fetch_observations("GDP", date(2024, 1, 1), date(2024, 3, 1))
        .await
        .unwrap();
    assert!(observations.is_empty());
}
