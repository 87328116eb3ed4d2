//! 시계열 데이터 Provider 모듈.
//!
//! 외부 시계열 제공자에서 관측값을 가져오는 trait과 구현을 정의합니다.
//!
//! ## FRED
//! - `FredClient`: St. Louis Fed FRED API 클라이언트 (API 키 필요)
//! - `"."` 센티널은 `ObservationValue::Missing`으로 변환

pub mod fred;

use async_trait::async_trait;
use chrono::NaiveDate;
use monitor_core::ProviderObservation;

use crate::error::Result;

pub use fred::FredClient;

/// 외부 시계열 제공자.
///
/// 구현체는 요청 구간의 관측값을 날짜 오름차순으로 반환해야 합니다.
/// 재시도는 호출자(Fetch Orchestrator)의 책임입니다.
#[async_trait]
pub trait ObservationProvider: Send + Sync {
    /// 제공자 이름 (로그용)
    fn name(&self) -> &str;

    /// `[start, end]` 구간의 관측값 조회
    async fn fetch_observations(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderObservation>>;
}
