//! 관측값 타입.
//!
//! 외부 제공자는 값이 없는 날짜를 문자열 센티널(".")로 표시합니다.
//! 이를 문자열로 흘려보내지 않고 `ObservationValue`로 명시적으로 구분합니다.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 제공자 관측값.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ObservationValue {
    /// 숫자 값
    Value(f64),
    /// 제공자가 "값 없음"으로 표시한 날짜 ("." 센티널)
    Missing,
    /// 비어 있거나 해석할 수 없는 값
    Unavailable,
}

impl ObservationValue {
    /// 제공자 원시 문자열 해석.
    ///
    /// - `"."` → `Missing`
    /// - 빈 문자열, `NaN`, 무한대, 숫자가 아닌 값 → `Unavailable`
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == "." {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Value(v),
            _ => Self::Unavailable,
        }
    }

    /// 숫자 값 (센티널이면 None)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// 저장 가능한 숫자 값인지 여부
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// 제공자 응답의 개별 관측 (날짜 + 값/센티널).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProviderObservation {
    /// 관측일
    pub date: NaiveDate,
    /// 관측값
    pub value: ObservationValue,
}

impl ProviderObservation {
    /// 새 제공자 관측 생성
    pub fn new(date: NaiveDate, value: ObservationValue) -> Self {
        Self { date, value }
    }
}

/// 저장된 관측값.
///
/// (series_id, date)로 유일하며, 같은 키의 이후 쓰기는 덮어씁니다.
/// `vintage_date`는 감사용 수집일이며 유일성 키에 포함되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// 시계열 ID
    pub series_id: String,
    /// 관측일
    pub date: NaiveDate,
    /// 값
    pub value: f64,
    /// 수집일
    pub vintage_date: NaiveDate,
}

impl Observation {
    /// 새 관측값 생성
    pub fn new(
        series_id: impl Into<String>,
        date: NaiveDate,
        value: f64,
        vintage_date: NaiveDate,
    ) -> Self {
        Self {
            series_id: series_id.into(),
            date,
            value,
            vintage_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sentinels() {
        assert_eq!(ObservationValue::parse("."), ObservationValue::Missing);
        assert_eq!(ObservationValue::parse(""), ObservationValue::Unavailable);
        assert_eq!(ObservationValue::parse("NaN"), ObservationValue::Unavailable);
        assert_eq!(ObservationValue::parse("n/a"), ObservationValue::Unavailable);
        assert_eq!(ObservationValue::parse("inf"), ObservationValue::Unavailable);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(ObservationValue::parse("4.33"), ObservationValue::Value(4.33));
        assert_eq!(ObservationValue::parse(" -0.5 "), ObservationValue::Value(-0.5));
        assert_eq!(ObservationValue::parse("12").as_f64(), Some(12.0));
        assert!(ObservationValue::Missing.as_f64().is_none());
    }
}
