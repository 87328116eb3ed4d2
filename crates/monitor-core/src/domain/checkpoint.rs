//! 체크포인트 도메인 모델.
//!
//! 체크포인트는 중단된 실행을 재개하기 위한 영속 진행 표시입니다.
//! 삭제되지 않고 새 체크포인트로 대체될 뿐이므로, 소스별로 append-only
//! 복구 로그를 이룹니다.
//!
//! 위치(position)는 날짜의 서수(`num_days_from_ce`)로 표현합니다.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::MonitorError;

/// 프로세스 전역 체크포인트 순번 (같은 마이크로초 내 충돌 방지)
static CHECKPOINT_SEQ: AtomicU64 = AtomicU64::new(0);

/// 체크포인트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    /// 시계열 수집 진행 위치
    Data,
    /// 실패 스냅샷
    Error,
    /// 배치 단위 항목별 결과
    Batch,
}

impl CheckpointKind {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Error => "error",
            Self::Batch => "batch",
        }
    }
}

impl FromStr for CheckpointKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(Self::Data),
            "error" => Ok(Self::Error),
            "batch" => Ok(Self::Batch),
            other => Err(MonitorError::InvalidInput(format!(
                "알 수 없는 체크포인트 종류: {}",
                other
            ))),
        }
    }
}

/// 체크포인트 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    /// 진행 중
    Active,
    /// 완료됨
    Completed,
    /// 실패
    Error,
    /// 중단됨 (재개 가능)
    Paused,
}

impl CheckpointStatus {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Paused => "paused",
        }
    }
}

impl FromStr for CheckpointStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "paused" => Ok(Self::Paused),
            other => Err(MonitorError::InvalidInput(format!(
                "알 수 없는 체크포인트 상태: {}",
                other
            ))),
        }
    }
}

/// 배치 항목 처리 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    /// 성공
    Success,
    /// 실패
    Failed,
    /// 건너뜀
    Skipped,
}

/// 배치 체크포인트의 항목별 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct BatchItem {
    /// 항목 ID (시계열 ID)
    pub item_id: String,
    /// 처리 결과
    pub outcome: ItemOutcome,
    /// 기록 시각
    pub recorded_at: DateTime<Utc>,
    /// 실패 사유
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    /// 현재 시각으로 항목 결과 생성
    pub fn new(item_id: impl Into<String>, outcome: ItemOutcome, error: Option<String>) -> Self {
        Self {
            item_id: item_id.into(),
            outcome,
            recorded_at: Utc::now(),
            error,
        }
    }
}

/// 체크포인트 종류별 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckpointPayload {
    /// 시계열 수집 윈도우
    Data {
        window_start: Option<NaiveDate>,
        window_end: Option<NaiveDate>,
        last_date: Option<NaiveDate>,
    },
    /// 배치 항목별 결과
    Batch {
        batch_id: String,
        items: Vec<BatchItem>,
    },
    /// 실패 상세
    Error {
        message: String,
        context: BTreeMap<String, String>,
        anchor_id: Option<String>,
    },
}

impl CheckpointPayload {
    /// 페이로드에 대응하는 체크포인트 종류
    pub fn kind(&self) -> CheckpointKind {
        match self {
            Self::Data { .. } => CheckpointKind::Data,
            Self::Batch { .. } => CheckpointKind::Batch,
            Self::Error { .. } => CheckpointKind::Error,
        }
    }
}

/// 재개 가능한 진행 표시.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Checkpoint {
    /// 체크포인트 ID ("{종류}:{소스}:{마이크로초}-{순번}")
    pub id: String,
    /// 종류
    pub kind: CheckpointKind,
    /// 소유 Run ID (약한 참조)
    pub run_id: Option<Uuid>,
    /// 소스 (시계열 ID 또는 "group:{주기}")
    pub source: String,
    /// 상태
    pub status: CheckpointStatus,
    /// 시작 위치
    pub start_position: i64,
    /// 현재 위치
    pub current_position: i64,
    /// 기대 레코드 수
    pub total_expected: Option<i64>,
    /// 처리된 레코드 수
    pub records_processed: i64,
    /// 누적 에러 횟수
    pub error_count: i32,
    /// 마지막 에러 메시지
    pub last_error: Option<String>,
    /// 종류별 페이로드
    pub payload: CheckpointPayload,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// 새 체크포인트 생성 (status = active)
    pub fn new(
        run_id: Option<Uuid>,
        source: impl Into<String>,
        start_position: i64,
        current_position: i64,
        total_expected: Option<i64>,
        payload: CheckpointPayload,
    ) -> Self {
        let source = source.into();
        let kind = payload.kind();
        let now = Utc::now();
        Self {
            id: Self::generate_id(kind, &source, now),
            kind,
            run_id,
            source,
            status: CheckpointStatus::Active,
            start_position,
            current_position,
            total_expected,
            records_processed: 0,
            error_count: 0,
            last_error: None,
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    /// (종류, 소스, 시각)에서 체크포인트 ID 생성
    pub fn generate_id(kind: CheckpointKind, source: &str, at: DateTime<Utc>) -> String {
        let seq = CHECKPOINT_SEQ.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}:{}:{}-{}",
            kind.as_str(),
            source,
            at.timestamp_micros(),
            seq
        )
    }

    /// 위치가 내부적으로 일관되지 않은지 (현재 < 시작)
    pub fn has_position_regression(&self) -> bool {
        self.current_position < self.start_position
    }

    /// 배치 페이로드에서 성공한 항목 ID
    pub fn succeeded_items(&self) -> Vec<String> {
        match &self.payload {
            CheckpointPayload::Batch { items, .. } => items
                .iter()
                .filter(|item| item.outcome == ItemOutcome::Success)
                .map(|item| item.item_id.clone())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// 날짜를 체크포인트 위치로 변환
pub fn position_from_date(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

/// 체크포인트 위치를 날짜로 변환
pub fn date_from_position(position: i64) -> Option<NaiveDate> {
    i32::try_from(position)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_payload() -> CheckpointPayload {
        CheckpointPayload::Data {
            window_start: None,
            window_end: None,
            last_date: None,
        }
    }

    #[test]
    fn test_ids_are_unique_for_same_source() {
        let a = Checkpoint::new(None, "UNRATE", 0, 0, None, data_payload());
        let b = Checkpoint::new(None, "UNRATE", 0, 0, None, data_payload());
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("data:UNRATE:"));
    }

    #[test]
    fn test_position_round_trip_for_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(date_from_position(position_from_date(date)), Some(date));
        assert!(date_from_position(i64::MAX).is_none());
    }

    #[test]
    fn test_succeeded_items_only_from_batch() {
        let payload = CheckpointPayload::Batch {
            batch_id: "b1".to_string(),
            items: vec![
                BatchItem::new("A", ItemOutcome::Success, None),
                BatchItem::new("B", ItemOutcome::Failed, Some("timeout".to_string())),
                BatchItem::new("C", ItemOutcome::Skipped, None),
            ],
        };
        let checkpoint = Checkpoint::new(None, "group:daily", 0, 3, Some(3), payload);
        assert_eq!(checkpoint.kind, CheckpointKind::Batch);
        assert_eq!(checkpoint.succeeded_items(), vec!["A".to_string()]);

        let data = Checkpoint::new(None, "A", 0, 0, None, data_payload());
        assert!(data.succeeded_items().is_empty());
    }

    #[test]
    fn test_payload_is_tagged() {
        let json = serde_json::to_value(data_payload()).unwrap();
        assert_eq!(json["type"], "data");

        let error = CheckpointPayload::Error {
            message: "boom".to_string(),
            context: BTreeMap::new(),
            anchor_id: None,
        };
        assert_eq!(serde_json::to_value(&error).unwrap()["type"], "error");
        assert_eq!(error.kind(), CheckpointKind::Error);
    }
}
