//! 체크포인트 및 복구 관리.
//!
//! 진행 상태를 저장소에 남겨 중단된 실행을 정확한 지점부터 재개합니다.
//!
//! # 주요 기능
//!
//! - **데이터 체크포인트**: 시계열 수집 윈도우와 위치
//! - **배치 체크포인트**: 항목별 결과 (재개 시 성공 항목 스킵)
//! - **에러 체크포인트**: 직전 체크포인트 위치에 고정된 실패 상세
//! - **복구 판단**: `skip` / `restart` / `resume`
//!
//! 체크포인트는 추가 전용이며, 복구는 항상 소스의 최신 비에러 체크포인트를
//! 먼저 찾고, 없을 때만 에러 체크포인트의 고정 위치를 사용합니다.
//!
//! # 사용 예
//!
//! ```rust,ignore
//! let info = manager.get_recovery_info("UNRATE", RecoveryOptions::default()).await?;
//! match info.action {
//!     RecoveryAction::Skip => {}
//!     RecoveryAction::Restart => { /* 전체 동기화 */ }
//!     RecoveryAction::Resume => { /* info.resume_position 부터 */ }
//! }
//! ```

use chrono::Utc;
use monitor_core::{
    BatchItem, Checkpoint, CheckpointKind, CheckpointPayload, CheckpointStatus, ItemOutcome,
};
use monitor_data::MonitorStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CollectorError;
use crate::Result;

/// 복구 조치
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryAction {
    /// 마지막 위치부터 재개
    Resume,
    /// 위치를 신뢰할 수 없으므로 처음부터 (전체 동기화)
    Restart,
    /// 이미 완료됨
    Skip,
}

impl RecoveryAction {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::Restart => "restart",
            Self::Skip => "skip",
        }
    }
}

/// 복구 판단 옵션
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryOptions {
    /// 에러 누적 한도 (None이면 관리자 기본값)
    pub max_retries: Option<i32>,
}

/// 복구 판단 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryInfo {
    /// 재개 가능 여부
    pub can_resume: bool,
    /// 소스의 최신 체크포인트
    pub last_checkpoint: Option<Checkpoint>,
    /// 권장 조치
    pub action: RecoveryAction,
    /// 재개 위치 (resume일 때)
    pub resume_position: Option<i64>,
    /// 설명
    pub message: String,
}

/// 재개 옵션
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeOptions {
    /// 에러 카운터 초기화
    pub reset_errors: bool,
    /// 배치에서 이미 성공한 항목 반환
    pub skip_processed: bool,
}

/// 재개 상태
#[derive(Debug, Clone)]
pub struct ResumeState {
    /// 재개 기준 체크포인트 (reset_errors 반영)
    pub checkpoint: Checkpoint,
    /// 재개 위치
    pub resume_position: i64,
    /// 건너뛸 항목 ID (skip_processed일 때)
    pub processed_items: Vec<String>,
}

/// 체크포인트 관리자.
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn MonitorStore>,
    max_retries: i32,
}

impl CheckpointManager {
    /// 새 관리자 생성
    pub fn new(store: Arc<dyn MonitorStore>, max_retries: i32) -> Self {
        Self { store, max_retries }
    }

    /// 데이터 체크포인트 생성. 체크포인트 ID를 반환합니다.
    ///
    /// 소스의 직전 체크포인트가 완료 상태가 아니면 에러 횟수를 이어받아,
    /// 실행을 넘어 연속된 실패가 누적됩니다.
    pub async fn create_data_checkpoint(
        &self,
        run_id: Option<Uuid>,
        source: &str,
        start_position: i64,
        current_position: i64,
        total_expected: Option<i64>,
        payload: CheckpointPayload,
    ) -> Result<String> {
        if payload.kind() != CheckpointKind::Data {
            return Err(CollectorError::Checkpoint(format!(
                "데이터 체크포인트에 {} 페이로드 사용 불가",
                payload.kind().as_str()
            )));
        }
        let mut checkpoint = Checkpoint::new(
            run_id,
            source,
            start_position,
            current_position,
            total_expected,
            payload,
        );

        // 직전이 완료가 아니면 연속 실패 횟수를 이어받음
        let history = self.store.query_checkpoints(None, Some(source)).await?;
        if let Some(previous) = history.last() {
            if previous.status != CheckpointStatus::Completed {
                checkpoint.error_count = previous.error_count;
                checkpoint.last_error = previous.last_error.clone();
            }
        }

        self.store.insert_checkpoint(&checkpoint).await?;
        debug!(
            checkpoint_id = %checkpoint.id,
            source = source,
            error_count = checkpoint.error_count,
            "데이터 체크포인트 생성"
        );
        Ok(checkpoint.id)
    }

    /// 배치 체크포인트 생성.
    ///
    /// 위치는 기록된 항목 수, 처리 수는 성공 항목 수입니다.
    pub async fn create_batch_checkpoint(
        &self,
        run_id: Option<Uuid>,
        source: &str,
        batch_id: &str,
        items: Vec<BatchItem>,
    ) -> Result<String> {
        let total = items.len() as i64;
        let succeeded = items
            .iter()
            .filter(|item| item.outcome == ItemOutcome::Success)
            .count() as i64;

        let mut checkpoint = Checkpoint::new(
            run_id,
            source,
            0,
            total,
            Some(total),
            CheckpointPayload::Batch {
                batch_id: batch_id.to_string(),
                items,
            },
        );
        checkpoint.records_processed = succeeded;
        self.store.insert_checkpoint(&checkpoint).await?;
        debug!(
            checkpoint_id = %checkpoint.id,
            source = source,
            items = total,
            succeeded = succeeded,
            "배치 체크포인트 생성"
        );
        Ok(checkpoint.id)
    }

    /// 에러 체크포인트 생성.
    ///
    /// 소스의 최신 비에러 체크포인트 위치를 복사해 실패를 알려진 재개 지점에
    /// 고정합니다. 에러 횟수는 소스의 최신 체크포인트 에러 횟수 + 1입니다.
    pub async fn create_error_checkpoint(
        &self,
        run_id: Option<Uuid>,
        source: &str,
        error: &str,
        context: BTreeMap<String, String>,
    ) -> Result<String> {
        let history = self.store.query_checkpoints(None, Some(source)).await?;
        let previous_errors = history.last().map(|c| c.error_count).unwrap_or(0);
        let anchor = latest_non_error(&history);

        let (start, current, total) = anchor
            .map(|c| (c.start_position, c.current_position, c.total_expected))
            .unwrap_or((0, 0, None));

        let mut checkpoint = Checkpoint::new(
            run_id,
            source,
            start,
            current,
            total,
            CheckpointPayload::Error {
                message: error.to_string(),
                context,
                anchor_id: anchor.map(|c| c.id.clone()),
            },
        );
        checkpoint.status = CheckpointStatus::Error;
        checkpoint.error_count = previous_errors + 1;
        checkpoint.last_error = Some(error.to_string());
        checkpoint.records_processed = anchor.map(|c| c.records_processed).unwrap_or(0);

        self.store.insert_checkpoint(&checkpoint).await?;
        warn!(
            checkpoint_id = %checkpoint.id,
            source = source,
            error_count = checkpoint.error_count,
            "에러 체크포인트 생성"
        );
        Ok(checkpoint.id)
    }

    /// 체크포인트 상태/진행 갱신.
    ///
    /// 위치와 처리 수는 후퇴하지 않으며, 완료된 체크포인트는 다른 상태로
    /// 되돌리지 않습니다. 완료 처리 시 에러 횟수는 초기화됩니다.
    pub async fn update_status(
        &self,
        checkpoint_id: &str,
        status: CheckpointStatus,
        current_position: Option<i64>,
        records_processed: Option<i64>,
    ) -> Result<Checkpoint> {
        let mut checkpoint = self.load(checkpoint_id).await?;

        if checkpoint.status == CheckpointStatus::Completed && status != CheckpointStatus::Completed
        {
            warn!(
                checkpoint_id = checkpoint_id,
                requested = status.as_str(),
                "완료된 체크포인트 상태 변경 무시"
            );
        } else {
            if status == CheckpointStatus::Completed {
                checkpoint.error_count = 0;
                checkpoint.last_error = None;
            }
            checkpoint.status = status;
        }

        if let Some(position) = current_position {
            if position < checkpoint.current_position {
                debug!(
                    checkpoint_id = checkpoint_id,
                    current = checkpoint.current_position,
                    requested = position,
                    "위치 후퇴 요청 무시"
                );
            }
            checkpoint.current_position = checkpoint.current_position.max(position);
        }
        if let Some(processed) = records_processed {
            checkpoint.records_processed = checkpoint.records_processed.max(processed);
        }
        checkpoint.updated_at = Utc::now();

        self.store.update_checkpoint(&checkpoint).await?;
        Ok(checkpoint)
    }

    /// 소스의 복구 조치 판단.
    pub async fn get_recovery_info(
        &self,
        source: &str,
        options: RecoveryOptions,
    ) -> Result<RecoveryInfo> {
        let max_retries = options.max_retries.unwrap_or(self.max_retries);
        let history = self.store.query_checkpoints(None, Some(source)).await?;

        let Some(latest) = history.last() else {
            return Ok(RecoveryInfo {
                can_resume: false,
                last_checkpoint: None,
                action: RecoveryAction::Resume,
                resume_position: None,
                message: format!("{}: 체크포인트 없음, 일반 수집", source),
            });
        };

        if latest.status == CheckpointStatus::Completed {
            return Ok(RecoveryInfo {
                can_resume: false,
                last_checkpoint: Some(latest.clone()),
                action: RecoveryAction::Skip,
                resume_position: None,
                message: format!("{}: 이미 완료됨", source),
            });
        }

        if latest.error_count > max_retries {
            return Ok(RecoveryInfo {
                can_resume: false,
                last_checkpoint: Some(latest.clone()),
                action: RecoveryAction::Restart,
                resume_position: None,
                message: format!(
                    "{}: 에러 {}회 (한도 {}) 초과, 전체 재동기화 필요",
                    source, latest.error_count, max_retries
                ),
            });
        }

        if latest.has_position_regression() {
            return Ok(RecoveryInfo {
                can_resume: false,
                last_checkpoint: Some(latest.clone()),
                action: RecoveryAction::Restart,
                resume_position: None,
                message: format!(
                    "{}: 위치 불일치 (current {} < start {}), 전체 재동기화 필요",
                    source, latest.current_position, latest.start_position
                ),
            });
        }

        let anchor = latest_non_error(&history).unwrap_or(latest);
        Ok(RecoveryInfo {
            can_resume: true,
            last_checkpoint: Some(latest.clone()),
            action: RecoveryAction::Resume,
            resume_position: Some(anchor.current_position),
            message: format!(
                "{}: {} 위치 {}에서 재개",
                source, anchor.id, anchor.current_position
            ),
        })
    }

    /// 체크포인트에서 재개 상태 로드.
    pub async fn resume_from_checkpoint(
        &self,
        checkpoint_id: &str,
        options: ResumeOptions,
    ) -> Result<ResumeState> {
        let mut checkpoint = self.load(checkpoint_id).await?;

        if options.reset_errors && (checkpoint.error_count > 0 || checkpoint.last_error.is_some())
        {
            checkpoint.error_count = 0;
            checkpoint.last_error = None;
            checkpoint.updated_at = Utc::now();
            self.store.update_checkpoint(&checkpoint).await?;
            info!(checkpoint_id = checkpoint_id, "체크포인트 에러 카운터 초기화");
        }

        let processed_items = if options.skip_processed {
            checkpoint.succeeded_items()
        } else {
            Vec::new()
        };

        Ok(ResumeState {
            resume_position: checkpoint.current_position,
            processed_items,
            checkpoint,
        })
    }

    /// 소스의 최신 배치 체크포인트에서 성공한 항목
    pub async fn latest_batch_items(&self, source: &str) -> Result<Vec<BatchItem>> {
        let history = self.store.query_checkpoints(None, Some(source)).await?;
        let items = history
            .iter()
            .rev()
            .find_map(|c| match &c.payload {
                CheckpointPayload::Batch { items, .. } => Some(items.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .filter(|item| item.outcome == ItemOutcome::Success)
            .collect())
    }

    /// 실행의 활성 체크포인트를 모두 `paused`로 표시합니다.
    ///
    /// 정상 종료/취소 시 호출해 다음 실행에서 재개할 수 있게 합니다.
    pub async fn mark_interrupted(&self, run_id: Uuid) -> Result<usize> {
        let active: Vec<Checkpoint> = self
            .store
            .query_checkpoints(Some(run_id), None)
            .await?
            .into_iter()
            .filter(|c| c.status == CheckpointStatus::Active)
            .collect();

        for mut checkpoint in active.iter().cloned() {
            checkpoint.status = CheckpointStatus::Paused;
            checkpoint.updated_at = Utc::now();
            self.store.update_checkpoint(&checkpoint).await?;
        }

        if !active.is_empty() {
            info!(run_id = %run_id, paused = active.len(), "활성 체크포인트 중단 처리");
        }
        Ok(active.len())
    }

    /// 체크포인트 목록 조회
    pub async fn list_checkpoints(
        &self,
        run_id: Option<Uuid>,
        source: Option<&str>,
    ) -> Result<Vec<Checkpoint>> {
        Ok(self.store.query_checkpoints(run_id, source).await?)
    }

    async fn load(&self, checkpoint_id: &str) -> Result<Checkpoint> {
        self.store
            .get_checkpoint(checkpoint_id)
            .await?
            .ok_or_else(|| {
                CollectorError::Checkpoint(format!("체크포인트를 찾을 수 없음: {}", checkpoint_id))
            })
    }
}

fn latest_non_error(history: &[Checkpoint]) -> Option<&Checkpoint> {
    history.iter().rev().find(|c| c.kind != CheckpointKind::Error)
}
