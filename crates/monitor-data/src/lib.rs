//! 데이터 제공자 및 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - 외부 시계열 제공자 trait과 FRED API 클라이언트
//! - 관측값 / 실행 기록 / 체크포인트 저장소 trait
//! - PostgreSQL (sqlx) 및 인메모리 저장소 구현
//! - SQL 마이그레이션

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use provider::{FredClient, ObservationProvider};
pub use storage::{
    dedupe_observations, open_store, CheckpointStore, Database, MemoryStore, MonitorStore,
    ObservationStore, PgStore, RunStore,
};
