//! 데이터 수집 모듈.

pub mod anomaly_scan;
pub mod checkpoint;
pub mod coordinator;
pub mod fetch;
pub mod quality;

pub use anomaly_scan::{scan_all, scan_series, SeriesAnomaly};
pub use checkpoint::{
    CheckpointManager, RecoveryAction, RecoveryInfo, RecoveryOptions, ResumeOptions, ResumeState,
};
pub use coordinator::{group_source, RunCoordinator, RunOptions};
pub use fetch::{FetchOptions, FetchOrchestrator};
pub use quality::DataQualityMonitor;
