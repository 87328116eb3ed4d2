//! # Monitor Core
//!
//! 경제 지표 모니터링 시스템의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집기, 분석기, API 서버 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시계열(Series) 및 업데이트 주기(Cadence) 정의
//! - 관측값, 수집 결과, 수집 실행(Run) 기록
//! - 체크포인트 및 데이터 품질 이슈
//! - 발표 캘린더 (영업일, 미국 연방 공휴일)
//! - 설정 관리
//! - 로깅 인프라

pub mod calendar;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use calendar::*;
pub use self::config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
