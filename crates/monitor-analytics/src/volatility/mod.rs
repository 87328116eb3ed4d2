//! 조건부 변동성 모델.

pub mod garch;

pub use garch::*;
