//! 값 이상 탐지.

pub mod zscore;

pub use zscore::*;
