//! 도메인 모델.

pub mod checkpoint;
pub mod observation;
pub mod quality;
pub mod run;
pub mod series;

pub use checkpoint::*;
pub use observation::*;
pub use quality::*;
pub use run::*;
pub use series::*;
