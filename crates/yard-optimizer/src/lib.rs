//! # Yard Optimizer
//!
//! 求解引擎抽象、`good_lp` 後端與不可行診斷

pub mod backend;
pub mod diagnosis;
pub mod engine;
pub mod runner;

// Re-export 主要類型
pub use backend::GoodLpEngine;
pub use diagnosis::{diagnose, Diagnosis};
pub use engine::{OptimizationEngine, Outcome, SolveMode};
pub use runner::{run_model, SolveReport};

/// 求解錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("模型無界")]
    Unbounded,

    #[error("求解器錯誤: {0}")]
    Backend(String),

    #[error("時間限制 {0:?} 內找不到可行解")]
    TimedOut(std::time::Duration),

    #[error("求解器異常終止: {0}")]
    Panicked(String),

    #[error(transparent)]
    Model(#[from] yard_model::ModelError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
