//! # Yard Model
//!
//! 堆場分配與吊機排程的約束建模、解碼與驗證

pub mod crane;
pub mod model;
pub mod plan;
pub mod summary;
pub mod verify;
pub mod yard;

// Re-export 主要類型
pub use crane::{CraneFormulation, CraneVars};
pub use model::{
    Constraint, ConstraintFamily, ConstraintRef, Domain, LinearExpr, Model, Relation, Row,
    VarBlock, VarId, VarValues, Variable,
};
pub use plan::{CranePlan, FlowCell, YardPlan};
pub use summary::{
    BlockWorkload, CraneBlockSummary, CraneShiftSummary, MovementDetail, PeriodSpread,
    SegregationSummary, WeekSummary, YardReport,
};
pub use verify::Violation;
pub use yard::{YardFormulation, YardVars};

/// 建模錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("{owner} 引用了不存在的變數 #{var}")]
    UnknownVariable { var: usize, owner: String },

    #[error("{0} 含有非有限係數")]
    NonFiniteCoefficient(String),

    #[error("解碼失敗: {0}")]
    Decode(String),

    #[error(transparent)]
    Core(#[from] yard_core::YardError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
