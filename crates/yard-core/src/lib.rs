//! # Yard Core
//!
//! 堆場規劃的核心資料模型與類型定義

pub mod block;
pub mod calendar;
pub mod config;
pub mod crane;
pub mod exclusivity;
pub mod index;
pub mod instance;
pub mod loading;
pub mod segregation;
pub mod table;

// Re-export 主要類型
pub use block::Block;
pub use calendar::WeekSelection;
pub use config::{
    CraneSolveSettings, DiagnosisSettings, PlannerConfig, StrictnessPolicy, YardSettings,
};
pub use crane::{CraneInstance, CraneSettings};
pub use exclusivity::{ExclusivityRelation, ExclusivitySpec};
pub use index::{BlockIdx, CraneIdx, Period, SegIdx};
pub use instance::{FlowKind, PeriodDemand, YardInstance};
pub use loading::{
    BlockRecord, DemandRecord, DroppedRecord, InstanceLoader, InventoryRecord, LoadCostRecord,
    LoadReport, LoadedWeek, SegregationRecord, WeekRecords,
};
pub use segregation::{ContainerSize, Direction, Segregation};
pub use table::ParamTable;

/// 堆場核心錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum YardError {
    #[error("找不到{kind}: {id}")]
    UnknownId { kind: &'static str, id: String },

    #[error("重複的記錄: {0}")]
    DuplicateRecord(String),

    #[error("格式錯誤的記錄: {0}")]
    MalformedRecord(String),

    #[error("無效的參數: {0}")]
    InvalidParameter(String),

    #[error("缺少輸入: {0}")]
    MissingInput(String),

    #[error("無效的日期: {0}")]
    InvalidDate(String),

    #[error("I/O 錯誤: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化錯誤: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, YardError>;
