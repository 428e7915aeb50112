//! # Yard Weekly
//!
//! 週批次規劃：逐週求解堆場分配，可行週再依班次排程吊機

pub mod crane_instances;
pub mod logging;
pub mod orchestrator;
pub mod repository;
pub mod sink;
pub mod state;
pub mod task;

// Re-export 主要類型
pub use crane_instances::{apportion, crane_instances};
pub use orchestrator::{
    BatchOutput, BatchReport, BatchRequest, Orchestrator, ShiftOutcome, ShiftStatus,
    WeekOutcome,
};
pub use repository::{InMemoryRepository, InstanceRepository, JsonDirectoryRepository};
pub use sink::{DiagnosticScope, MemorySink, ResultSink};
pub use state::{WeekState, WeekTracker};
pub use task::{TaskRecord, TaskStatus, TaskStore, TaskSummary};

/// 週批次規劃錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Core(#[from] yard_core::YardError),

    #[error(transparent)]
    Model(#[from] yard_model::ModelError),

    #[error(transparent)]
    Engine(#[from] yard_optimizer::EngineError),

    #[error("無效的狀態轉換 {subject}: {from} → {to}")]
    InvalidTransition {
        subject: String,
        from: String,
        to: String,
    },

    #[error("資料來源無法使用: {0}")]
    RepositoryUnavailable(String),

    #[error("找不到任務: {0}")]
    TaskNotFound(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
