//! 批次任務登記

use crate::orchestrator::{BatchReport, BatchRequest};
use crate::{PlannerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// 任務狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl TaskStatus {
    fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running | TaskStatus::Error)
                | (TaskStatus::Running, TaskStatus::Completed | TaskStatus::Error)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// 完成任務的結果摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub run_id: Uuid,
    pub feasible_weeks: usize,
    pub infeasible_weeks: usize,
    pub skipped_weeks: usize,
}

/// 任務記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub status: TaskStatus,
    /// 進度百分比
    pub progress: u8,
    pub message: String,
    pub request: BatchRequest,
    pub summary: Option<TaskSummary>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// 任務登記（以任務ID為鍵）
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: HashMap<Uuid, TaskRecord>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登記新任務，狀態為 `Pending`
    pub fn create(&mut self, request: BatchRequest) -> Uuid {
        let id = Uuid::new_v4();
        self.tasks.insert(
            id,
            TaskRecord {
                id,
                status: TaskStatus::Pending,
                progress: 0,
                message: "任務排隊中".to_string(),
                request,
                summary: None,
                error: None,
                created_at: Utc::now(),
                finished_at: None,
            },
        );
        info!("登記任務 {}", id);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&TaskRecord> {
        self.tasks.get(&id)
    }

    /// 依登記時間排序
    pub fn list(&self) -> Vec<&TaskRecord> {
        let mut tasks: Vec<&TaskRecord> = self.tasks.values().collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn remove(&mut self, id: Uuid) -> Result<TaskRecord> {
        self.tasks.remove(&id).ok_or(PlannerError::TaskNotFound(id))
    }

    pub fn start(&mut self, id: Uuid) -> Result<()> {
        let task = self.transition(id, TaskStatus::Running)?;
        task.message = "執行中".to_string();
        Ok(())
    }

    pub fn set_progress(&mut self, id: Uuid, percent: u8) -> Result<()> {
        let task = self.tasks.get_mut(&id).ok_or(PlannerError::TaskNotFound(id))?;
        if task.status != TaskStatus::Running {
            return Err(PlannerError::InvalidTransition {
                subject: id.to_string(),
                from: task.status.to_string(),
                to: format!("{}%", percent),
            });
        }
        task.progress = percent.min(100);
        Ok(())
    }

    pub fn complete(&mut self, id: Uuid, report: &BatchReport) -> Result<()> {
        let task = self.transition(id, TaskStatus::Completed)?;
        let feasible = report.feasible.len();
        let infeasible = report.infeasible.len();
        task.progress = 100;
        task.message = format!("完成: 可行 {} 週，不可行 {} 週", feasible, infeasible);
        task.summary = Some(TaskSummary {
            run_id: report.run_id,
            feasible_weeks: feasible,
            infeasible_weeks: infeasible,
            skipped_weeks: report.outcomes.len().saturating_sub(feasible + infeasible),
        });
        task.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, id: Uuid, error: &str) -> Result<()> {
        let task = self.transition(id, TaskStatus::Error)?;
        task.message = "執行失敗".to_string();
        task.error = Some(error.to_string());
        task.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, id: Uuid, next: TaskStatus) -> Result<&mut TaskRecord> {
        let task = self.tasks.get_mut(&id).ok_or(PlannerError::TaskNotFound(id))?;
        if !task.status.can_transition_to(next) {
            return Err(PlannerError::InvalidTransition {
                subject: id.to_string(),
                from: task.status.to_string(),
                to: next.to_string(),
            });
        }
        task.status = next;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use yard_core::WeekSelection;

    fn request() -> BatchRequest {
        BatchRequest {
            weeks: WeekSelection::Explicit(vec![NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()]),
            participation: 68,
            criterion: "criterio_ii".to_string(),
        }
    }

    fn report() -> BatchReport {
        BatchReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            feasible: vec![NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()],
            infeasible: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn test_task_lifecycle() {
        let mut store = TaskStore::new();
        let id = store.create(request());
        assert_eq!(store.get(id).unwrap().status, TaskStatus::Pending);

        store.start(id).unwrap();
        store.set_progress(id, 50).unwrap();
        assert_eq!(store.get(id).unwrap().progress, 50);

        store.complete(id, &report()).unwrap();

        let task = store.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.finished_at.is_some());
        assert_eq!(task.summary.as_ref().unwrap().feasible_weeks, 1);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut store = TaskStore::new();
        let id = store.create(request());

        assert!(matches!(
            store.complete(id, &report()),
            Err(PlannerError::InvalidTransition { .. })
        ));
        assert!(store.set_progress(id, 10).is_err());

        store.fail(id, "資料來源無法使用").unwrap();
        assert!(store.start(id).is_err());
        assert_eq!(store.get(id).unwrap().error.as_deref(), Some("資料來源無法使用"));
    }

    #[test]
    fn test_list_and_remove() {
        let mut store = TaskStore::new();
        let a = store.create(request());
        let b = store.create(request());
        assert_eq!(store.list().len(), 2);

        let removed = store.remove(a).unwrap();
        assert_eq!(removed.id, a);
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].id, b);
        assert!(matches!(store.remove(a), Err(PlannerError::TaskNotFound(_))));
    }
}
