//! 週狀態機

use crate::{PlannerError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// 單週處理狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekState {
    Pending,
    /// 堆場分配可行
    ColoringSolved,
    /// 堆場分配不可行（終態）
    ColoringInfeasible,
    CranesSolved,
    /// 缺少吊機輸入，未排程
    CranesSkipped,
    /// 缺少週輸入（終態，不列入任何分區）
    InputMissing,
    /// 非預期錯誤（終態，不列入任何分區）
    Failed,
}

impl WeekState {
    pub fn can_transition_to(self, next: WeekState) -> bool {
        use WeekState::*;
        matches!(
            (self, next),
            (Pending, ColoringSolved | ColoringInfeasible | InputMissing | Failed)
                | (ColoringSolved, CranesSolved | CranesSkipped | Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, WeekState::Pending | WeekState::ColoringSolved)
    }

    /// 屬於可行分區
    pub fn is_feasible(self) -> bool {
        matches!(
            self,
            WeekState::ColoringSolved | WeekState::CranesSolved | WeekState::CranesSkipped
        )
    }

    /// 屬於不可行分區
    pub fn is_infeasible(self) -> bool {
        self == WeekState::ColoringInfeasible
    }
}

impl fmt::Display for WeekState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WeekState::Pending => "PENDING",
            WeekState::ColoringSolved => "COLORING_SOLVED",
            WeekState::ColoringInfeasible => "COLORING_INFEASIBLE",
            WeekState::CranesSolved => "CRANES_SOLVED",
            WeekState::CranesSkipped => "CRANES_SKIPPED",
            WeekState::InputMissing => "INPUT_MISSING",
            WeekState::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// 追蹤一週的狀態轉換
#[derive(Debug, Clone)]
pub struct WeekTracker {
    week: NaiveDate,
    state: WeekState,
}

impl WeekTracker {
    pub fn new(week: NaiveDate) -> Self {
        Self {
            week,
            state: WeekState::Pending,
        }
    }

    pub fn week(&self) -> NaiveDate {
        self.week
    }

    pub fn state(&self) -> WeekState {
        self.state
    }

    pub fn advance(&mut self, next: WeekState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(PlannerError::InvalidTransition {
                subject: self.week.to_string(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        debug!("{}: {} → {}", self.week, self.state, next);
        self.state = next;
        Ok(())
    }
}
