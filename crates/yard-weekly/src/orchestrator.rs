//! 週批次協調器
//!
//! 依呼叫者順序逐週處理：載入 → 堆場分配 → (可行時) 各班次吊機排程。
//! 單週的不可行或錯誤不會中斷批次；只有資料來源無法使用時才向上回傳。

use crate::crane_instances::crane_instances;
use crate::repository::InstanceRepository;
use crate::sink::{DiagnosticScope, MemorySink, ResultSink};
use crate::state::{WeekState, WeekTracker};
use crate::task::TaskStore;
use crate::{PlannerError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use yard_core::{
    CraneInstance, CraneSettings, InstanceLoader, Period, PlannerConfig, WeekRecords,
    WeekSelection, YardError,
};
use yard_model::{CraneFormulation, CranePlan, CraneShiftSummary, YardFormulation, YardPlan, YardReport};
use yard_optimizer::{run_model, OptimizationEngine, Outcome};

/// 週批次請求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub weeks: WeekSelection,
    /// 參與率（百分比），用於選擇實例檔
    pub participation: u32,
    /// 評估準則
    pub criterion: String,
}

/// 班次排程狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Solved,
    Infeasible,
    /// 沒有工作量
    Skipped,
    /// 求解過程出錯，訊息見 `ShiftOutcome::error`
    Failed,
}

/// 班次結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftOutcome {
    pub shift: Period,
    pub status: ShiftStatus,
    pub max_diff: Option<f64>,
    pub proven_optimal: bool,
    pub error: Option<String>,
}

/// 單週結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekOutcome {
    pub week: NaiveDate,
    pub state: WeekState,
    pub objective: Option<f64>,
    pub proven_optimal: bool,
    pub dropped_records: usize,
    pub shifts: Vec<ShiftOutcome>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl WeekOutcome {
    fn new(week: NaiveDate) -> Self {
        Self {
            week,
            state: WeekState::Pending,
            objective: None,
            proven_optimal: false,
            dropped_records: 0,
            shifts: Vec::new(),
            error: None,
            elapsed_ms: 0,
        }
    }
}

/// 批次結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feasible: Vec<NaiveDate>,
    pub infeasible: Vec<NaiveDate>,
    pub outcomes: Vec<WeekOutcome>,
}

impl BatchReport {
    pub fn outcome(&self, week: NaiveDate) -> Option<&WeekOutcome> {
        self.outcomes.iter().find(|o| o.week == week)
    }
}

/// 批次結果連同各週彙總與診斷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub report: BatchReport,
    pub results: MemorySink,
}

/// 週批次協調器
pub struct Orchestrator<E, R> {
    engine: E,
    repository: R,
    config: PlannerConfig,
}

impl<E: OptimizationEngine, R: InstanceRepository> Orchestrator<E, R> {
    pub fn new(engine: E, repository: R, config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            repository,
            config,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn run(&self, request: &BatchRequest, sink: &mut impl ResultSink) -> Result<BatchReport> {
        self.run_with_progress(request, sink, |_, _| {})
    }

    /// 以記憶體接收端執行批次，回傳分區與全部彙總輸出
    pub fn run_collected(&self, request: &BatchRequest) -> Result<BatchOutput> {
        let mut results = MemorySink::new();
        let report = self.run(request, &mut results)?;
        Ok(BatchOutput { report, results })
    }

    /// 每處理完一週呼叫 `progress(已完成, 總數)`
    pub fn run_with_progress(
        &self,
        request: &BatchRequest,
        sink: &mut impl ResultSink,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<BatchReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let weeks = request.weeks.weeks()?;
        info!(
            "開始批次 {}: {} 週，準則 {}，參與率 {}",
            run_id,
            weeks.len(),
            request.criterion,
            request.participation
        );

        let mut feasible = Vec::new();
        let mut infeasible = Vec::new();
        let mut outcomes = Vec::with_capacity(weeks.len());

        for (done, week) in weeks.iter().enumerate() {
            let outcome = self.process_week(request, *week, sink)?;
            if outcome.state.is_feasible() {
                feasible.push(*week);
            } else if outcome.state.is_infeasible() {
                infeasible.push(*week);
            }
            outcomes.push(outcome);
            progress(done + 1, weeks.len());
        }

        info!(
            "批次 {} 完成: 可行 {} 週，不可行 {} 週，略過 {} 週",
            run_id,
            feasible.len(),
            infeasible.len(),
            outcomes.len() - feasible.len() - infeasible.len()
        );

        Ok(BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            feasible,
            infeasible,
            outcomes,
        })
    }

    /// 以任務登記執行批次，任務狀態隨進度更新
    pub fn run_task(
        &self,
        store: &mut TaskStore,
        task_id: Uuid,
        sink: &mut impl ResultSink,
    ) -> Result<BatchReport> {
        let request = store
            .get(task_id)
            .map(|task| task.request.clone())
            .ok_or(PlannerError::TaskNotFound(task_id))?;
        store.start(task_id)?;

        let result = self.run_with_progress(&request, sink, |done, total| {
            let percent = (done * 100 / total.max(1)) as u8;
            if let Err(e) = store.set_progress(task_id, percent) {
                debug!("無法更新任務進度: {}", e);
            }
        });

        match result {
            Ok(report) => {
                store.complete(task_id, &report)?;
                Ok(report)
            }
            Err(e) => {
                store.fail(task_id, &e.to_string())?;
                Err(e)
            }
        }
    }

    fn process_week(
        &self,
        request: &BatchRequest,
        week: NaiveDate,
        sink: &mut impl ResultSink,
    ) -> Result<WeekOutcome> {
        let started = Instant::now();
        let mut tracker = WeekTracker::new(week);
        let mut outcome = WeekOutcome::new(week);

        let fetched = self
            .repository
            .week_records(&request.criterion, request.participation, week);
        let result = match fetched {
            Ok(Some(records)) => self.solve_week(&records, &mut tracker, &mut outcome, sink),
            Ok(None) => Err(PlannerError::Core(YardError::MissingInput(format!(
                "{} 沒有實例資料",
                week
            )))),
            Err(e @ PlannerError::RepositoryUnavailable(_)) => return Err(e),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            let next = match (&e, tracker.state()) {
                (PlannerError::Core(YardError::MissingInput(_)), WeekState::Pending) => {
                    warn!("{} 略過: {}", week, e);
                    WeekState::InputMissing
                }
                _ => {
                    error!("{} 處理失敗（狀態 {}）: {}", week, tracker.state(), e);
                    WeekState::Failed
                }
            };
            outcome.error = Some(e.to_string());
            if tracker.state().can_transition_to(next) {
                tracker.advance(next)?;
            }
        }

        outcome.state = tracker.state();
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        info!("{} 結束: {}（{} ms）", week, outcome.state, outcome.elapsed_ms);
        Ok(outcome)
    }

    fn solve_week(
        &self,
        records: &WeekRecords,
        tracker: &mut WeekTracker,
        outcome: &mut WeekOutcome,
        sink: &mut impl ResultSink,
    ) -> Result<()> {
        let week = tracker.week();
        let loaded = InstanceLoader::new(self.config.strictness).load(records)?;
        outcome.dropped_records = loaded.report.dropped_count();
        sink.record_load_report(week, &loaded.report);

        let instance = &loaded.instance;
        let formulation = YardFormulation::build(instance, &self.config.yard)?;
        let report = run_model(
            &self.engine,
            &formulation.model,
            self.config.yard.time_limit(),
            &self.config.diagnosis,
        )?;

        let (values, objective) = match &report.outcome {
            Outcome::Infeasible => {
                if let Some(diagnosis) = &report.diagnosis {
                    sink.record_diagnosis(week, DiagnosticScope::Yard, diagnosis);
                }
                tracker.advance(WeekState::ColoringInfeasible)?;
                return Ok(());
            }
            Outcome::Optimal { values, objective } => (values, *objective),
            Outcome::Feasible {
                values, objective, ..
            } => {
                warn!("{} 堆場分配達到時間限制，採用目前解", week);
                (values, *objective)
            }
        };

        let proven_optimal = report.outcome.is_proven_optimal();
        let plan = YardPlan::decode(&formulation, instance, values, objective, proven_optimal)?;
        for violation in plan.verify(instance, &self.config.yard) {
            warn!("{} 堆場計劃檢查未通過: {}", week, violation);
        }
        sink.record_yard(&YardReport::new(&plan, instance));
        outcome.objective = Some(objective);
        outcome.proven_optimal = proven_optimal;
        tracker.advance(WeekState::ColoringSolved)?;

        match &loaded.crane_settings {
            None => {
                info!("{} 沒有吊機設定，略過吊機排程", week);
                tracker.advance(WeekState::CranesSkipped)?;
            }
            Some(fleet) => {
                outcome.shifts = self.schedule_cranes(&plan, fleet, sink)?;
                tracker.advance(WeekState::CranesSolved)?;
            }
        }
        Ok(())
    }

    fn schedule_cranes(
        &self,
        plan: &YardPlan,
        fleet: &CraneSettings,
        sink: &mut impl ResultSink,
    ) -> Result<Vec<ShiftOutcome>> {
        let instances = crane_instances(plan, fleet, &self.config.crane)?;
        let mut shifts = Vec::with_capacity(instances.len());
        for instance in &instances {
            // 單一班次出錯只影響該班次
            let shift = match self.schedule_shift(instance, sink) {
                Ok(shift) => shift,
                Err(e) => {
                    error!("{} 班次 {} 吊機排程失敗: {}", instance.week, instance.shift, e);
                    ShiftOutcome {
                        shift: instance.shift,
                        status: ShiftStatus::Failed,
                        max_diff: None,
                        proven_optimal: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            shifts.push(shift);
        }
        Ok(shifts)
    }

    fn schedule_shift(
        &self,
        instance: &CraneInstance,
        sink: &mut impl ResultSink,
    ) -> Result<ShiftOutcome> {
        let mut shift = ShiftOutcome {
            shift: instance.shift,
            status: ShiftStatus::Skipped,
            max_diff: None,
            proven_optimal: false,
            error: None,
        };
        if instance.total_volume() == 0 {
            debug!("{} 班次 {} 沒有工作量", instance.week, instance.shift);
            return Ok(shift);
        }

        let formulation = CraneFormulation::build(instance)?;
        let report = run_model(
            &self.engine,
            &formulation.model,
            self.config.crane.time_limit(),
            &self.config.diagnosis,
        )?;

        let Some(values) = report.outcome.values() else {
            warn!("{} 班次 {} 吊機排程不可行", instance.week, instance.shift);
            if let Some(diagnosis) = &report.diagnosis {
                sink.record_diagnosis(
                    instance.week,
                    DiagnosticScope::CraneShift(instance.shift),
                    diagnosis,
                );
            }
            shift.status = ShiftStatus::Infeasible;
            return Ok(shift);
        };

        let plan = CranePlan::decode(
            &formulation,
            instance,
            values,
            report.outcome.is_proven_optimal(),
        )?;
        for violation in plan.verify(instance) {
            warn!(
                "{} 班次 {} 吊機計劃檢查未通過: {}",
                instance.week, instance.shift, violation
            );
        }
        let summary = CraneShiftSummary::new(&plan, instance);
        sink.record_crane_shift(&summary);

        shift.status = ShiftStatus::Solved;
        shift.max_diff = Some(plan.max_diff);
        shift.proven_optimal = plan.proven_optimal;
        Ok(shift)
    }
}
