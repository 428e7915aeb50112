//! 探測後求解
//!
//! 每個模型先做一次可行性探測；可行才做完整優化，不可行時依設定執行診斷。

use crate::diagnosis::{diagnose, Diagnosis};
use crate::engine::{OptimizationEngine, Outcome, SolveMode};
use crate::Result;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use yard_core::DiagnosisSettings;
use yard_model::Model;

/// 單一模型的求解報告
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub outcome: Outcome,
    /// 只有不可行且啟用診斷時才有
    pub diagnosis: Option<Diagnosis>,
    pub elapsed: Duration,
}

pub fn run_model<E: OptimizationEngine>(
    engine: &E,
    model: &Model,
    time_limit: Duration,
    diagnosis: &DiagnosisSettings,
) -> Result<SolveReport> {
    let started = Instant::now();
    info!("求解 {}（後端 {}）", model.name, engine.name());

    let outcome = {
        let handle = engine.build(model)?;
        let probe = engine.solve(&handle, SolveMode::Probe, time_limit)?;
        if probe.is_feasible() {
            engine.solve(&handle, SolveMode::Full, time_limit)?
        } else {
            Outcome::Infeasible
        }
    };

    let diagnosis = if outcome.is_feasible() || !diagnosis.enabled {
        None
    } else {
        warn!("{} 不可行，開始診斷", model.name);
        Some(diagnose(engine, model, diagnosis)?)
    };

    Ok(SolveReport {
        outcome,
        diagnosis,
        elapsed: started.elapsed(),
    })
}
