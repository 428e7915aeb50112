//! `good_lp` 後端
//!
//! 預設使用純 Rust 的 microlp，啟用 `highs` feature 時改用 HiGHS；兩者都套用時間限制。

use crate::engine::{OptimizationEngine, Outcome, SolveMode};
use crate::{EngineError, Result};
use good_lp::solvers::{SolutionStatus, WithTimeLimit};
use good_lp::{
    variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use yard_model::{Domain, LinearExpr, Model, Relation, VarValues};

/// 已驗證、可重複求解的模型
#[derive(Debug, Clone)]
pub struct PreparedModel {
    model: Model,
}

impl PreparedModel {
    pub fn model(&self) -> &Model {
        &self.model
    }
}

/// `good_lp` 引擎
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpEngine;

impl GoodLpEngine {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizationEngine for GoodLpEngine {
    type Handle = PreparedModel;

    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn build(&self, model: &Model) -> Result<PreparedModel> {
        model.validate()?;
        debug!(
            "建立模型 {}: {} 個變數, {} 條約束",
            model.name,
            model.variables().len(),
            model.constraint_count()
        );
        Ok(PreparedModel {
            model: model.clone(),
        })
    }

    fn solve(
        &self,
        handle: &PreparedModel,
        mode: SolveMode,
        time_limit: Duration,
    ) -> Result<Outcome> {
        let model = &handle.model;
        let started = Instant::now();

        // 後端的 panic 在此截斷，避免拖垮整批週次
        let solved = panic::catch_unwind(AssertUnwindSafe(|| {
            solve_with_backend(model, mode, time_limit)
        }))
        .map_err(|payload| EngineError::Panicked(panic_message(payload)))??;

        let elapsed = started.elapsed();
        let Some(raw) = solved else {
            debug!("{} ({:?}) 不可行，耗時 {:?}", model.name, mode, elapsed);
            return Ok(Outcome::Infeasible);
        };

        if mode == SolveMode::Probe {
            debug!("{} 可行性探測通過，耗時 {:?}", model.name, elapsed);
            return Ok(Outcome::Optimal {
                values: VarValues::new(Vec::new()),
                objective: 0.0,
            });
        }

        let values = VarValues::new(
            model
                .variables()
                .iter()
                .zip(raw.values)
                .map(|(var, value)| {
                    if var.domain.is_integral() {
                        value.round().max(0.0)
                    } else {
                        value.max(0.0)
                    }
                })
                .collect(),
        );
        let objective = model.objective().eval(&values);

        info!(
            "{} 求解完成: 目標值 {:.3}，狀態 {:?}，耗時 {:?}",
            model.name, objective, raw.status, elapsed
        );

        match raw.status {
            SolutionStatus::Optimal => Ok(Outcome::Optimal { values, objective }),
            SolutionStatus::TimeLimit => Ok(Outcome::Feasible {
                values,
                objective,
                time_limit_reached: true,
            }),
            SolutionStatus::GapLimit => Ok(Outcome::Feasible {
                values,
                objective,
                time_limit_reached: false,
            }),
        }
    }
}

/// 後端回傳的原始解與終止狀態
struct RawSolution {
    values: Vec<f64>,
    status: SolutionStatus,
}

/// 回傳 `None` 代表不可行
fn solve_with_backend(
    model: &Model,
    mode: SolveMode,
    time_limit: Duration,
) -> Result<Option<RawSolution>> {
    let mut vars = ProblemVariables::new();
    let columns: Vec<Variable> = model
        .variables()
        .iter()
        .map(|v| {
            let definition = match v.domain {
                Domain::Binary => variable().binary(),
                Domain::NonNegativeInteger => variable().integer().min(0.0),
                Domain::NonNegativeReal => variable().min(0.0),
            };
            vars.add(definition.name(v.name.clone()))
        })
        .collect();

    let to_expression = |expr: &LinearExpr| -> Expression {
        expr.terms()
            .iter()
            .fold(Expression::from(expr.constant_part()), |acc, (var, coef)| {
                acc + *coef * columns[var.0]
            })
    };

    let objective = match mode {
        SolveMode::Probe => Expression::from(0.0),
        SolveMode::Full => to_expression(model.objective()),
    };

    let mut problem = backend_problem(vars, objective, time_limit);
    for family in model.families() {
        for constraint in &family.constraints {
            // 沒有變數的約束直接判定
            if constraint.row.lhs.terms().is_empty() {
                if constraint.row.is_satisfied(&VarValues::new(Vec::new()), 1e-9) {
                    continue;
                }
                debug!("{} 為恆假約束", constraint.label);
                return Ok(None);
            }
            let lhs = to_expression(&constraint.row.lhs);
            let rhs = constraint.row.rhs;
            problem.add_constraint(match constraint.row.relation {
                Relation::Le => lhs.leq(rhs),
                Relation::Ge => lhs.geq(rhs),
                Relation::Eq => lhs.eq(rhs),
            });
        }
    }

    match problem.solve() {
        Ok(solution) => Ok(Some(RawSolution {
            values: columns.iter().map(|c| solution.value(*c)).collect(),
            status: solution.status(),
        })),
        Err(ResolutionError::Infeasible) => Ok(None),
        // 時間用盡時仍沒有任何可行解
        Err(ResolutionError::Other(message)) if message.starts_with("Time limit") => {
            Err(EngineError::TimedOut(time_limit))
        }
        Err(ResolutionError::Unbounded) => Err(EngineError::Unbounded),
        Err(e) => Err(EngineError::Backend(e.to_string())),
    }
}

#[cfg(not(feature = "highs"))]
const BACKEND_NAME: &str = "microlp";

#[cfg(feature = "highs")]
const BACKEND_NAME: &str = "highs";

#[cfg(not(feature = "highs"))]
fn backend_problem(
    vars: ProblemVariables,
    objective: Expression,
    time_limit: Duration,
) -> impl SolverModel<Error = ResolutionError> {
    vars.minimise(objective)
        .using(good_lp::solvers::microlp::microlp)
        .with_time_limit(time_limit.as_secs_f64())
}

#[cfg(feature = "highs")]
fn backend_problem(
    vars: ProblemVariables,
    objective: Expression,
    time_limit: Duration,
) -> impl SolverModel<Error = ResolutionError> {
    vars.minimise(objective)
        .using(good_lp::solvers::highs::highs)
        .with_time_limit(time_limit.as_secs_f64())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知錯誤".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use yard_model::{ConstraintFamily, Row};

    /// min x + 2y, x + y >= 3, x <= 2（x, y 為非負整數）
    fn small_model() -> Model {
        let mut model = Model::new("small");
        let x = model.add_var("x".to_string(), Domain::NonNegativeInteger);
        let y = model.add_var("y".to_string(), Domain::NonNegativeInteger);
        model.add_family(ConstraintFamily::build(
            "cover",
            [()],
            |_| "all".to_string(),
            |_| Some(Row::ge(LinearExpr::sum([x, y]), LinearExpr::constant(3.0))),
        ));
        model.add_family(ConstraintFamily::build(
            "cap",
            [()],
            |_| "x".to_string(),
            |_| Some(Row::le(LinearExpr::var(x), LinearExpr::constant(2.0))),
        ));
        model.set_objective(LinearExpr::new().plus(1.0, x).plus(2.0, y));
        model
    }

    #[test]
    fn test_full_solve_optimal() {
        let engine = GoodLpEngine::new();
        let handle = engine.build(&small_model()).unwrap();
        let outcome = engine
            .solve(&handle, SolveMode::Full, Duration::from_secs(10))
            .unwrap();

        assert!(outcome.is_proven_optimal());
        let values = outcome.values().unwrap();
        assert_eq!(values.as_slice(), &[2.0, 1.0]);
        assert!((outcome.objective().unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_quick_solve_is_not_flagged_as_time_limited() {
        // 限制很短但求解在限制內完成，狀態取自求解器而非牆鐘
        let engine = GoodLpEngine::new();
        let handle = engine.build(&small_model()).unwrap();
        let outcome = engine
            .solve(&handle, SolveMode::Full, Duration::from_millis(500))
            .unwrap();
        assert!(matches!(outcome, Outcome::Optimal { .. }));
    }

    #[test]
    fn test_zero_time_limit_times_out() {
        let mut model = Model::new("relaxed");
        let x = model.add_var("x".to_string(), Domain::NonNegativeReal);
        let y = model.add_var("y".to_string(), Domain::NonNegativeReal);
        model.add_family(ConstraintFamily::build(
            "cover",
            [()],
            |_| "all".to_string(),
            |_| Some(Row::ge(LinearExpr::sum([x, y]), LinearExpr::constant(3.0))),
        ));
        model.set_objective(LinearExpr::new().plus(1.0, x).plus(2.0, y));

        let engine = GoodLpEngine::new();
        let handle = engine.build(&model).unwrap();
        let result = engine.solve(&handle, SolveMode::Full, Duration::ZERO);
        assert!(matches!(result, Err(EngineError::TimedOut(limit)) if limit == Duration::ZERO));
    }

    #[test]
    fn test_probe_has_no_values() {
        let engine = GoodLpEngine::new();
        let handle = engine.build(&small_model()).unwrap();
        let outcome = engine
            .solve(&handle, SolveMode::Probe, Duration::from_secs(10))
            .unwrap();

        assert!(outcome.is_feasible());
        assert!(outcome.values().unwrap().is_empty());
    }

    #[test]
    fn test_infeasible_model() {
        let mut model = small_model();
        let x = yard_model::VarId(0);
        let y = yard_model::VarId(1);
        model.add_family(ConstraintFamily::build(
            "tight",
            [()],
            |_| "sum".to_string(),
            |_| Some(Row::le(LinearExpr::sum([x, y]), LinearExpr::constant(1.0))),
        ));

        let engine = GoodLpEngine::new();
        let handle = engine.build(&model).unwrap();
        let outcome = engine
            .solve(&handle, SolveMode::Probe, Duration::from_secs(10))
            .unwrap();
        assert_eq!(outcome, Outcome::Infeasible);
    }

    #[rstest]
    #[case(Relation::Le, 0.0, true)]
    #[case(Relation::Le, -1.0, false)]
    #[case(Relation::Ge, 1.0, false)]
    #[case(Relation::Eq, 0.0, true)]
    fn test_constant_rows_decided_directly(
        #[case] relation: Relation,
        #[case] rhs: f64,
        #[case] feasible: bool,
    ) {
        let mut model = small_model();
        model.add_family(ConstraintFamily::build(
            "constant",
            [()],
            |_| String::new(),
            |_| {
                Some(Row {
                    lhs: LinearExpr::new(),
                    relation,
                    rhs,
                })
            },
        ));

        let engine = GoodLpEngine::new();
        let handle = engine.build(&model).unwrap();
        let outcome = engine
            .solve(&handle, SolveMode::Probe, Duration::from_secs(10))
            .unwrap();
        assert_eq!(outcome.is_feasible(), feasible);
    }

    #[test]
    fn test_build_rejects_invalid_model() {
        let mut model = Model::new("broken");
        model.set_objective(LinearExpr::var(yard_model::VarId(3)));
        let result = GoodLpEngine::new().build(&model);
        assert!(matches!(result, Err(EngineError::Model(_))));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "未知錯誤");
    }
}
