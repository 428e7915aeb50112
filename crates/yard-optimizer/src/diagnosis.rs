//! 不可行診斷
//!
//! 刪除過濾：先以整個約束族為單位嘗試移除，再對保留下來的族逐條移除。
//! 移除後仍不可行的約束即可捨去；剩下的集合就是不可行子集。
//! 探測次數用盡時回傳目前的集合，並標記為非最小。

use crate::engine::{OptimizationEngine, Outcome, SolveMode};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use yard_core::DiagnosisSettings;
use yard_model::{ConstraintRef, Model};

/// 診斷結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// 不可行子集的約束標籤（依模型順序）
    pub constraints: Vec<String>,
    /// 涉及的約束族
    pub families: Vec<String>,
    /// 是否完成逐條過濾
    pub minimal: bool,
    pub probes: usize,
}

impl Diagnosis {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

struct Filter<'a, E: OptimizationEngine> {
    engine: &'a E,
    model: &'a Model,
    settings: &'a DiagnosisSettings,
    probes: usize,
}

impl<E: OptimizationEngine> Filter<'_, E> {
    fn exhausted(&self) -> bool {
        self.probes >= self.settings.max_probes
    }

    /// 子模型是否仍不可行；錯誤或逾時視為可行（保留約束）
    fn still_infeasible(&mut self, keep: &HashSet<ConstraintRef>) -> bool {
        self.probes += 1;
        let restricted = self.model.restricted(keep);
        let outcome = self.engine.build(&restricted).and_then(|handle| {
            self.engine
                .solve(&handle, SolveMode::Probe, self.settings.probe_time_limit())
        });
        match outcome {
            Ok(Outcome::Infeasible) => true,
            Ok(_) => false,
            Err(e) => {
                debug!("探測失敗，保留約束: {}", e);
                false
            }
        }
    }
}

/// 對不可行模型找出不可行子集
pub fn diagnose<E: OptimizationEngine>(
    engine: &E,
    model: &Model,
    settings: &DiagnosisSettings,
) -> Result<Diagnosis> {
    let mut filter = Filter {
        engine,
        model,
        settings,
        probes: 0,
    };
    let mut keep: HashSet<ConstraintRef> = model.constraint_refs().into_iter().collect();
    let mut minimal = true;

    // 第一階段：整族移除
    for (fi, family) in model.families().iter().enumerate() {
        if family.is_empty() {
            continue;
        }
        if filter.exhausted() {
            minimal = false;
            break;
        }
        let candidate: HashSet<ConstraintRef> =
            keep.iter().copied().filter(|r| r.family != fi).collect();
        if filter.still_infeasible(&candidate) {
            debug!("約束族 {} 與不可行無關", family.name);
            keep = candidate;
        }
    }

    // 第二階段：逐條移除
    if minimal {
        let mut ordered: Vec<ConstraintRef> = keep.iter().copied().collect();
        ordered.sort();
        for r in ordered {
            if filter.exhausted() {
                minimal = false;
                break;
            }
            keep.remove(&r);
            if !filter.still_infeasible(&keep) {
                keep.insert(r);
            }
        }
    }

    let mut refs: Vec<ConstraintRef> = keep.into_iter().collect();
    refs.sort();
    let constraints: Vec<String> = refs
        .iter()
        .filter_map(|r| model.constraint(*r))
        .map(|c| c.label.clone())
        .collect();
    let mut families: Vec<String> = Vec::new();
    for r in &refs {
        let name = &model.families()[r.family].name;
        if families.last() != Some(name) {
            families.push(name.clone());
        }
    }

    if minimal {
        info!(
            "{} 不可行子集: {} 條約束（{} 次探測）",
            model.name,
            constraints.len(),
            filter.probes
        );
    } else {
        warn!(
            "{} 診斷探測次數用盡，回傳 {} 條約束（非最小）",
            model.name,
            constraints.len()
        );
    }

    Ok(Diagnosis {
        constraints,
        families,
        minimal,
        probes: filter.probes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GoodLpEngine;
    use yard_model::{ConstraintFamily, Domain, LinearExpr, Row, VarId};

    /// x >= 5（lower）、x <= 3（upper）、y <= 10（other）
    fn conflicting_model() -> Model {
        let mut model = Model::new("conflict");
        let x = model.add_var("x".to_string(), Domain::NonNegativeInteger);
        let y = model.add_var("y".to_string(), Domain::NonNegativeInteger);
        model.add_family(ConstraintFamily::build(
            "other",
            [()],
            |_| "y".to_string(),
            |_| Some(Row::le(LinearExpr::var(y), LinearExpr::constant(10.0))),
        ));
        model.add_family(ConstraintFamily::build(
            "lower",
            [5.0, 1.0],
            |v| format!("{}", v),
            |v| Some(Row::ge(LinearExpr::var(x), LinearExpr::constant(*v))),
        ));
        model.add_family(ConstraintFamily::build(
            "upper",
            [()],
            |_| "x".to_string(),
            |_| Some(Row::le(LinearExpr::var(x), LinearExpr::constant(3.0))),
        ));
        model.set_objective(LinearExpr::var(VarId(0)));
        model
    }

    #[test]
    fn test_finds_minimal_subset() {
        let settings = DiagnosisSettings::default();
        let diagnosis = diagnose(&GoodLpEngine::new(), &conflicting_model(), &settings).unwrap();

        assert!(diagnosis.minimal);
        assert_eq!(
            diagnosis.constraints,
            vec!["lower[5]".to_string(), "upper[x]".to_string()]
        );
        assert_eq!(diagnosis.families, vec!["lower".to_string(), "upper".to_string()]);
        assert!(diagnosis.probes <= settings.max_probes);
    }

    #[test]
    fn test_probe_budget_exhausted() {
        let settings = DiagnosisSettings {
            max_probes: 1,
            ..DiagnosisSettings::default()
        };
        let diagnosis = diagnose(&GoodLpEngine::new(), &conflicting_model(), &settings).unwrap();

        assert!(!diagnosis.minimal);
        assert_eq!(diagnosis.probes, 1);
        // 只移除了 other 族
        assert_eq!(diagnosis.constraints.len(), 3);
        assert!(!diagnosis.is_empty());
    }
}
