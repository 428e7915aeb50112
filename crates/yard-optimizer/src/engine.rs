//! 求解引擎介面

use crate::Result;
use std::time::Duration;
use yard_model::{Model, VarValues};

/// 求解模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMode {
    /// 只判斷可行性：目標為零，不擷取解
    Probe,
    /// 完整優化
    Full,
}

/// 求解結果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Optimal {
        values: VarValues,
        objective: f64,
    },
    Feasible {
        values: VarValues,
        objective: f64,
        time_limit_reached: bool,
    },
    Infeasible,
}

impl Outcome {
    pub fn is_feasible(&self) -> bool {
        !matches!(self, Outcome::Infeasible)
    }

    /// 是否證明最優
    pub fn is_proven_optimal(&self) -> bool {
        matches!(self, Outcome::Optimal { .. })
    }

    pub fn values(&self) -> Option<&VarValues> {
        match self {
            Outcome::Optimal { values, .. } | Outcome::Feasible { values, .. } => Some(values),
            Outcome::Infeasible => None,
        }
    }

    pub fn objective(&self) -> Option<f64> {
        match self {
            Outcome::Optimal { objective, .. } | Outcome::Feasible { objective, .. } => {
                Some(*objective)
            }
            Outcome::Infeasible => None,
        }
    }
}

/// 優化引擎
///
/// `build` 產生的 handle 可重複求解；probe 模式下回傳的解值為空。
pub trait OptimizationEngine {
    type Handle;

    /// 後端名稱
    fn name(&self) -> &str;

    fn build(&self, model: &Model) -> Result<Self::Handle>;

    fn solve(&self, handle: &Self::Handle, mode: SolveMode, time_limit: Duration)
        -> Result<Outcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let optimal = Outcome::Optimal {
            values: VarValues::new(vec![1.0]),
            objective: 3.0,
        };
        assert!(optimal.is_feasible());
        assert!(optimal.is_proven_optimal());
        assert_eq!(optimal.objective(), Some(3.0));

        let incumbent = Outcome::Feasible {
            values: VarValues::new(vec![1.0]),
            objective: 4.0,
            time_limit_reached: true,
        };
        assert!(incumbent.is_feasible());
        assert!(!incumbent.is_proven_optimal());
        assert_eq!(incumbent.values().map(|v| v.len()), Some(1));

        assert!(!Outcome::Infeasible.is_feasible());
        assert_eq!(Outcome::Infeasible.objective(), None);
        assert!(Outcome::Infeasible.values().is_none());
    }
}
