//! 吊機排程模型
//!
//! 每個班次把吊機分配到區塊與子時段，最小化「提供作業量 − 需求量」的最大差距。

use crate::model::{ConstraintFamily, Domain, LinearExpr, Model, Row, VarBlock, VarId};
use crate::Result;
use yard_core::{BlockIdx, CraneIdx, CraneInstance, Period};

/// 吊機模型的變數
#[derive(Debug, Clone, Copy)]
pub struct CraneVars {
    pub active: VarBlock,
    pub alpha: VarBlock,
    pub occupies: VarBlock,
    pub max_diff: VarId,
}

impl CraneVars {
    pub fn active(&self, g: CraneIdx, b: BlockIdx, t: Period) -> VarId {
        self.active.at3(g.0, b.0, t.offset())
    }

    /// 連續作業的起點
    pub fn alpha(&self, g: CraneIdx, b: BlockIdx, t: Period) -> VarId {
        self.alpha.at3(g.0, b.0, t.offset())
    }

    /// 吊機在班次內是否佔用區塊（Z）
    pub fn occupies(&self, g: CraneIdx, b: BlockIdx) -> VarId {
        self.occupies.at2(g.0, b.0)
    }
}

/// 組好的吊機模型
#[derive(Debug, Clone)]
pub struct CraneFormulation {
    pub model: Model,
    pub vars: CraneVars,
}

impl CraneFormulation {
    pub fn build(instance: &CraneInstance) -> Result<Self> {
        instance.validate()?;

        let n_g = instance.cranes as usize;
        let n_b = instance.block_ids.len();
        let n_t = instance.periods as usize;

        tracing::debug!(
            "建立吊機模型（{} 班次 {}）：{} 台吊機 × {} 個區塊 × {} 個子時段",
            instance.week,
            instance.shift,
            n_g,
            n_b,
            n_t
        );

        let mut model = Model::new(format!("crane-{}-{}", instance.week, instance.shift));
        let gbt = |g: usize, b: usize, t: usize| {
            format!("g{},{},t{}", g + 1, instance.block_ids[b], t + 1)
        };
        let vars = CraneVars {
            active: model.add_var_block("active", [n_g, n_b, n_t], Domain::Binary, gbt),
            alpha: model.add_var_block("alpha", [n_g, n_b, n_t], Domain::Binary, gbt),
            occupies: model.add_var_block("occupies", [n_g, n_b, 1], Domain::Binary, |g, b, _| {
                format!("g{},{}", g + 1, instance.block_ids[b])
            }),
            max_diff: model.add_var("max_diff".to_string(), Domain::NonNegativeReal),
        };

        let builder = FamilyBuilder {
            instance,
            vars: &vars,
        };
        for family in builder.families() {
            model.add_family(family);
        }
        model.set_objective(LinearExpr::var(vars.max_diff));
        model.validate()?;

        Ok(Self { model, vars })
    }
}

struct FamilyBuilder<'a> {
    instance: &'a CraneInstance,
    vars: &'a CraneVars,
}

impl<'a> FamilyBuilder<'a> {
    fn bt(&self) -> impl Iterator<Item = (BlockIdx, Period)> + 'a {
        let inst = self.instance;
        inst.block_indices()
            .flat_map(move |b| inst.period_range().map(move |t| (b, t)))
    }

    fn gt(&self) -> impl Iterator<Item = (CraneIdx, Period)> + 'a {
        let inst = self.instance;
        inst.crane_indices()
            .flat_map(move |g| inst.period_range().map(move |t| (g, t)))
    }

    fn gb(&self) -> impl Iterator<Item = (CraneIdx, BlockIdx)> + 'a {
        let inst = self.instance;
        inst.crane_indices()
            .flat_map(move |g| inst.block_indices().map(move |b| (g, b)))
    }

    fn gbt(&self) -> impl Iterator<Item = (CraneIdx, BlockIdx, Period)> + 'a {
        let inst = self.instance;
        self.gb()
            .flat_map(move |(g, b)| inst.period_range().map(move |t| (g, b, t)))
    }

    fn block(&self, b: BlockIdx) -> &str {
        &self.instance.block_ids[b.0]
    }

    fn bt_label(&self, (b, t): &(BlockIdx, Period)) -> String {
        format!("{},{}", self.block(*b), t)
    }

    fn gb_label(&self, (g, b): &(CraneIdx, BlockIdx)) -> String {
        format!("g{},{}", g.0 + 1, self.block(*b))
    }

    fn gbt_label(&self, (g, b, t): &(CraneIdx, BlockIdx, Period)) -> String {
        format!("g{},{},{}", g.0 + 1, self.block(*b), t)
    }

    fn cranes_on(&self, b: BlockIdx, t: Period) -> LinearExpr {
        LinearExpr::sum(
            self.instance
                .crane_indices()
                .map(|g| self.vars.active(g, b, t)),
        )
    }

    fn last_period(&self) -> u32 {
        self.instance.periods
    }

    fn families(&self) -> Vec<ConstraintFamily> {
        vec![
            self.overprovision_gap(),
            self.coverage(),
            self.one_block_per_crane(),
            self.fleet_ceiling(),
            self.collision_ceiling(),
            self.occupation_lower(),
            self.occupation_upper(),
            self.exclusivity(),
            self.min_duration(),
            self.min_duration_tail(),
            self.activation_overlap(),
            self.activation_link(),
            self.activation_start(),
        ]
    }

    /// mu·Σ_g active − V ≤ max_diff
    fn overprovision_gap(&self) -> ConstraintFamily {
        let mu = f64::from(self.instance.service_rate);
        ConstraintFamily::build(
            "overprovision_gap",
            self.bt(),
            |idx| self.bt_label(idx),
            |(b, t)| {
                let volume = f64::from(self.instance.volume(*b, *t));
                Some(Row::le(
                    LinearExpr::new()
                        .plus_expr(mu, &self.cranes_on(*b, *t))
                        .plus_constant(-volume),
                    LinearExpr::var(self.vars.max_diff),
                ))
            },
        )
    }

    /// V ≤ mu·Σ_g active
    fn coverage(&self) -> ConstraintFamily {
        let mu = f64::from(self.instance.service_rate);
        ConstraintFamily::build(
            "coverage",
            self.bt(),
            |idx| self.bt_label(idx),
            |(b, t)| {
                let volume = f64::from(self.instance.volume(*b, *t));
                Some(Row::ge(
                    LinearExpr::new().plus_expr(mu, &self.cranes_on(*b, *t)),
                    LinearExpr::constant(volume),
                ))
            },
        )
    }

    fn one_block_per_crane(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "one_block_per_crane",
            self.gt(),
            |(g, t)| format!("g{},{}", g.0 + 1, t),
            |(g, t)| {
                Some(Row::le(
                    LinearExpr::sum(
                        self.instance
                            .block_indices()
                            .map(|b| self.vars.active(*g, b, *t)),
                    ),
                    LinearExpr::constant(1.0),
                ))
            },
        )
    }

    fn fleet_ceiling(&self) -> ConstraintFamily {
        let rmax = f64::from(self.instance.fleet_ceiling);
        ConstraintFamily::build(
            "fleet_ceiling",
            self.instance.period_range(),
            |t| t.to_string(),
            |t| {
                let all = self.gb().map(|(g, b)| self.vars.active(g, b, *t));
                Some(Row::le(LinearExpr::sum(all), LinearExpr::constant(rmax)))
            },
        )
    }

    fn collision_ceiling(&self) -> ConstraintFamily {
        let w = f64::from(self.instance.collision_ceiling);
        ConstraintFamily::build(
            "collision_ceiling",
            self.bt(),
            |idx| self.bt_label(idx),
            |(b, t)| Some(Row::le(self.cranes_on(*b, *t), LinearExpr::constant(w))),
        )
    }

    fn active_total(&self, g: CraneIdx, b: BlockIdx) -> LinearExpr {
        LinearExpr::sum(
            self.instance
                .period_range()
                .map(|t| self.vars.active(g, b, t)),
        )
    }

    /// Z ≤ Σ_t active
    fn occupation_lower(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "occupation_lower",
            self.gb(),
            |idx| self.gb_label(idx),
            |(g, b)| {
                Some(Row::le(
                    LinearExpr::var(self.vars.occupies(*g, *b)),
                    self.active_total(*g, *b),
                ))
            },
        )
    }

    /// Σ_t active ≤ |T|·Z
    fn occupation_upper(&self) -> ConstraintFamily {
        let horizon = f64::from(self.last_period());
        ConstraintFamily::build(
            "occupation_upper",
            self.gb(),
            |idx| self.gb_label(idx),
            |(g, b)| {
                Some(Row::le(
                    self.active_total(*g, *b),
                    LinearExpr::new().plus(horizon, self.vars.occupies(*g, *b)),
                ))
            },
        )
    }

    /// Z[g,b1] + Z[g,b2] ≤ 1，只對排他的區塊對產生
    fn exclusivity(&self) -> ConstraintFamily {
        let inst = self.instance;
        let indices = inst.crane_indices().flat_map(move |g| {
            inst.exclusivity
                .excluded_pairs()
                .map(move |(b1, b2)| (g, b1, b2))
        });
        ConstraintFamily::build(
            "exclusivity",
            indices,
            |(g, b1, b2)| format!("g{},{},{}", g.0 + 1, self.block(*b1), self.block(*b2)),
            |(g, b1, b2)| {
                let allowance = f64::from(inst.exclusivity.allowance(*b1, *b2));
                Some(Row::le(
                    LinearExpr::var(self.vars.occupies(*g, *b1))
                        .plus(1.0, self.vars.occupies(*g, *b2)),
                    LinearExpr::constant(allowance),
                ))
            },
        )
    }

    /// K·alpha[t] ≤ Σ_{r=t}^{t+K−1} active[r]，t ≤ |T| − K + 1
    fn min_duration(&self) -> ConstraintFamily {
        let k = self.instance.min_duration;
        let last = self.last_period();
        ConstraintFamily::build(
            "min_duration",
            self.gbt(),
            |idx| self.gbt_label(idx),
            |(g, b, t)| {
                if t.0 + k > last + 1 {
                    return None;
                }
                let window = (t.0..t.0 + k).map(|r| self.vars.active(*g, *b, Period(r)));
                Some(Row::le(
                    LinearExpr::new().plus(f64::from(k), self.vars.alpha(*g, *b, *t)),
                    LinearExpr::sum(window),
                ))
            },
        )
    }

    /// (|T|−t+1)·alpha[t] ≤ Σ_{r≥t} active[r]，t > |T| − K + 1
    fn min_duration_tail(&self) -> ConstraintFamily {
        let k = self.instance.min_duration;
        let last = self.last_period();
        ConstraintFamily::build(
            "min_duration_tail",
            self.gbt(),
            |idx| self.gbt_label(idx),
            |(g, b, t)| {
                if t.0 + k <= last + 1 {
                    return None;
                }
                let remaining = last - t.0 + 1;
                let rest = (t.0..=last).map(|r| self.vars.active(*g, *b, Period(r)));
                Some(Row::le(
                    LinearExpr::new().plus(f64::from(remaining), self.vars.alpha(*g, *b, *t)),
                    LinearExpr::sum(rest),
                ))
            },
        )
    }

    /// alpha[t] + alpha[r] ≤ 1，t < r < t + K
    fn activation_overlap(&self) -> ConstraintFamily {
        let k = self.instance.min_duration;
        let last = self.last_period();
        let indices = self.gbt().flat_map(move |(g, b, t)| {
            ((t.0 + 1)..(t.0 + k).min(last + 1)).map(move |r| (g, b, t, Period(r)))
        });
        ConstraintFamily::build(
            "activation_overlap",
            indices,
            |(g, b, t, r)| format!("{},{}", self.gbt_label(&(*g, *b, *t)), r),
            |(g, b, t, r)| {
                Some(Row::le(
                    LinearExpr::var(self.vars.alpha(*g, *b, *t))
                        .plus(1.0, self.vars.alpha(*g, *b, *r)),
                    LinearExpr::constant(1.0),
                ))
            },
        )
    }

    /// active[t] ≤ active[t−1] + alpha[t]
    fn activation_link(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "activation_link",
            self.gbt(),
            |idx| self.gbt_label(idx),
            |(g, b, t)| {
                let prev = t.previous()?;
                Some(Row::le(
                    LinearExpr::var(self.vars.active(*g, *b, *t)),
                    LinearExpr::var(self.vars.active(*g, *b, prev))
                        .plus(1.0, self.vars.alpha(*g, *b, *t)),
                ))
            },
        )
    }

    /// active[1] ≤ alpha[1]
    fn activation_start(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "activation_start",
            self.gb(),
            |idx| self.gb_label(idx),
            |(g, b)| {
                Some(Row::le(
                    LinearExpr::var(self.vars.active(*g, *b, Period::FIRST)),
                    LinearExpr::var(self.vars.alpha(*g, *b, Period::FIRST)),
                ))
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use yard_core::{CraneSettings, ExclusivitySpec};

    fn instance(cranes: u32, periods: u32, k: u32) -> CraneInstance {
        let settings = CraneSettings::default()
            .with_cranes(cranes)
            .with_min_duration(k)
            .with_exclusivity(ExclusivitySpec::Excluding(vec![(
                "b1".to_string(),
                "b2".to_string(),
            )]));
        let ids = vec!["b1".to_string(), "b2".to_string(), "b3".to_string()];
        let mut inst = CraneInstance::new(
            NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(),
            Period(1),
            ids,
            periods,
            &settings,
        )
        .unwrap();
        inst.required_volume.set((BlockIdx(0), Period(1)), 45);
        inst
    }

    #[test]
    fn test_family_sizes() {
        let f = CraneFormulation::build(&instance(2, 4, 2)).unwrap();
        let m = &f.model;
        assert_eq!(m.family("coverage").unwrap().len(), 12);
        assert_eq!(m.family("one_block_per_crane").unwrap().len(), 8);
        assert_eq!(m.family("fleet_ceiling").unwrap().len(), 4);
        // 只有 (b1,b2) 排他
        assert_eq!(m.family("exclusivity").unwrap().len(), 2);
        // t = 1..3 一般、t = 4 尾段
        assert_eq!(m.family("min_duration").unwrap().len(), 2 * 3 * 3);
        assert_eq!(m.family("min_duration_tail").unwrap().len(), 2 * 3);
        // 每個 t < 4 有一個 r = t + 1
        assert_eq!(m.family("activation_overlap").unwrap().len(), 2 * 3 * 3);
        assert_eq!(m.family("activation_link").unwrap().len(), 2 * 3 * 3);
        assert_eq!(m.family("activation_start").unwrap().len(), 6);
    }

    #[test]
    fn test_coverage_row() {
        let f = CraneFormulation::build(&instance(2, 4, 2)).unwrap();
        let row = &f.model.family("coverage").unwrap().constraints[0];
        assert_eq!(row.label, "coverage[b1,t1]");
        assert_eq!(row.row.rhs, 45.0);
        assert_eq!(row.row.lhs.terms().len(), 2);
        assert!(row.row.lhs.terms().iter().all(|(_, c)| *c == 30.0));
    }

    #[test]
    fn test_tail_window_with_long_duration() {
        // K = 3，4 個子時段：t = 1,2 一般，t = 3,4 尾段
        let f = CraneFormulation::build(&instance(1, 4, 3)).unwrap();
        let m = &f.model;
        assert_eq!(m.family("min_duration").unwrap().len(), 3 * 2);
        assert_eq!(m.family("min_duration_tail").unwrap().len(), 3 * 2);
        let tail = m
            .family("min_duration_tail")
            .unwrap()
            .constraints
            .iter()
            .find(|c| c.label == "min_duration_tail[g1,b1,t3]")
            .unwrap();
        // 2·alpha − active[3] − active[4] ≤ 0
        assert_eq!(tail.row.lhs.terms().len(), 3);
        assert_eq!(tail.row.rhs, 0.0);
    }

    #[test]
    fn test_objective_is_max_diff() {
        let f = CraneFormulation::build(&instance(1, 2, 2)).unwrap();
        assert_eq!(f.model.objective().terms(), &[(f.vars.max_diff, 1.0)]);
    }
}
