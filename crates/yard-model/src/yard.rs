//! 堆場分配模型
//!
//! 把分隔群組分配到區塊的多時段整數模型。流量、庫存與佔用槽位以
//! (s,b,t) 為索引；區塊使用數以 s 為索引；工作量以 (b,t) 為索引。

use crate::model::{ConstraintFamily, Domain, LinearExpr, Model, Row, VarBlock, VarId};
use crate::{ModelError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use yard_core::{BlockIdx, FlowKind, Period, SegIdx, YardInstance, YardSettings};

/// 堆場模型的變數
#[derive(Debug, Clone, Copy)]
pub struct YardVars {
    pub receive: VarBlock,
    pub load: VarBlock,
    pub discharge: VarBlock,
    pub deliver: VarBlock,
    pub inventory: VarBlock,
    pub occupied_slots: VarBlock,
    pub assigned: VarBlock,
    pub used: VarBlock,
    pub block_count: VarBlock,
    pub workload: VarBlock,
    pub peak: VarBlock,
    pub trough: VarBlock,
}

impl YardVars {
    pub fn flow(&self, kind: FlowKind, s: SegIdx, b: BlockIdx, t: Period) -> VarId {
        let block = match kind {
            FlowKind::Receive => &self.receive,
            FlowKind::Load => &self.load,
            FlowKind::Discharge => &self.discharge,
            FlowKind::Deliver => &self.deliver,
        };
        block.at3(s.0, b.0, t.offset())
    }

    pub fn inventory(&self, s: SegIdx, b: BlockIdx, t: Period) -> VarId {
        self.inventory.at3(s.0, b.0, t.offset())
    }

    pub fn occupied_slots(&self, s: SegIdx, b: BlockIdx, t: Period) -> VarId {
        self.occupied_slots.at3(s.0, b.0, t.offset())
    }

    pub fn assigned(&self, s: SegIdx, b: BlockIdx, t: Period) -> VarId {
        self.assigned.at3(s.0, b.0, t.offset())
    }

    pub fn used(&self, s: SegIdx, b: BlockIdx) -> VarId {
        self.used.at2(s.0, b.0)
    }

    pub fn block_count(&self, s: SegIdx) -> VarId {
        self.block_count.at1(s.0)
    }

    pub fn workload(&self, b: BlockIdx, t: Period) -> VarId {
        self.workload.at2(b.0, t.offset())
    }

    pub fn peak(&self, t: Period) -> VarId {
        self.peak.at1(t.offset())
    }

    pub fn trough(&self, t: Period) -> VarId {
        self.trough.at1(t.offset())
    }
}

/// 組好的堆場模型
#[derive(Debug, Clone)]
pub struct YardFormulation {
    pub model: Model,
    pub vars: YardVars,
}

impl YardFormulation {
    /// 依週實例與參數建立模型
    pub fn build(instance: &YardInstance, settings: &YardSettings) -> Result<Self> {
        instance.validate()?;

        let n_s = instance.segregations.len();
        let n_b = instance.blocks.len();
        let n_t = instance.periods as usize;

        tracing::debug!(
            "建立堆場模型：{} 個分隔群組 × {} 個區塊 × {} 個時段",
            n_s,
            n_b,
            n_t
        );

        let mut model = Model::new(format!("yard-{}", instance.week));

        let seg_id = |s: usize| instance.segregations[s].id.as_str();
        let block_id = |b: usize| instance.blocks[b].id.as_str();
        let sbt = |s: usize, b: usize, t: usize| {
            format!("{},{},t{}", seg_id(s), block_id(b), t + 1)
        };

        let int = Domain::NonNegativeInteger;
        let vars = YardVars {
            receive: model.add_var_block("receive", [n_s, n_b, n_t], int, sbt),
            load: model.add_var_block("load", [n_s, n_b, n_t], int, sbt),
            discharge: model.add_var_block("discharge", [n_s, n_b, n_t], int, sbt),
            deliver: model.add_var_block("deliver", [n_s, n_b, n_t], int, sbt),
            inventory: model.add_var_block("inventory", [n_s, n_b, n_t], int, sbt),
            occupied_slots: model.add_var_block("occupied_slots", [n_s, n_b, n_t], int, sbt),
            assigned: model.add_var_block("assigned", [n_s, n_b, n_t], Domain::Binary, sbt),
            used: model.add_var_block("used", [n_s, n_b, 1], Domain::Binary, |s, b, _| {
                format!("{},{}", seg_id(s), block_id(b))
            }),
            block_count: model.add_var_block("block_count", [n_s, 1, 1], int, |s, _, _| {
                seg_id(s).to_string()
            }),
            workload: model.add_var_block("workload", [n_b, n_t, 1], int, |b, t, _| {
                format!("{},t{}", block_id(b), t + 1)
            }),
            peak: model.add_var_block("peak", [n_t, 1, 1], int, |t, _, _| format!("t{}", t + 1)),
            trough: model.add_var_block("trough", [n_t, 1, 1], int, |t, _, _| {
                format!("t{}", t + 1)
            }),
        };

        let builder = FamilyBuilder {
            instance,
            settings,
            vars: &vars,
        };
        for family in builder.families() {
            model.add_family(family);
        }
        model.set_objective(builder.objective()?);
        model.validate()?;

        tracing::debug!(
            "堆場模型完成：{} 個變數，{} 條約束",
            model.variables().len(),
            model.constraint_count()
        );

        Ok(Self { model, vars })
    }
}

struct FamilyBuilder<'a> {
    instance: &'a YardInstance,
    settings: &'a YardSettings,
    vars: &'a YardVars,
}

impl<'a> FamilyBuilder<'a> {
    fn sbt(&self) -> impl Iterator<Item = (SegIdx, BlockIdx, Period)> + 'a {
        let inst = self.instance;
        inst.segregation_indices().flat_map(move |s| {
            inst.block_indices()
                .flat_map(move |b| inst.period_range().map(move |t| (s, b, t)))
        })
    }

    fn sb(&self) -> impl Iterator<Item = (SegIdx, BlockIdx)> + 'a {
        let inst = self.instance;
        inst.segregation_indices()
            .flat_map(move |s| inst.block_indices().map(move |b| (s, b)))
    }

    fn st(&self) -> impl Iterator<Item = (SegIdx, Period)> + 'a {
        let inst = self.instance;
        inst.segregation_indices()
            .flat_map(move |s| inst.period_range().map(move |t| (s, t)))
    }

    fn bt(&self) -> impl Iterator<Item = (BlockIdx, Period)> + 'a {
        let inst = self.instance;
        inst.block_indices()
            .flat_map(move |b| inst.period_range().map(move |t| (b, t)))
    }

    fn sbt_label(&self, (s, b, t): &(SegIdx, BlockIdx, Period)) -> String {
        format!(
            "{},{},{}",
            self.instance.segregation(*s).id,
            self.instance.block(*b).id,
            t
        )
    }

    fn sb_label(&self, (s, b): &(SegIdx, BlockIdx)) -> String {
        format!(
            "{},{}",
            self.instance.segregation(*s).id,
            self.instance.block(*b).id
        )
    }

    fn st_label(&self, (s, t): &(SegIdx, Period)) -> String {
        format!("{},{}", self.instance.segregation(*s).id, t)
    }

    fn bt_label(&self, (b, t): &(BlockIdx, Period)) -> String {
        format!("{},{}", self.instance.block(*b).id, t)
    }

    fn inbound(&self, s: SegIdx, b: BlockIdx, t: Period) -> LinearExpr {
        LinearExpr::var(self.vars.flow(FlowKind::Receive, s, b, t))
            .plus(1.0, self.vars.flow(FlowKind::Discharge, s, b, t))
    }

    fn families(&self) -> Vec<ConstraintFamily> {
        let mut families = vec![self.flow_domain()];
        families.extend(FlowKind::ALL.iter().map(|k| self.demand(*k)));
        families.extend([
            self.inventory_balance(),
            self.inventory_capacity(),
            self.occupancy_threshold(),
            self.assignment_upper(),
            self.assignment_lower(),
            self.block_usage_upper(),
            self.block_usage_lower(),
            self.block_count_def(),
            self.block_count_bounds(),
            self.slot_capacity(),
            self.reach_capacity(),
            self.workload_def(),
            self.workload_peak(),
            self.workload_trough(),
            self.workload_spread(),
        ]);
        families
    }

    /// 方向不符或區塊不接受時流量固定為零
    fn flow_domain(&self) -> ConstraintFamily {
        let indices = self
            .sbt()
            .flat_map(|(s, b, t)| FlowKind::ALL.into_iter().map(move |k| (s, b, t, k)));
        ConstraintFamily::build(
            "flow_domain",
            indices,
            |(s, b, t, k)| format!("{},{}", self.sbt_label(&(*s, *b, *t)), k.name()),
            |(s, b, t, k)| {
                (!self.instance.flow_allowed(*k, *s, *b)).then(|| {
                    Row::equals(
                        LinearExpr::var(self.vars.flow(*k, *s, *b, *t)),
                        LinearExpr::constant(0.0),
                    )
                })
            },
        )
    }

    /// 各區塊流量總和等於需求
    fn demand(&self, kind: FlowKind) -> ConstraintFamily {
        let name = format!("demand_{}", kind.name());
        ConstraintFamily::build(
            &name,
            self.st(),
            |st| self.st_label(st),
            |(s, t)| {
                let total = LinearExpr::sum(
                    self.instance
                        .block_indices()
                        .map(|b| self.vars.flow(kind, *s, b, *t)),
                );
                let demand = self.instance.demand_at(*s, *t).get(kind);
                Some(Row::equals(total, LinearExpr::constant(f64::from(demand))))
            },
        )
    }

    fn inventory_balance(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "inventory_balance",
            self.sbt(),
            |idx| self.sbt_label(idx),
            |(s, b, t)| {
                let v = self.vars;
                let previous = match t.previous() {
                    Some(prev) => LinearExpr::var(v.inventory(*s, *b, prev)),
                    None => LinearExpr::constant(f64::from(
                        self.instance.initial_inventory.get((*s, *b)),
                    )),
                };
                let rhs = previous
                    .plus(1.0, v.flow(FlowKind::Receive, *s, *b, *t))
                    .plus(1.0, v.flow(FlowKind::Discharge, *s, *b, *t))
                    .plus(-1.0, v.flow(FlowKind::Load, *s, *b, *t))
                    .plus(-1.0, v.flow(FlowKind::Deliver, *s, *b, *t));
                Some(Row::equals(LinearExpr::var(v.inventory(*s, *b, *t)), rhs))
            },
        )
    }

    /// inventory ≤ OS·C·occupied_slots
    fn inventory_capacity(&self) -> ConstraintFamily {
        let os = self.settings.occupancy_scale;
        ConstraintFamily::build(
            "inventory_capacity",
            self.sbt(),
            |idx| self.sbt_label(idx),
            |(s, b, t)| {
                let c = f64::from(self.instance.block(*b).slot_capacity);
                Some(Row::le(
                    LinearExpr::var(self.vars.inventory(*s, *b, *t)),
                    LinearExpr::new().plus(os * c, self.vars.occupied_slots(*s, *b, *t)),
                ))
            },
        )
    }

    /// (occupied_slots − 1)·C·OS + C·OI ≤ inventory
    fn occupancy_threshold(&self) -> ConstraintFamily {
        let os = self.settings.occupancy_scale;
        let oi = self.settings.min_occupancy;
        ConstraintFamily::build(
            "occupancy_threshold",
            self.sbt(),
            |idx| self.sbt_label(idx),
            |(s, b, t)| {
                let c = f64::from(self.instance.block(*b).slot_capacity);
                Some(Row::le(
                    LinearExpr::new()
                        .plus(c * os, self.vars.occupied_slots(*s, *b, *t))
                        .plus_constant(c * oi - c * os),
                    LinearExpr::var(self.vars.inventory(*s, *b, *t)),
                ))
            },
        )
    }

    /// receive + discharge ≤ (DR + DD)·assigned
    fn assignment_upper(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "assignment_upper",
            self.sbt(),
            |idx| self.sbt_label(idx),
            |(s, b, t)| {
                let big_m = f64::from(self.instance.demand_at(*s, *t).inbound());
                Some(Row::le(
                    self.inbound(*s, *b, *t),
                    LinearExpr::new().plus(big_m, self.vars.assigned(*s, *b, *t)),
                ))
            },
        )
    }

    /// receive + discharge ≥ assigned
    fn assignment_lower(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "assignment_lower",
            self.sbt(),
            |idx| self.sbt_label(idx),
            |(s, b, t)| {
                Some(Row::ge(
                    self.inbound(*s, *b, *t),
                    LinearExpr::var(self.vars.assigned(*s, *b, *t)),
                ))
            },
        )
    }

    /// used ≤ Σ_t assigned
    fn block_usage_upper(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "block_usage_upper",
            self.sb(),
            |idx| self.sb_label(idx),
            |(s, b)| {
                Some(Row::le(
                    LinearExpr::var(self.vars.used(*s, *b)),
                    LinearExpr::sum(
                        self.instance
                            .period_range()
                            .map(|t| self.vars.assigned(*s, *b, t)),
                    ),
                ))
            },
        )
    }

    /// used ≥ assigned
    fn block_usage_lower(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "block_usage_lower",
            self.sbt(),
            |idx| self.sbt_label(idx),
            |(s, b, t)| {
                Some(Row::ge(
                    LinearExpr::var(self.vars.used(*s, *b)),
                    LinearExpr::var(self.vars.assigned(*s, *b, *t)),
                ))
            },
        )
    }

    fn block_count_def(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "block_count_def",
            self.instance.segregation_indices(),
            |s| self.instance.segregation(*s).id.clone(),
            |s| {
                Some(Row::equals(
                    LinearExpr::var(self.vars.block_count(*s)),
                    LinearExpr::sum(self.instance.block_indices().map(|b| self.vars.used(*s, b))),
                ))
            },
        )
    }

    /// 整週沒有進場需求時 k = 0，否則 KI ≤ k ≤ KS
    fn block_count_bounds(&self) -> ConstraintFamily {
        let indices = self
            .instance
            .segregation_indices()
            .flat_map(|s| [(s, "min"), (s, "max")]);
        ConstraintFamily::build(
            "block_count_bounds",
            indices,
            |(s, side)| format!("{},{}", self.instance.segregation(*s).id, side),
            |(s, side)| {
                let seg = self.instance.segregation(*s);
                let k = LinearExpr::var(self.vars.block_count(*s));
                if self.instance.weekly_inbound(*s) == 0 {
                    return (*side == "max").then(|| Row::equals(k, LinearExpr::constant(0.0)));
                }
                Some(if *side == "min" {
                    Row::ge(k, LinearExpr::constant(f64::from(seg.min_blocks)))
                } else {
                    Row::le(k, LinearExpr::constant(f64::from(seg.max_blocks)))
                })
            },
        )
    }

    /// Σ_s TEU·occupied_slots ≤ VS
    fn slot_capacity(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "slot_capacity",
            self.bt(),
            |idx| self.bt_label(idx),
            |(b, t)| {
                let mut lhs = LinearExpr::new();
                for s in self.instance.segregation_indices() {
                    let teu = f64::from(self.instance.segregation(s).teu);
                    lhs.add_term(teu, self.vars.occupied_slots(s, *b, *t));
                }
                let vs = f64::from(self.instance.block(*b).teu_slots);
                Some(Row::le(lhs, LinearExpr::constant(vs)))
            },
        )
    }

    /// Σ_s TEU·R·occupied_slots ≤ VSR
    fn reach_capacity(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "reach_capacity",
            self.bt(),
            |idx| self.bt_label(idx),
            |(b, t)| {
                let mut lhs = LinearExpr::new();
                for s in self.instance.segregation_indices() {
                    let seg = self.instance.segregation(s);
                    let coef = f64::from(seg.teu) * f64::from(seg.reach_factor);
                    lhs.add_term(coef, self.vars.occupied_slots(s, *b, *t));
                }
                let vsr = f64::from(self.instance.block(*b).reach_capacity);
                Some(Row::le(lhs, LinearExpr::constant(vsr)))
            },
        )
    }

    fn workload_def(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "workload_def",
            self.bt(),
            |idx| self.bt_label(idx),
            |(b, t)| {
                let flows = self.instance.segregation_indices().flat_map(|s| {
                    FlowKind::ALL
                        .into_iter()
                        .map(move |k| self.vars.flow(k, s, *b, *t))
                });
                Some(Row::equals(
                    LinearExpr::var(self.vars.workload(*b, *t)),
                    LinearExpr::sum(flows),
                ))
            },
        )
    }

    fn workload_peak(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "workload_peak",
            self.bt(),
            |idx| self.bt_label(idx),
            |(b, t)| {
                Some(Row::ge(
                    LinearExpr::var(self.vars.peak(*t)),
                    LinearExpr::var(self.vars.workload(*b, *t)),
                ))
            },
        )
    }

    fn workload_trough(&self) -> ConstraintFamily {
        ConstraintFamily::build(
            "workload_trough",
            self.bt(),
            |idx| self.bt_label(idx),
            |(b, t)| {
                Some(Row::le(
                    LinearExpr::var(self.vars.trough(*t)),
                    LinearExpr::var(self.vars.workload(*b, *t)),
                ))
            },
        )
    }

    /// peak − trough ≤ r
    fn workload_spread(&self) -> ConstraintFamily {
        let r = f64::from(self.settings.spread_tolerance);
        ConstraintFamily::build(
            "workload_spread",
            self.instance.period_range(),
            |t| t.to_string(),
            |t| {
                Some(Row::le(
                    LinearExpr::var(self.vars.peak(*t)).plus(-1.0, self.vars.trough(*t)),
                    LinearExpr::constant(r),
                ))
            },
        )
    }

    /// w_load·Σ load·LC[s,b] + w_deliver·Σ deliver·LE[b]
    fn objective(&self) -> Result<LinearExpr> {
        let mut objective = LinearExpr::new();
        for (s, b, t) in self.sbt() {
            let lc = to_coefficient(self.instance.load_cost.get((s, b)), "load_cost")?;
            let le = to_coefficient(self.instance.block(b).deliver_cost, "deliver_cost")?;
            objective.add_term(
                self.settings.load_weight * lc,
                self.vars.flow(FlowKind::Load, s, b, t),
            );
            objective.add_term(
                self.settings.deliver_weight * le,
                self.vars.flow(FlowKind::Deliver, s, b, t),
            );
        }
        Ok(objective)
    }
}

fn to_coefficient(value: Decimal, name: &str) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| ModelError::NonFiniteCoefficient(format!("{} = {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Relation, VarValues};
    use chrono::NaiveDate;
    use yard_core::{Block, Direction, PeriodDemand, Segregation};

    fn instance() -> YardInstance {
        let mut inst = YardInstance::new(NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(), 2);
        inst.add_block(Block::new("b1".to_string(), 10, 20, 40).with_deliver_cost(Decimal::from(7)));
        inst.add_block(Block::new("b2".to_string(), 10, 20, 40).export_only());
        let s1 = inst.add_segregation(
            Segregation::new("s1".to_string(), Direction::Export).with_block_spread(1, 2),
        );
        let s2 = inst.add_segregation(Segregation::new("s2".to_string(), Direction::Import));
        inst.demand.set((s1, Period(1)), PeriodDemand::new(4, 0, 0, 0));
        inst.demand.set((s1, Period(2)), PeriodDemand::new(0, 2, 0, 0));
        inst.demand.set((s2, Period(1)), PeriodDemand::new(0, 0, 3, 0));
        inst.initial_inventory.set((s2, BlockIdx(0)), 2);
        inst.load_cost.set((s1, BlockIdx(1)), Decimal::from(5));
        inst
    }

    fn build() -> YardFormulation {
        YardFormulation::build(&instance(), &YardSettings::default()).unwrap()
    }

    #[test]
    fn test_family_names_and_sizes() {
        let f = build();
        let model = &f.model;
        // 2 seg × 2 block × 2 period
        assert_eq!(model.family("inventory_balance").unwrap().len(), 8);
        assert_eq!(model.family("demand_receive").unwrap().len(), 4);
        assert_eq!(model.family("slot_capacity").unwrap().len(), 4);
        assert_eq!(model.family("workload_spread").unwrap().len(), 2);
        assert_eq!(model.families().len(), 20);
    }

    #[test]
    fn test_flow_domain_fixes_ineligible_flows() {
        let f = build();
        let family = f.model.family("flow_domain").unwrap();
        // s1 出口：每個 (b,t) 固定 discharge/deliver → 8 條
        // s2 進口：每個 (b,t) 固定 receive/load → 8 條，b2 只收出口再加 discharge/deliver → 4 條
        assert_eq!(family.len(), 20);
        assert!(family
            .constraints
            .iter()
            .any(|c| c.label == "flow_domain[s2,b2,t1,discharge]"));
    }

    #[test]
    fn test_inventory_balance_uses_initial_stock() {
        let f = build();
        let c = &f.model.family("inventory_balance").unwrap().constraints;
        let first = c
            .iter()
            .find(|c| c.label == "inventory_balance[s2,b1,t1]")
            .unwrap();
        assert_eq!(first.row.relation, Relation::Eq);
        // inventory - discharge - receive + load + deliver = 2
        assert_eq!(first.row.rhs, 2.0);
    }

    #[test]
    fn test_block_count_bounds_for_idle_segregation() {
        let mut inst = instance();
        // s2 沒有任何進場需求
        inst.demand.set((SegIdx(1), Period(1)), PeriodDemand::default());
        let f = YardFormulation::build(&inst, &YardSettings::default()).unwrap();
        let bounds = f.model.family("block_count_bounds").unwrap();
        let labels: Vec<_> = bounds.constraints.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "block_count_bounds[s1,min]",
                "block_count_bounds[s1,max]",
                "block_count_bounds[s2,max]",
            ]
        );
        assert_eq!(bounds.constraints[2].row.relation, Relation::Eq);
    }

    #[test]
    fn test_occupancy_threshold_zero_inventory_forces_zero_slots() {
        let f = build();
        let row = &f
            .model
            .family("occupancy_threshold")
            .unwrap()
            .constraints[0]
            .row;
        // 10·v − i ≤ 10 − 10·OI；inventory = 0 時 v = 1 不成立
        let mut values = vec![0.0; f.model.variables().len()];
        values[f.vars.occupied_slots(SegIdx(0), BlockIdx(0), Period(1)).0] = 1.0;
        assert!(!row.is_satisfied(&VarValues::new(values.clone()), 1e-9));
        values[f.vars.inventory(SegIdx(0), BlockIdx(0), Period(1)).0] = 1.0;
        assert!(row.is_satisfied(&VarValues::new(values), 1e-9));
    }

    #[test]
    fn test_objective_weights_costs() {
        let f = build();
        let objective = f.model.objective();
        let load = f.vars.flow(FlowKind::Load, SegIdx(0), BlockIdx(1), Period(2));
        let deliver = f.vars.flow(FlowKind::Deliver, SegIdx(1), BlockIdx(0), Period(1));
        assert!(objective.terms().contains(&(load, 5.0)));
        assert!(objective.terms().contains(&(deliver, 7.0)));
        // b2 提櫃成本為 0，不出現在目標
        let free = f.vars.flow(FlowKind::Deliver, SegIdx(1), BlockIdx(1), Period(1));
        assert!(!objective.terms().iter().any(|(v, _)| *v == free));
    }

    #[test]
    fn test_invalid_instance_rejected() {
        let mut inst = instance();
        inst.periods = 0;
        assert!(YardFormulation::build(&inst, &YardSettings::default()).is_err());
    }
}
