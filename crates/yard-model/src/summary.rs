//! 結果彙總
//!
//! 距離以 `Decimal` 累計；移動量為整數。

use crate::plan::{CranePlan, YardPlan};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use yard_core::{CraneInstance, Direction, FlowKind, Period, SegIdx, YardInstance};

/// 週彙總
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub week: NaiveDate,
    pub total_distance: Decimal,
    pub load_distance: Decimal,
    pub deliver_distance: Decimal,
    pub load_moves: u64,
    pub deliver_moves: u64,
    pub proven_optimal: bool,
}

/// 分隔群組彙總
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegregationSummary {
    pub segregation: String,
    pub direction: Direction,
    pub blocks_used: u32,
    pub load_distance: Decimal,
    pub deliver_distance: Decimal,
    pub load_moves: u64,
    pub deliver_moves: u64,
}

/// (分隔群組, 區塊) 的整週移動明細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDetail {
    pub segregation: String,
    pub block: String,
    pub receive: u64,
    pub load: u64,
    pub discharge: u64,
    pub deliver: u64,
    /// 整週最高庫存
    pub peak_inventory: u32,
    /// 佔用槽位的累計增加量（只計正向變化）
    pub slot_increase: u32,
}

/// 區塊在單一時段的工作量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWorkload {
    pub block: String,
    pub period: u32,
    pub workload: u32,
    /// 所有分隔群組在區塊內的貨櫃數
    pub containers: u32,
}

/// 單一時段的工作量峰谷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSpread {
    pub period: u32,
    pub peak: u32,
    pub trough: u32,
}

/// 堆場週報告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YardReport {
    pub summary: WeekSummary,
    pub segregations: Vec<SegregationSummary>,
    pub movements: Vec<MovementDetail>,
    pub workloads: Vec<BlockWorkload>,
    pub spreads: Vec<PeriodSpread>,
}

impl YardReport {
    pub fn new(plan: &YardPlan, instance: &YardInstance) -> Self {
        let segregations: Vec<SegregationSummary> = instance
            .segregation_indices()
            .map(|s| segregation_summary(plan, instance, s))
            .collect();

        let load_distance: Decimal = segregations.iter().map(|s| s.load_distance).sum();
        let deliver_distance: Decimal = segregations.iter().map(|s| s.deliver_distance).sum();
        let summary = WeekSummary {
            week: plan.week,
            total_distance: load_distance + deliver_distance,
            load_distance,
            deliver_distance,
            load_moves: segregations.iter().map(|s| s.load_moves).sum(),
            deliver_moves: segregations.iter().map(|s| s.deliver_moves).sum(),
            proven_optimal: plan.proven_optimal,
        };

        let mut movements = Vec::new();
        for s in plan.segregation_indices() {
            for b in plan.block_indices() {
                let total = |kind| -> u64 {
                    plan.period_range()
                        .map(|t| u64::from(plan.flow(kind, s, b, t)))
                        .sum()
                };
                let detail = MovementDetail {
                    segregation: plan.segregation_ids[s.0].clone(),
                    block: plan.block_ids[b.0].clone(),
                    receive: total(FlowKind::Receive),
                    load: total(FlowKind::Load),
                    discharge: total(FlowKind::Discharge),
                    deliver: total(FlowKind::Deliver),
                    peak_inventory: plan
                        .period_range()
                        .map(|t| plan.cell(s, b, t).inventory)
                        .max()
                        .unwrap_or(0),
                    slot_increase: slot_increase(plan, s, b),
                };
                let idle = detail.receive + detail.load + detail.discharge + detail.deliver == 0
                    && detail.peak_inventory == 0;
                if !idle {
                    movements.push(detail);
                }
            }
        }

        let mut workloads = Vec::new();
        for b in plan.block_indices() {
            for t in plan.period_range() {
                workloads.push(BlockWorkload {
                    block: plan.block_ids[b.0].clone(),
                    period: t.0,
                    workload: plan.workload_at(b, t),
                    containers: plan
                        .segregation_indices()
                        .map(|s| plan.cell(s, b, t).inventory)
                        .sum(),
                });
            }
        }

        let spreads = plan
            .period_range()
            .map(|t| PeriodSpread {
                period: t.0,
                peak: plan.peak[t.offset()],
                trough: plan.trough[t.offset()],
            })
            .collect();

        Self {
            summary,
            segregations,
            movements,
            workloads,
            spreads,
        }
    }
}

fn segregation_summary(plan: &YardPlan, instance: &YardInstance, s: SegIdx) -> SegregationSummary {
    let mut load_distance = Decimal::ZERO;
    let mut deliver_distance = Decimal::ZERO;
    let mut load_moves = 0u64;
    let mut deliver_moves = 0u64;

    for b in instance.block_indices() {
        let load: u32 = plan.period_range().map(|t| plan.cell(s, b, t).load).sum();
        let deliver: u32 = plan.period_range().map(|t| plan.cell(s, b, t).deliver).sum();
        load_distance += Decimal::from(load) * instance.load_cost.get((s, b));
        deliver_distance += Decimal::from(deliver) * instance.block(b).deliver_cost;
        load_moves += u64::from(load);
        deliver_moves += u64::from(deliver);
    }

    SegregationSummary {
        segregation: instance.segregation(s).id.clone(),
        direction: instance.segregation(s).direction,
        blocks_used: plan.blocks_used(s),
        load_distance,
        deliver_distance,
        load_moves,
        deliver_moves,
    }
}

fn slot_increase(plan: &YardPlan, s: SegIdx, b: yard_core::BlockIdx) -> u32 {
    let mut previous = 0;
    let mut increase = 0;
    for t in plan.period_range() {
        let slots = plan.cell(s, b, t).occupied_slots;
        increase += slots.saturating_sub(previous);
        previous = slots;
    }
    increase
}

/// (吊機, 區塊) 的班次彙總
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraneBlockSummary {
    /// 吊機編號（從 1 開始）
    pub crane: u32,
    pub block: String,
    pub active_periods: u32,
    pub activations: u32,
    /// 提供的作業量（active_periods × mu）
    pub capacity: u32,
}

/// 吊機班次彙總
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraneShiftSummary {
    pub week: NaiveDate,
    pub shift: Period,
    pub max_diff: f64,
    pub cranes_used: u32,
    pub proven_optimal: bool,
    pub assignments: Vec<CraneBlockSummary>,
}

impl CraneShiftSummary {
    pub fn new(plan: &CranePlan, instance: &CraneInstance) -> Self {
        let mut assignments = Vec::new();
        for g in plan.crane_indices() {
            for b in plan.block_indices() {
                let active_periods = plan
                    .period_range()
                    .filter(|t| plan.is_active(g, b, *t))
                    .count() as u32;
                if active_periods == 0 {
                    continue;
                }
                assignments.push(CraneBlockSummary {
                    crane: g.0 as u32 + 1,
                    block: plan.block_ids[b.0].clone(),
                    active_periods,
                    activations: plan.runs(g, b).len() as u32,
                    capacity: active_periods * instance.service_rate,
                });
            }
        }

        Self {
            week: plan.week,
            shift: plan.shift,
            max_diff: plan.max_diff,
            cranes_used: plan.cranes_used(),
            proven_optimal: plan.proven_optimal,
            assignments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarValues;
    use crate::yard::YardFormulation;
    use yard_core::{Block, BlockIdx, PeriodDemand, Segregation, YardSettings};

    #[test]
    fn test_distances_and_moves() {
        let mut inst = YardInstance::new(NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(), 2);
        inst.add_block(
            Block::new("b1".to_string(), 10, 20, 40).with_deliver_cost(Decimal::new(125, 1)),
        );
        let e = inst.add_segregation(Segregation::new("e".to_string(), Direction::Export));
        let i = inst.add_segregation(Segregation::new("i".to_string(), Direction::Import));
        inst.demand.set((e, Period(1)), PeriodDemand::new(0, 2, 0, 0));
        inst.demand.set((i, Period(2)), PeriodDemand::new(0, 0, 0, 3));
        inst.initial_inventory.set((e, BlockIdx(0)), 2);
        inst.initial_inventory.set((i, BlockIdx(0)), 3);
        inst.load_cost.set((e, BlockIdx(0)), Decimal::from(40));

        let f = YardFormulation::build(&inst, &YardSettings::default()).unwrap();
        let mut values = vec![0.0; f.model.variables().len()];
        values[f.vars.flow(FlowKind::Load, e, BlockIdx(0), Period(1)).0] = 2.0;
        values[f.vars.flow(FlowKind::Deliver, i, BlockIdx(0), Period(2)).0] = 3.0;
        values[f.vars.inventory(i, BlockIdx(0), Period(1)).0] = 3.0;
        values[f.vars.occupied_slots(i, BlockIdx(0), Period(1)).0] = 1.0;
        let plan = YardPlan::decode(&f, &inst, &VarValues::new(values), 117.5, true).unwrap();

        let report = YardReport::new(&plan, &inst);
        assert_eq!(report.summary.load_distance, Decimal::from(80));
        assert_eq!(report.summary.deliver_distance, Decimal::new(375, 1));
        assert_eq!(report.summary.total_distance, Decimal::new(1175, 1));
        assert_eq!(report.summary.load_moves, 2);
        assert_eq!(report.summary.deliver_moves, 3);
        assert_eq!(report.segregations[1].deliver_moves, 3);
        assert_eq!(report.movements.len(), 2);
        assert_eq!(report.movements[1].peak_inventory, 3);
        assert_eq!(report.movements[1].slot_increase, 1);
        assert_eq!(report.workloads.len(), 2);
        assert_eq!(report.spreads.len(), 2);
    }
}
