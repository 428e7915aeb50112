//! 計劃驗證
//!
//! 與模型無關，直接以實例資料檢查解碼後的計劃。

use crate::plan::{CranePlan, YardPlan};
use serde::{Deserialize, Serialize};
use std::fmt;
use yard_core::{CraneInstance, FlowKind, YardInstance, YardSettings};

/// 違反的規則
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: String,
    pub detail: String,
}

impl Violation {
    fn new(rule: &str, detail: String) -> Self {
        Self {
            rule: rule.to_string(),
            detail,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.detail)
    }
}

impl YardPlan {
    /// 檢查流量守恆、需求、方向、區塊數與容量
    pub fn verify(&self, instance: &YardInstance, settings: &YardSettings) -> Vec<Violation> {
        let mut violations = Vec::new();

        for s in instance.segregation_indices() {
            let seg = instance.segregation(s);

            for b in instance.block_indices() {
                let mut previous = i64::from(instance.initial_inventory.get((s, b)));
                for t in instance.period_range() {
                    let cell = self.cell(s, b, t);
                    let expected = previous + i64::from(cell.receive) + i64::from(cell.discharge)
                        - i64::from(cell.load)
                        - i64::from(cell.deliver);
                    if expected != i64::from(cell.inventory) {
                        violations.push(Violation::new(
                            "flow_conservation",
                            format!(
                                "{},{},{}: 期望 {}，實際 {}",
                                seg.id,
                                instance.block(b).id,
                                t,
                                expected,
                                cell.inventory
                            ),
                        ));
                    }
                    previous = i64::from(cell.inventory);

                    for kind in FlowKind::ALL {
                        if cell.flow(kind) > 0 && !instance.flow_allowed(kind, s, b) {
                            violations.push(Violation::new(
                                "flow_domain",
                                format!(
                                    "{},{},{} 不允許 {}",
                                    seg.id,
                                    instance.block(b).id,
                                    t,
                                    kind.name()
                                ),
                            ));
                        }
                    }

                    let capacity = settings.occupancy_scale
                        * f64::from(instance.block(b).slot_capacity)
                        * f64::from(cell.occupied_slots);
                    if f64::from(cell.inventory) > capacity + 1e-6 {
                        violations.push(Violation::new(
                            "inventory_capacity",
                            format!(
                                "{},{},{}: 庫存 {} 超過 {}",
                                seg.id,
                                instance.block(b).id,
                                t,
                                cell.inventory,
                                capacity
                            ),
                        ));
                    }
                }
            }

            for t in instance.period_range() {
                let demand = instance.demand_at(s, t);
                for kind in FlowKind::ALL {
                    let total: u64 = instance
                        .block_indices()
                        .map(|b| u64::from(self.flow(kind, s, b, t)))
                        .sum();
                    if total != u64::from(demand.get(kind)) {
                        violations.push(Violation::new(
                            "demand_exactness",
                            format!(
                                "{},{} {}: 需求 {}，實際 {}",
                                seg.id,
                                t,
                                kind.name(),
                                demand.get(kind),
                                total
                            ),
                        ));
                    }
                }
            }

            // 有進場流量的區塊數
            let inbound_blocks = instance
                .block_indices()
                .filter(|b| {
                    instance
                        .period_range()
                        .any(|t| self.cell(s, *b, t).receive + self.cell(s, *b, t).discharge > 0)
                })
                .count() as u32;
            let (low, high) = if instance.weekly_inbound(s) == 0 {
                (0, 0)
            } else {
                (seg.min_blocks, seg.max_blocks)
            };
            if inbound_blocks < low || inbound_blocks > high {
                violations.push(Violation::new(
                    "block_count",
                    format!("{}: 使用 {} 個區塊，範圍 [{}, {}]", seg.id, inbound_blocks, low, high),
                ));
            }
        }

        for b in instance.block_indices() {
            let block = instance.block(b);
            for t in instance.period_range() {
                let slots: u64 = instance
                    .segregation_indices()
                    .map(|s| {
                        u64::from(instance.segregation(s).teu)
                            * u64::from(self.cell(s, b, t).occupied_slots)
                    })
                    .sum();
                if slots > u64::from(block.teu_slots) {
                    violations.push(Violation::new(
                        "slot_capacity",
                        format!("{},{}: {} > {}", block.id, t, slots, block.teu_slots),
                    ));
                }
            }
        }

        for t in instance.period_range() {
            let loads = instance.block_indices().map(|b| {
                instance
                    .segregation_indices()
                    .map(|s| self.cell(s, b, t).moves())
                    .sum::<u32>()
            });
            let (min, max) = loads.fold((u32::MAX, 0), |(lo, hi), w| (lo.min(w), hi.max(w)));
            if max >= min && max - min > settings.spread_tolerance {
                violations.push(Violation::new(
                    "workload_spread",
                    format!("{}: {} − {} > {}", t, max, min, settings.spread_tolerance),
                ));
            }
        }

        violations
    }
}

impl CranePlan {
    /// 檢查吊機唯一性、上限、覆蓋、排他與最短作業時間
    pub fn verify(&self, instance: &CraneInstance) -> Vec<Violation> {
        let mut violations = Vec::new();
        let block_id = |b: yard_core::BlockIdx| &self.block_ids[b.0];

        for t in self.period_range() {
            for g in self.crane_indices() {
                let count = self
                    .block_indices()
                    .filter(|b| self.is_active(g, *b, t))
                    .count();
                if count > 1 {
                    violations.push(Violation::new(
                        "one_block_per_crane",
                        format!("g{} 在 {} 同時作業 {} 個區塊", g.0 + 1, t, count),
                    ));
                }
            }

            let total: u32 = self.block_indices().map(|b| self.cranes_on(b, t)).sum();
            if total > instance.fleet_ceiling {
                violations.push(Violation::new(
                    "fleet_ceiling",
                    format!("{}: {} > {}", t, total, instance.fleet_ceiling),
                ));
            }

            for b in self.block_indices() {
                let on = self.cranes_on(b, t);
                if on > instance.collision_ceiling {
                    violations.push(Violation::new(
                        "collision_ceiling",
                        format!("{},{}: {} > {}", block_id(b), t, on, instance.collision_ceiling),
                    ));
                }
                let provided = u64::from(on) * u64::from(instance.service_rate);
                let required = u64::from(instance.volume(b, t));
                if provided < required {
                    violations.push(Violation::new(
                        "coverage",
                        format!("{},{}: 提供 {}，需求 {}", block_id(b), t, provided, required),
                    ));
                }
            }
        }

        for g in self.crane_indices() {
            let blocks = self.blocks_of(g);
            for (i, b1) in blocks.iter().enumerate() {
                for b2 in &blocks[i + 1..] {
                    if instance.exclusivity.is_excluded(*b1, *b2) {
                        violations.push(Violation::new(
                            "exclusivity",
                            format!("g{} 同時佔用 {} 與 {}", g.0 + 1, block_id(*b1), block_id(*b2)),
                        ));
                    }
                }
            }

            for b in self.block_indices() {
                for (start, len) in self.runs(g, b) {
                    let reaches_end = start.0 + len - 1 == self.periods;
                    if len < instance.min_duration && !reaches_end {
                        violations.push(Violation::new(
                            "min_duration",
                            format!(
                                "g{},{} 從 {} 只作業 {} 個子時段",
                                g.0 + 1,
                                block_id(b),
                                start,
                                len
                            ),
                        ));
                    }
                }
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crane::CraneFormulation;
    use crate::model::VarValues;
    use crate::yard::YardFormulation;
    use chrono::NaiveDate;
    use yard_core::{
        Block, BlockIdx, CraneIdx, CraneSettings, Direction, ExclusivitySpec, Period,
        PeriodDemand, Segregation,
    };

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
    }

    #[test]
    fn test_yard_violations_detected() {
        let mut inst = YardInstance::new(week(), 1);
        inst.add_block(Block::new("b1".to_string(), 10, 20, 40));
        let s = inst.add_segregation(Segregation::new("s1".to_string(), Direction::Export));
        inst.demand.set((s, Period(1)), PeriodDemand::new(5, 0, 0, 0));

        let settings = YardSettings::default();
        let f = YardFormulation::build(&inst, &settings).unwrap();
        let mut values = vec![0.0; f.model.variables().len()];
        // 收櫃 4（需求 5），庫存 5（守恆錯誤），沒有佔用槽位
        values[f.vars.flow(FlowKind::Receive, s, BlockIdx(0), Period(1)).0] = 4.0;
        values[f.vars.inventory(s, BlockIdx(0), Period(1)).0] = 5.0;
        let plan = YardPlan::decode(&f, &inst, &VarValues::new(values), 0.0, true).unwrap();

        let rules: Vec<_> = plan
            .verify(&inst, &settings)
            .into_iter()
            .map(|v| v.rule)
            .collect();
        assert!(rules.contains(&"flow_conservation".to_string()));
        assert!(rules.contains(&"demand_exactness".to_string()));
        assert!(rules.contains(&"inventory_capacity".to_string()));
        assert!(!rules.contains(&"block_count".to_string()));
    }

    #[test]
    fn test_crane_violations_detected() {
        let settings = CraneSettings::default()
            .with_cranes(1)
            .with_min_duration(2)
            .with_exclusivity(ExclusivitySpec::Excluding(vec![(
                "b1".to_string(),
                "b2".to_string(),
            )]));
        let mut inst = CraneInstance::new(
            week(),
            Period(1),
            vec!["b1".to_string(), "b2".to_string()],
            4,
            &settings,
        )
        .unwrap();
        inst.required_volume.set((BlockIdx(1), Period(4)), 60);

        let f = CraneFormulation::build(&inst).unwrap();
        let mut values = vec![0.0; f.model.variables().len()];
        // b1 只在 t1 作業（過短），t4 在 b2（到尾端，允許）
        values[f.vars.active(CraneIdx(0), BlockIdx(0), Period(1)).0] = 1.0;
        values[f.vars.active(CraneIdx(0), BlockIdx(1), Period(4)).0] = 1.0;
        let plan = CranePlan::decode(&f, &inst, &VarValues::new(values), true).unwrap();

        let rules: Vec<_> = plan.verify(&inst).into_iter().map(|v| v.rule).collect();
        assert_eq!(
            rules,
            vec![
                "coverage".to_string(),
                "exclusivity".to_string(),
                "min_duration".to_string(),
            ]
        );
    }
}
