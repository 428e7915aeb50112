//! 解碼後的計劃
//!
//! 求解器回傳的變數值轉為以索引存取的整數計劃。整數與 0/1 變數一律四捨五入。

use crate::crane::CraneFormulation;
use crate::model::VarValues;
use crate::yard::YardFormulation;
use crate::{ModelError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use yard_core::{BlockIdx, CraneIdx, CraneInstance, FlowKind, Period, SegIdx, YardInstance};

/// 單一 (s,b,t) 的流量、庫存與佔用
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCell {
    pub receive: u32,
    pub load: u32,
    pub discharge: u32,
    pub deliver: u32,
    pub inventory: u32,
    pub occupied_slots: u32,
    pub assigned: bool,
}

impl FlowCell {
    pub fn flow(&self, kind: FlowKind) -> u32 {
        match kind {
            FlowKind::Receive => self.receive,
            FlowKind::Load => self.load,
            FlowKind::Discharge => self.discharge,
            FlowKind::Deliver => self.deliver,
        }
    }

    /// 四種流量的總和
    pub fn moves(&self) -> u32 {
        self.receive + self.load + self.discharge + self.deliver
    }
}

fn check_len(values: &VarValues, expected: usize, what: &str) -> Result<()> {
    if values.len() != expected {
        return Err(ModelError::Decode(format!(
            "{} 需要 {} 個變數值，實際 {} 個",
            what,
            expected,
            values.len()
        )));
    }
    Ok(())
}

/// 堆場週計劃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YardPlan {
    pub week: NaiveDate,
    pub segregation_ids: Vec<String>,
    pub block_ids: Vec<String>,
    pub periods: u32,

    /// 以 (s,b,t) 稠密排列
    cells: Vec<FlowCell>,

    /// used[s][b]
    pub used: Vec<Vec<bool>>,

    /// block_count[s]
    pub block_count: Vec<u32>,

    /// workload[b][t]
    pub workload: Vec<Vec<u32>>,

    pub peak: Vec<u32>,
    pub trough: Vec<u32>,

    /// 目標值
    pub objective: f64,

    /// 是否已證明最佳（時間上限內只找到可行解時為 false）
    pub proven_optimal: bool,
}

impl YardPlan {
    pub fn decode(
        formulation: &YardFormulation,
        instance: &YardInstance,
        values: &VarValues,
        objective: f64,
        proven_optimal: bool,
    ) -> Result<Self> {
        check_len(values, formulation.model.variables().len(), "堆場計劃")?;
        let v = &formulation.vars;

        let mut cells = Vec::with_capacity(v.inventory.len());
        for s in instance.segregation_indices() {
            for b in instance.block_indices() {
                for t in instance.period_range() {
                    cells.push(FlowCell {
                        receive: values.get_count(v.flow(FlowKind::Receive, s, b, t)),
                        load: values.get_count(v.flow(FlowKind::Load, s, b, t)),
                        discharge: values.get_count(v.flow(FlowKind::Discharge, s, b, t)),
                        deliver: values.get_count(v.flow(FlowKind::Deliver, s, b, t)),
                        inventory: values.get_count(v.inventory(s, b, t)),
                        occupied_slots: values.get_count(v.occupied_slots(s, b, t)),
                        assigned: values.is_set(v.assigned(s, b, t)),
                    });
                }
            }
        }

        let used = instance
            .segregation_indices()
            .map(|s| {
                instance
                    .block_indices()
                    .map(|b| values.is_set(v.used(s, b)))
                    .collect()
            })
            .collect();
        let block_count = instance
            .segregation_indices()
            .map(|s| values.get_count(v.block_count(s)))
            .collect();
        let workload = instance
            .block_indices()
            .map(|b| {
                instance
                    .period_range()
                    .map(|t| values.get_count(v.workload(b, t)))
                    .collect()
            })
            .collect();

        Ok(Self {
            week: instance.week,
            segregation_ids: instance.segregations.iter().map(|s| s.id.clone()).collect(),
            block_ids: instance.blocks.iter().map(|b| b.id.clone()).collect(),
            periods: instance.periods,
            cells,
            used,
            block_count,
            workload,
            peak: instance
                .period_range()
                .map(|t| values.get_count(v.peak(t)))
                .collect(),
            trough: instance
                .period_range()
                .map(|t| values.get_count(v.trough(t)))
                .collect(),
            objective,
            proven_optimal,
        })
    }

    pub fn cell(&self, s: SegIdx, b: BlockIdx, t: Period) -> &FlowCell {
        let n_b = self.block_ids.len();
        let n_t = self.periods as usize;
        &self.cells[(s.0 * n_b + b.0) * n_t + t.offset()]
    }

    pub fn flow(&self, kind: FlowKind, s: SegIdx, b: BlockIdx, t: Period) -> u32 {
        self.cell(s, b, t).flow(kind)
    }

    pub fn workload_at(&self, b: BlockIdx, t: Period) -> u32 {
        self.workload[b.0][t.offset()]
    }

    pub fn segregation_indices(&self) -> impl Iterator<Item = SegIdx> + Clone {
        (0..self.segregation_ids.len()).map(SegIdx)
    }

    pub fn block_indices(&self) -> impl Iterator<Item = BlockIdx> + Clone {
        (0..self.block_ids.len()).map(BlockIdx)
    }

    pub fn period_range(&self) -> impl Iterator<Item = Period> + Clone {
        Period::range(self.periods)
    }

    /// 實際有流量進場的區塊數
    pub fn blocks_used(&self, s: SegIdx) -> u32 {
        self.used[s.0].iter().filter(|u| **u).count() as u32
    }
}

/// 吊機班次計劃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CranePlan {
    pub week: NaiveDate,
    pub shift: Period,
    pub block_ids: Vec<String>,
    pub cranes: u32,
    pub periods: u32,

    /// 以 (g,b,t) 稠密排列
    active: Vec<bool>,
    alpha: Vec<bool>,

    pub max_diff: f64,
    pub proven_optimal: bool,
}

impl CranePlan {
    pub fn decode(
        formulation: &CraneFormulation,
        instance: &CraneInstance,
        values: &VarValues,
        proven_optimal: bool,
    ) -> Result<Self> {
        check_len(values, formulation.model.variables().len(), "吊機計劃")?;
        let v = &formulation.vars;

        let mut active = Vec::with_capacity(v.active.len());
        let mut alpha = Vec::with_capacity(v.alpha.len());
        for g in instance.crane_indices() {
            for b in instance.block_indices() {
                for t in instance.period_range() {
                    active.push(values.is_set(v.active(g, b, t)));
                    alpha.push(values.is_set(v.alpha(g, b, t)));
                }
            }
        }

        Ok(Self {
            week: instance.week,
            shift: instance.shift,
            block_ids: instance.block_ids.clone(),
            cranes: instance.cranes,
            periods: instance.periods,
            active,
            alpha,
            max_diff: values.get(v.max_diff),
            proven_optimal,
        })
    }

    fn offset(&self, g: CraneIdx, b: BlockIdx, t: Period) -> usize {
        (g.0 * self.block_ids.len() + b.0) * self.periods as usize + t.offset()
    }

    pub fn is_active(&self, g: CraneIdx, b: BlockIdx, t: Period) -> bool {
        self.active[self.offset(g, b, t)]
    }

    pub fn is_activation(&self, g: CraneIdx, b: BlockIdx, t: Period) -> bool {
        self.alpha[self.offset(g, b, t)]
    }

    pub fn crane_indices(&self) -> impl Iterator<Item = CraneIdx> + Clone {
        (0..self.cranes as usize).map(CraneIdx)
    }

    pub fn block_indices(&self) -> impl Iterator<Item = BlockIdx> + Clone {
        (0..self.block_ids.len()).map(BlockIdx)
    }

    pub fn period_range(&self) -> impl Iterator<Item = Period> + Clone {
        Period::range(self.periods)
    }

    /// 某子時段在區塊上作業的吊機數
    pub fn cranes_on(&self, b: BlockIdx, t: Period) -> u32 {
        self.crane_indices()
            .filter(|g| self.is_active(*g, b, t))
            .count() as u32
    }

    /// 吊機在班次內作業過的區塊
    pub fn blocks_of(&self, g: CraneIdx) -> Vec<BlockIdx> {
        self.block_indices()
            .filter(|b| self.period_range().any(|t| self.is_active(g, *b, t)))
            .collect()
    }

    /// 吊機在區塊上的連續作業段：(起點, 長度)
    pub fn runs(&self, g: CraneIdx, b: BlockIdx) -> Vec<(Period, u32)> {
        let mut runs = Vec::new();
        let mut current: Option<(Period, u32)> = None;
        for t in self.period_range() {
            if self.is_active(g, b, t) {
                current = match current {
                    Some((start, len)) => Some((start, len + 1)),
                    None => Some((t, 1)),
                };
            } else if let Some(run) = current.take() {
                runs.push(run);
            }
        }
        runs.extend(current);
        runs
    }

    /// 有作業的吊機數
    pub fn cranes_used(&self) -> u32 {
        self.crane_indices()
            .filter(|g| !self.blocks_of(*g).is_empty())
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarValues;
    use yard_core::{Block, CraneSettings, Direction, PeriodDemand, Segregation, YardSettings};

    fn yard_instance() -> YardInstance {
        let mut inst = YardInstance::new(NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(), 2);
        inst.add_block(Block::new("b1".to_string(), 10, 20, 40));
        inst.add_block(Block::new("b2".to_string(), 10, 20, 40));
        let s = inst.add_segregation(Segregation::new("s1".to_string(), Direction::Export));
        inst.demand.set((s, Period(1)), PeriodDemand::new(3, 0, 0, 0));
        inst
    }

    #[test]
    fn test_decode_yard_plan() {
        let inst = yard_instance();
        let f = YardFormulation::build(&inst, &YardSettings::default()).unwrap();
        let mut values = vec![0.0; f.model.variables().len()];
        let cell = (SegIdx(0), BlockIdx(1), Period(1));
        values[f.vars.flow(FlowKind::Receive, cell.0, cell.1, cell.2).0] = 2.9999;
        values[f.vars.inventory(cell.0, cell.1, cell.2).0] = 3.0;
        values[f.vars.assigned(cell.0, cell.1, cell.2).0] = 0.9999;
        values[f.vars.used(cell.0, cell.1).0] = 1.0;
        values[f.vars.workload(cell.1, cell.2).0] = 3.0;

        let plan = YardPlan::decode(&f, &inst, &VarValues::new(values), 0.0, true).unwrap();
        assert_eq!(plan.cell(cell.0, cell.1, cell.2).receive, 3);
        assert!(plan.cell(cell.0, cell.1, cell.2).assigned);
        assert_eq!(plan.cell(cell.0, cell.1, Period(2)).inventory, 0);
        assert_eq!(plan.workload_at(BlockIdx(1), Period(1)), 3);
        assert_eq!(plan.blocks_used(SegIdx(0)), 1);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let inst = yard_instance();
        let f = YardFormulation::build(&inst, &YardSettings::default()).unwrap();
        let result = YardPlan::decode(&f, &inst, &VarValues::zeros(3), 0.0, true);
        assert!(matches!(result, Err(ModelError::Decode(_))));
    }

    #[test]
    fn test_crane_runs() {
        let settings = CraneSettings::default().with_cranes(1);
        let inst = CraneInstance::new(
            NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(),
            Period(2),
            vec!["b1".to_string()],
            5,
            &settings,
        )
        .unwrap();
        let f = CraneFormulation::build(&inst).unwrap();
        let mut values = vec![0.0; f.model.variables().len()];
        for t in [1, 2, 4, 5] {
            values[f.vars.active(CraneIdx(0), BlockIdx(0), Period(t)).0] = 1.0;
        }
        let plan = CranePlan::decode(&f, &inst, &VarValues::new(values), true).unwrap();

        assert_eq!(
            plan.runs(CraneIdx(0), BlockIdx(0)),
            vec![(Period(1), 2), (Period(4), 2)]
        );
        assert_eq!(plan.cranes_on(BlockIdx(0), Period(3)), 0);
        assert_eq!(plan.cranes_used(), 1);
    }
}
