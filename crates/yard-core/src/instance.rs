//! 堆場週實例
//!
//! 一週的完整輸入：區塊、分隔群組、時段數、初始庫存、各時段需求與距離成本。
//! 建立後以 [`YardInstance::validate`] 檢查索引與方向一致性。

use crate::block::Block;
use crate::index::{BlockIdx, Period, SegIdx};
use crate::segregation::{Direction, Segregation};
use crate::table::ParamTable;
use crate::{Result, YardError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 貨櫃流向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    /// 收櫃（出口進場）
    Receive,
    /// 裝船（出口出場）
    Load,
    /// 卸船（進口進場）
    Discharge,
    /// 提櫃（進口出場）
    Deliver,
}

impl FlowKind {
    pub const ALL: [FlowKind; 4] = [
        FlowKind::Receive,
        FlowKind::Load,
        FlowKind::Discharge,
        FlowKind::Deliver,
    ];

    /// 流向所屬的作業方向
    pub fn direction(self) -> Direction {
        match self {
            FlowKind::Receive | FlowKind::Load => Direction::Export,
            FlowKind::Discharge | FlowKind::Deliver => Direction::Import,
        }
    }

    /// 是否為進場流向
    pub fn is_inbound(self) -> bool {
        matches!(self, FlowKind::Receive | FlowKind::Discharge)
    }

    pub fn name(self) -> &'static str {
        match self {
            FlowKind::Receive => "receive",
            FlowKind::Load => "load",
            FlowKind::Discharge => "discharge",
            FlowKind::Deliver => "deliver",
        }
    }
}

/// 單一分隔群組在單一時段的需求（貨櫃數）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDemand {
    pub receive: u32,
    pub load: u32,
    pub discharge: u32,
    pub deliver: u32,
}

impl PeriodDemand {
    pub fn new(receive: u32, load: u32, discharge: u32, deliver: u32) -> Self {
        Self {
            receive,
            load,
            discharge,
            deliver,
        }
    }

    pub fn get(&self, kind: FlowKind) -> u32 {
        match kind {
            FlowKind::Receive => self.receive,
            FlowKind::Load => self.load,
            FlowKind::Discharge => self.discharge,
            FlowKind::Deliver => self.deliver,
        }
    }

    pub fn set(&mut self, kind: FlowKind, value: u32) {
        match kind {
            FlowKind::Receive => self.receive = value,
            FlowKind::Load => self.load = value,
            FlowKind::Discharge => self.discharge = value,
            FlowKind::Deliver => self.deliver = value,
        }
    }

    /// 進場需求（收櫃 + 卸船）
    pub fn inbound(&self) -> u32 {
        self.receive + self.discharge
    }

    pub fn is_zero(&self) -> bool {
        *self == PeriodDemand::default()
    }
}

/// 堆場週實例
#[derive(Debug, Clone)]
pub struct YardInstance {
    /// 週起始日（週一）
    pub week: NaiveDate,

    /// 區塊
    pub blocks: Vec<Block>,

    /// 分隔群組
    pub segregations: Vec<Segregation>,

    /// 時段數（時段為 1..=periods）
    pub periods: u32,

    /// 初始庫存 I0[s,b]
    pub initial_inventory: ParamTable<(SegIdx, BlockIdx), u32>,

    /// 需求 [s,t]
    pub demand: ParamTable<(SegIdx, Period), PeriodDemand>,

    /// 裝船距離成本 LC[s,b]
    pub load_cost: ParamTable<(SegIdx, BlockIdx), Decimal>,
}

impl YardInstance {
    /// 創建空的週實例
    pub fn new(week: NaiveDate, periods: u32) -> Self {
        Self {
            week,
            blocks: Vec::new(),
            segregations: Vec::new(),
            periods,
            initial_inventory: ParamTable::new("initial_inventory"),
            demand: ParamTable::new("demand"),
            load_cost: ParamTable::new("load_cost"),
        }
    }

    /// 添加區塊並回傳其索引
    pub fn add_block(&mut self, block: Block) -> BlockIdx {
        self.blocks.push(block);
        BlockIdx(self.blocks.len() - 1)
    }

    /// 添加分隔群組並回傳其索引
    pub fn add_segregation(&mut self, segregation: Segregation) -> SegIdx {
        self.segregations.push(segregation);
        SegIdx(self.segregations.len() - 1)
    }

    pub fn block(&self, b: BlockIdx) -> &Block {
        &self.blocks[b.0]
    }

    pub fn segregation(&self, s: SegIdx) -> &Segregation {
        &self.segregations[s.0]
    }

    pub fn block_indices(&self) -> impl Iterator<Item = BlockIdx> + Clone {
        (0..self.blocks.len()).map(BlockIdx)
    }

    pub fn segregation_indices(&self) -> impl Iterator<Item = SegIdx> + Clone {
        (0..self.segregations.len()).map(SegIdx)
    }

    pub fn period_range(&self) -> impl Iterator<Item = Period> + Clone {
        Period::range(self.periods)
    }

    pub fn find_block(&self, id: &str) -> Option<BlockIdx> {
        self.blocks.iter().position(|b| b.id == id).map(BlockIdx)
    }

    pub fn find_segregation(&self, id: &str) -> Option<SegIdx> {
        let id = id.to_lowercase();
        self.segregations
            .iter()
            .position(|s| s.id == id)
            .map(SegIdx)
    }

    /// 需求（缺少時為零）
    pub fn demand_at(&self, s: SegIdx, t: Period) -> PeriodDemand {
        self.demand.get((s, t))
    }

    /// 分隔群組整週的進場需求總量
    pub fn weekly_inbound(&self, s: SegIdx) -> u64 {
        self.period_range()
            .map(|t| u64::from(self.demand_at(s, t).inbound()))
            .sum()
    }

    /// 分隔群組整週某流向的需求總量
    pub fn weekly_demand(&self, s: SegIdx, kind: FlowKind) -> u64 {
        self.period_range()
            .map(|t| u64::from(self.demand_at(s, t).get(kind)))
            .sum()
    }

    /// 區塊是否接受該分隔群組的方向
    pub fn is_eligible(&self, s: SegIdx, b: BlockIdx) -> bool {
        let block = self.block(b);
        match self.segregation(s).direction {
            Direction::Export => block.accepts_export,
            Direction::Import => block.accepts_import,
        }
    }

    /// 某流向在 (s,b) 上是否允許非零
    pub fn flow_allowed(&self, kind: FlowKind, s: SegIdx, b: BlockIdx) -> bool {
        self.segregation(s).direction == kind.direction() && self.is_eligible(s, b)
    }

    /// 驗證實例的結構一致性
    pub fn validate(&self) -> Result<()> {
        if self.periods == 0 {
            return Err(YardError::InvalidParameter("時段數必須大於 0".to_string()));
        }

        let mut seen = HashSet::new();
        for block in &self.blocks {
            if !seen.insert(block.id.as_str()) {
                return Err(YardError::DuplicateRecord(format!("區塊 {}", block.id)));
            }
            if block.slot_capacity == 0 {
                return Err(YardError::InvalidParameter(format!(
                    "區塊 {} 的槽位容量為 0",
                    block.id
                )));
            }
        }

        let mut seen = HashSet::new();
        for seg in &self.segregations {
            if !seen.insert(seg.id.as_str()) {
                return Err(YardError::DuplicateRecord(format!("分隔群組 {}", seg.id)));
            }
            if seg.teu == 0 {
                return Err(YardError::InvalidParameter(format!(
                    "分隔群組 {} 的 TEU 為 0",
                    seg.id
                )));
            }
            if seg.min_blocks > seg.max_blocks {
                return Err(YardError::InvalidParameter(format!(
                    "分隔群組 {} 的區塊數下限 {} 大於上限 {}",
                    seg.id, seg.min_blocks, seg.max_blocks
                )));
            }
        }

        let seg_count = self.segregations.len();
        let block_count = self.blocks.len();

        for ((s, b), _) in self.initial_inventory.iter() {
            self.check_pair(s, b, seg_count, block_count, "initial_inventory")?;
        }
        for ((s, b), _) in self.load_cost.iter() {
            self.check_pair(s, b, seg_count, block_count, "load_cost")?;
        }
        for ((s, t), demand) in self.demand.iter() {
            if s.0 >= seg_count {
                return Err(YardError::UnknownId {
                    kind: "分隔群組",
                    id: s.to_string(),
                });
            }
            if t.0 == 0 || t.0 > self.periods {
                return Err(YardError::UnknownId {
                    kind: "時段",
                    id: t.to_string(),
                });
            }
            let direction = self.segregation(s).direction;
            for kind in FlowKind::ALL {
                if kind.direction() != direction && demand.get(kind) > 0 {
                    return Err(YardError::InvalidParameter(format!(
                        "分隔群組 {} 在 {} 有不符方向的 {} 需求",
                        self.segregation(s).id,
                        t,
                        kind.name()
                    )));
                }
            }
        }

        Ok(())
    }

    fn check_pair(
        &self,
        s: SegIdx,
        b: BlockIdx,
        seg_count: usize,
        block_count: usize,
        table: &str,
    ) -> Result<()> {
        if s.0 >= seg_count {
            return Err(YardError::UnknownId {
                kind: "分隔群組",
                id: format!("{} ({})", s, table),
            });
        }
        if b.0 >= block_count {
            return Err(YardError::UnknownId {
                kind: "區塊",
                id: format!("{} ({})", b, table),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
    }

    fn sample() -> YardInstance {
        let mut inst = YardInstance::new(week(), 3);
        inst.add_block(Block::new("b1".to_string(), 10, 20, 40));
        inst.add_block(Block::new("b2".to_string(), 10, 20, 40).import_only());
        let s1 = inst.add_segregation(Segregation::new("s1".to_string(), Direction::Export));
        let s2 = inst.add_segregation(Segregation::new("s2".to_string(), Direction::Import));
        inst.demand
            .insert_unique((s1, Period(1)), PeriodDemand::new(4, 3, 0, 0))
            .unwrap();
        inst.demand
            .insert_unique((s2, Period(2)), PeriodDemand::new(0, 0, 4, 2))
            .unwrap();
        inst
    }

    #[test]
    fn test_valid_instance() {
        let inst = sample();
        assert!(inst.validate().is_ok());
        assert_eq!(inst.weekly_inbound(SegIdx(0)), 4);
        assert_eq!(inst.weekly_demand(SegIdx(1), FlowKind::Deliver), 2);
        assert_eq!(inst.demand_at(SegIdx(0), Period(3)), PeriodDemand::default());
    }

    #[test]
    fn test_eligibility() {
        let inst = sample();
        assert!(!inst.is_eligible(SegIdx(0), BlockIdx(1)));
        assert!(inst.is_eligible(SegIdx(1), BlockIdx(1)));
        assert!(inst.flow_allowed(FlowKind::Receive, SegIdx(0), BlockIdx(0)));
        assert!(!inst.flow_allowed(FlowKind::Discharge, SegIdx(0), BlockIdx(0)));
    }

    #[test]
    fn test_wrong_direction_demand_rejected() {
        let mut inst = sample();
        inst.demand.set((SegIdx(0), Period(2)), PeriodDemand::new(0, 0, 1, 0));
        assert!(matches!(
            inst.validate(),
            Err(YardError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_out_of_range_period_rejected() {
        let mut inst = sample();
        inst.demand.set((SegIdx(0), Period(4)), PeriodDemand::new(1, 0, 0, 0));
        assert!(matches!(inst.validate(), Err(YardError::UnknownId { .. })));
    }

    #[test]
    fn test_block_spread_bounds_checked() {
        let mut inst = sample();
        inst.segregations[0].min_blocks = 3;
        inst.segregations[0].max_blocks = 2;
        assert!(inst.validate().is_err());
    }

    #[test]
    fn test_find_by_id() {
        let inst = sample();
        assert_eq!(inst.find_block("b2"), Some(BlockIdx(1)));
        assert_eq!(inst.find_segregation("S1"), Some(SegIdx(0)));
        assert_eq!(inst.find_block("b9"), None);
    }
}
