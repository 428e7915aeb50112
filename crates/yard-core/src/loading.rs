//! 實例載入
//!
//! 把資料來源提供的原始記錄（以字串ID為鍵）轉換為型別化的 [`YardInstance`]。
//! ID 一律去除空白並轉小寫後比對；缺少的流量記錄視為零。

use crate::block::Block;
use crate::config::StrictnessPolicy;
use crate::crane::CraneSettings;
use crate::index::{BlockIdx, Period, SegIdx};
use crate::instance::{FlowKind, PeriodDemand, YardInstance};
use crate::segregation::{ContainerSize, Direction, Segregation};
use crate::{Result, YardError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

fn default_one() -> i64 {
    1
}

/// 區塊記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: String,
    pub slot_capacity: i64,
    pub teu_slots: i64,
    pub reach_capacity: i64,
    #[serde(default)]
    pub deliver_cost: f64,
    #[serde(default = "default_true")]
    pub accepts_export: bool,
    #[serde(default = "default_true")]
    pub accepts_import: bool,
}

/// 分隔群組記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegregationRecord {
    pub id: String,
    /// 原始標籤，例如 `expo-dry-20-asia`；缺少方向或 TEU 時從標籤推斷
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub teu: Option<i64>,
    #[serde(default = "default_one")]
    pub reach_factor: i64,
    #[serde(default = "default_one")]
    pub min_blocks: i64,
    #[serde(default = "default_one")]
    pub max_blocks: i64,
}

/// 初始庫存記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub segregation: String,
    pub block: String,
    pub quantity: i64,
}

/// 需求記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub segregation: String,
    pub period: i64,
    #[serde(default)]
    pub receive: i64,
    #[serde(default)]
    pub load: i64,
    #[serde(default)]
    pub discharge: i64,
    #[serde(default)]
    pub deliver: i64,
}

/// 裝船距離成本記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCostRecord {
    pub segregation: String,
    pub block: String,
    pub cost: f64,
}

/// 一週的原始記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekRecords {
    pub week: NaiveDate,
    pub periods: u32,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
    #[serde(default)]
    pub segregations: Vec<SegregationRecord>,
    #[serde(default)]
    pub initial_inventory: Vec<InventoryRecord>,
    #[serde(default)]
    pub demand: Vec<DemandRecord>,
    #[serde(default)]
    pub load_costs: Vec<LoadCostRecord>,
    /// 吊機車隊設定；缺少時該週不做吊機排程
    #[serde(default)]
    pub crane_settings: Option<CraneSettings>,
}

impl WeekRecords {
    pub fn new(week: NaiveDate, periods: u32) -> Self {
        Self {
            week,
            periods,
            blocks: Vec::new(),
            segregations: Vec::new(),
            initial_inventory: Vec::new(),
            demand: Vec::new(),
            load_costs: Vec::new(),
            crane_settings: None,
        }
    }
}

/// 被丟棄的資料列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRecord {
    /// 表名
    pub table: String,
    /// 資料列位置（0 起算）
    pub row: usize,
    /// 丟棄原因
    pub reason: String,
}

/// 載入報告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub dropped: Vec<DroppedRecord>,
}

impl LoadReport {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// 載入結果
#[derive(Debug, Clone)]
pub struct LoadedWeek {
    pub instance: YardInstance,
    pub crane_settings: Option<CraneSettings>,
    pub report: LoadReport,
}

/// 實例載入器
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceLoader {
    policy: StrictnessPolicy,
}

impl InstanceLoader {
    pub fn new(policy: StrictnessPolicy) -> Self {
        Self { policy }
    }

    /// 轉換一週的原始記錄
    pub fn load(&self, records: &WeekRecords) -> Result<LoadedWeek> {
        let mut report = LoadReport::default();
        let mut instance = YardInstance::new(records.week, records.periods);

        if records.periods == 0 {
            return Err(YardError::MissingInput(format!("{} 沒有時段", records.week)));
        }

        let mut block_ids: HashMap<String, BlockIdx> = HashMap::new();
        for (row, rec) in records.blocks.iter().enumerate() {
            let id = normalize_id(&rec.id);
            if block_ids.contains_key(&id) {
                self.reject(
                    &mut report,
                    "blocks",
                    row,
                    YardError::DuplicateRecord(format!("區塊 {}", id)),
                )?;
                continue;
            }
            match convert_block(id.clone(), rec) {
                Ok(block) => {
                    let idx = instance.add_block(block);
                    block_ids.insert(id, idx);
                }
                Err(e) => self.reject(&mut report, "blocks", row, e)?,
            }
        }

        let mut seg_ids: HashMap<String, SegIdx> = HashMap::new();
        for (row, rec) in records.segregations.iter().enumerate() {
            let id = normalize_id(&rec.id);
            if seg_ids.contains_key(&id) {
                self.reject(
                    &mut report,
                    "segregations",
                    row,
                    YardError::DuplicateRecord(format!("分隔群組 {}", id)),
                )?;
                continue;
            }
            match convert_segregation(id.clone(), rec) {
                Ok(seg) => {
                    let idx = instance.add_segregation(seg);
                    seg_ids.insert(id, idx);
                }
                Err(e) => self.reject(&mut report, "segregations", row, e)?,
            }
        }

        if instance.blocks.is_empty() || instance.segregations.is_empty() {
            return Err(YardError::MissingInput(format!(
                "{} 沒有可用的區塊或分隔群組",
                records.week
            )));
        }

        for (row, rec) in records.initial_inventory.iter().enumerate() {
            let result = lookup_pair(&seg_ids, &block_ids, &rec.segregation, &rec.block)
                .and_then(|key| Ok((key, non_negative("quantity", rec.quantity)?)))
                .and_then(|(key, qty)| instance.initial_inventory.insert_unique(key, qty));
            if let Err(e) = result {
                self.reject(&mut report, "initial_inventory", row, e)?;
            }
        }

        for (row, rec) in records.load_costs.iter().enumerate() {
            let result = lookup_pair(&seg_ids, &block_ids, &rec.segregation, &rec.block)
                .and_then(|key| Ok((key, to_cost(rec.cost)?)))
                .and_then(|(key, cost)| instance.load_cost.insert_unique(key, cost));
            if let Err(e) = result {
                self.reject(&mut report, "load_costs", row, e)?;
            }
        }

        for (row, rec) in records.demand.iter().enumerate() {
            let result = convert_demand(&instance, &seg_ids, rec)
                .and_then(|(key, demand)| instance.demand.insert_unique(key, demand));
            if let Err(e) = result {
                self.reject(&mut report, "demand", row, e)?;
            }
        }

        instance.validate()?;

        if !report.is_clean() {
            tracing::warn!(
                "週 {} 載入時丟棄 {} 筆資料列",
                records.week,
                report.dropped_count()
            );
        }
        tracing::debug!(
            "週 {} 載入完成：{} 個區塊，{} 個分隔群組，{} 個時段",
            records.week,
            instance.blocks.len(),
            instance.segregations.len(),
            instance.periods
        );

        Ok(LoadedWeek {
            instance,
            crane_settings: records.crane_settings.clone(),
            report,
        })
    }

    /// 依策略處理錯誤資料列：嚴格模式回傳錯誤，寬鬆模式記錄並繼續
    fn reject(
        &self,
        report: &mut LoadReport,
        table: &str,
        row: usize,
        error: YardError,
    ) -> Result<()> {
        match self.policy {
            StrictnessPolicy::Strict => Err(error),
            StrictnessPolicy::Lenient => {
                tracing::warn!("丟棄 {} 第 {} 列：{}", table, row, error);
                report.dropped.push(DroppedRecord {
                    table: table.to_string(),
                    row,
                    reason: error.to_string(),
                });
                Ok(())
            }
        }
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

fn non_negative(field: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| YardError::MalformedRecord(format!("{} 超出範圍: {}", field, value)))
}

fn to_cost(value: f64) -> Result<Decimal> {
    if !value.is_finite() || value < 0.0 {
        return Err(YardError::MalformedRecord(format!("無效的距離成本: {}", value)));
    }
    Decimal::try_from(value)
        .map_err(|e| YardError::MalformedRecord(format!("無效的距離成本 {}: {}", value, e)))
}

fn convert_block(id: String, rec: &BlockRecord) -> Result<Block> {
    if id.is_empty() {
        return Err(YardError::MalformedRecord("區塊ID為空".to_string()));
    }
    let slot_capacity = non_negative("slot_capacity", rec.slot_capacity)?;
    if slot_capacity == 0 {
        return Err(YardError::MalformedRecord(format!("區塊 {} 的槽位容量為 0", id)));
    }
    let mut block = Block::new(
        id,
        slot_capacity,
        non_negative("teu_slots", rec.teu_slots)?,
        non_negative("reach_capacity", rec.reach_capacity)?,
    )
    .with_deliver_cost(to_cost(rec.deliver_cost)?);
    block.accepts_export = rec.accepts_export;
    block.accepts_import = rec.accepts_import;
    Ok(block)
}

fn convert_segregation(id: String, rec: &SegregationRecord) -> Result<Segregation> {
    if id.is_empty() {
        return Err(YardError::MalformedRecord("分隔群組ID為空".to_string()));
    }
    let label = rec.label.clone().unwrap_or_else(|| id.clone());

    let direction = rec
        .direction
        .or_else(|| Direction::infer_from_label(&label))
        .ok_or_else(|| {
            YardError::MalformedRecord(format!("無法判斷分隔群組 {} 的進出口方向", label))
        })?;

    let teu = match rec.teu {
        Some(teu) => non_negative("teu", teu)?,
        None => match ContainerSize::infer_from_label(&label) {
            Some(size) => size.teu(),
            None => {
                tracing::warn!("分隔群組 {} 沒有 20/40 呎尺寸，以 1 TEU 計", label);
                1
            }
        },
    };
    if teu == 0 {
        return Err(YardError::MalformedRecord(format!("分隔群組 {} 的 TEU 為 0", id)));
    }

    let min_blocks = non_negative("min_blocks", rec.min_blocks)?;
    let max_blocks = non_negative("max_blocks", rec.max_blocks)?;
    if min_blocks > max_blocks {
        return Err(YardError::MalformedRecord(format!(
            "分隔群組 {} 的區塊數下限 {} 大於上限 {}",
            id, min_blocks, max_blocks
        )));
    }

    Ok(Segregation::new(id, direction)
        .with_label(label)
        .with_teu(teu)
        .with_reach_factor(non_negative("reach_factor", rec.reach_factor)?)
        .with_block_spread(min_blocks, max_blocks))
}

fn lookup_pair(
    seg_ids: &HashMap<String, SegIdx>,
    block_ids: &HashMap<String, BlockIdx>,
    segregation: &str,
    block: &str,
) -> Result<(SegIdx, BlockIdx)> {
    let s = lookup(seg_ids, "分隔群組", segregation)?;
    let b = lookup(block_ids, "區塊", block)?;
    Ok((s, b))
}

fn lookup<T: Copy>(ids: &HashMap<String, T>, kind: &'static str, id: &str) -> Result<T> {
    let key = normalize_id(id);
    ids.get(&key)
        .copied()
        .ok_or(YardError::UnknownId { kind, id: key })
}

fn convert_demand(
    instance: &YardInstance,
    seg_ids: &HashMap<String, SegIdx>,
    rec: &DemandRecord,
) -> Result<((SegIdx, Period), PeriodDemand)> {
    let s = lookup(seg_ids, "分隔群組", &rec.segregation)?;
    let period = u32::try_from(rec.period)
        .ok()
        .filter(|p| *p >= 1 && *p <= instance.periods)
        .ok_or_else(|| YardError::MalformedRecord(format!("時段超出範圍: {}", rec.period)))?;

    let demand = PeriodDemand::new(
        non_negative("receive", rec.receive)?,
        non_negative("load", rec.load)?,
        non_negative("discharge", rec.discharge)?,
        non_negative("deliver", rec.deliver)?,
    );

    let direction = instance.segregation(s).direction;
    if let Some(kind) = FlowKind::ALL
        .into_iter()
        .find(|k| k.direction() != direction && demand.get(*k) > 0)
    {
        return Err(YardError::MalformedRecord(format!(
            "分隔群組 {} 有不符方向的 {} 需求",
            instance.segregation(s).id,
            kind.name()
        )));
    }

    Ok(((s, Period(period)), demand))
}
