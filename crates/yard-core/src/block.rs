//! 堆場區塊模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 堆場區塊（一週內靜態不變）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 區塊ID
    pub id: String,

    /// 每個槽位可容納的貨櫃數（C_b）
    pub slot_capacity: u32,

    /// TEU 槽位容量（VS_b）
    pub teu_slots: u32,

    /// 正面吊作業容量（VSR_b）
    pub reach_capacity: u32,

    /// 提櫃距離成本（LE_b）
    pub deliver_cost: Decimal,

    /// 是否接受出口分隔群組（B_E）
    pub accepts_export: bool,

    /// 是否接受進口分隔群組（B_I）
    pub accepts_import: bool,
}

impl Block {
    /// 創建新的區塊（預設同時接受進出口）
    pub fn new(id: String, slot_capacity: u32, teu_slots: u32, reach_capacity: u32) -> Self {
        Self {
            id,
            slot_capacity,
            teu_slots,
            reach_capacity,
            deliver_cost: Decimal::ZERO,
            accepts_export: true,
            accepts_import: true,
        }
    }

    /// 建構器模式：設置提櫃距離成本
    pub fn with_deliver_cost(mut self, cost: Decimal) -> Self {
        self.deliver_cost = cost;
        self
    }

    /// 建構器模式：只接受出口
    pub fn export_only(mut self) -> Self {
        self.accepts_export = true;
        self.accepts_import = false;
        self
    }

    /// 建構器模式：只接受進口
    pub fn import_only(mut self) -> Self {
        self.accepts_export = false;
        self.accepts_import = true;
        self
    }

    /// 區塊總貨櫃容量（所有 TEU 槽位都被佔滿時）
    pub fn total_capacity(&self) -> u64 {
        u64::from(self.slot_capacity) * u64::from(self.teu_slots)
    }
}
