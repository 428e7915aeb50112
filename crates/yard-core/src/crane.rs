//! 吊機排程輸入

use crate::exclusivity::{ExclusivityRelation, ExclusivitySpec};
use crate::index::{BlockIdx, CraneIdx, Period};
use crate::table::ParamTable;
use crate::{Result, YardError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 每週的吊機車隊設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraneSettings {
    /// 吊機數量 |G|
    pub cranes: u32,

    /// 每台吊機每個子時段的作業量（mu）
    pub service_rate: u32,

    /// 同時作業的吊機總數上限（Rmax）
    pub fleet_ceiling: u32,

    /// 單一區塊同時作業的吊機上限（W）
    pub collision_ceiling: u32,

    /// 最短連續作業子時段數（K）
    pub min_duration: u32,

    /// 區塊排他設定
    pub exclusivity: ExclusivitySpec,
}

impl Default for CraneSettings {
    fn default() -> Self {
        Self {
            cranes: 12,
            service_rate: 30,
            fleet_ceiling: 12,
            collision_ceiling: 2,
            min_duration: 2,
            exclusivity: ExclusivitySpec::default(),
        }
    }
}

impl CraneSettings {
    /// 建構器模式：設置吊機數量
    pub fn with_cranes(mut self, cranes: u32) -> Self {
        self.cranes = cranes;
        self
    }

    /// 建構器模式：設置作業率
    pub fn with_service_rate(mut self, mu: u32) -> Self {
        self.service_rate = mu;
        self
    }

    /// 建構器模式：設置車隊上限
    pub fn with_fleet_ceiling(mut self, rmax: u32) -> Self {
        self.fleet_ceiling = rmax;
        self
    }

    /// 建構器模式：設置碰撞上限
    pub fn with_collision_ceiling(mut self, w: u32) -> Self {
        self.collision_ceiling = w;
        self
    }

    /// 建構器模式：設置最短作業時間
    pub fn with_min_duration(mut self, k: u32) -> Self {
        self.min_duration = k;
        self
    }

    /// 建構器模式：設置排他設定
    pub fn with_exclusivity(mut self, spec: ExclusivitySpec) -> Self {
        self.exclusivity = spec;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_rate == 0 {
            return Err(YardError::InvalidParameter("吊機作業率必須大於 0".to_string()));
        }
        if self.min_duration == 0 {
            return Err(YardError::InvalidParameter("最短作業時間必須大於 0".to_string()));
        }
        Ok(())
    }
}

/// 單一班次的吊機排程實例
#[derive(Debug, Clone)]
pub struct CraneInstance {
    /// 所屬週
    pub week: NaiveDate,

    /// 班次（堆場模型的時段）
    pub shift: Period,

    /// 區塊ID（索引與堆場實例一致）
    pub block_ids: Vec<String>,

    /// 子時段數
    pub periods: u32,

    /// 各區塊各子時段的需求量 V[b,t]
    pub required_volume: ParamTable<(BlockIdx, Period), u32>,

    pub cranes: u32,
    pub service_rate: u32,
    pub fleet_ceiling: u32,
    pub collision_ceiling: u32,
    pub min_duration: u32,

    pub exclusivity: ExclusivityRelation,
}

impl CraneInstance {
    /// 依車隊設定創建空實例
    pub fn new(
        week: NaiveDate,
        shift: Period,
        block_ids: Vec<String>,
        periods: u32,
        settings: &CraneSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let exclusivity = settings.exclusivity.resolve(&block_ids)?;
        Ok(Self {
            week,
            shift,
            block_ids,
            periods,
            required_volume: ParamTable::new("required_volume"),
            cranes: settings.cranes,
            service_rate: settings.service_rate,
            fleet_ceiling: settings.fleet_ceiling,
            collision_ceiling: settings.collision_ceiling,
            min_duration: settings.min_duration,
            exclusivity,
        })
    }

    pub fn block_indices(&self) -> impl Iterator<Item = BlockIdx> + Clone {
        (0..self.block_ids.len()).map(BlockIdx)
    }

    pub fn crane_indices(&self) -> impl Iterator<Item = CraneIdx> + Clone {
        (0..self.cranes as usize).map(CraneIdx)
    }

    pub fn period_range(&self) -> impl Iterator<Item = Period> + Clone {
        Period::range(self.periods)
    }

    pub fn volume(&self, b: BlockIdx, t: Period) -> u32 {
        self.required_volume.get((b, t))
    }

    /// 整個班次的需求總量
    pub fn total_volume(&self) -> u64 {
        self.required_volume.iter().map(|(_, v)| u64::from(v)).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.periods == 0 {
            return Err(YardError::InvalidParameter("子時段數必須大於 0".to_string()));
        }
        for ((b, t), _) in self.required_volume.iter() {
            if b.0 >= self.block_ids.len() {
                return Err(YardError::UnknownId {
                    kind: "區塊",
                    id: b.to_string(),
                });
            }
            if t.0 == 0 || t.0 > self.periods {
                return Err(YardError::UnknownId {
                    kind: "時段",
                    id: t.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("b{}", i)).collect()
    }

    #[test]
    fn test_default_settings() {
        let settings = CraneSettings::default();
        assert_eq!(settings.cranes, 12);
        assert_eq!(settings.service_rate, 30);
        assert_eq!(settings.collision_ceiling, 2);
        assert_eq!(settings.min_duration, 2);
        assert_eq!(settings.fleet_ceiling, 12);
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings: CraneSettings = serde_json::from_str(r#"{"cranes": 4}"#).unwrap();
        assert_eq!(settings.cranes, 4);
        assert_eq!(settings.service_rate, 30);
    }

    #[test]
    fn test_create_instance() {
        let week = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let settings = CraneSettings::default().with_cranes(4).with_exclusivity(
            ExclusivitySpec::Excluding(vec![("b1".to_string(), "b2".to_string())]),
        );
        let mut inst = CraneInstance::new(week, Period(1), ids(3), 4, &settings).unwrap();
        inst.required_volume.set((BlockIdx(0), Period(1)), 30);
        inst.required_volume.set((BlockIdx(2), Period(4)), 15);

        assert!(inst.validate().is_ok());
        assert_eq!(inst.crane_indices().count(), 4);
        assert_eq!(inst.total_volume(), 45);
        assert!(inst.exclusivity.is_excluded(BlockIdx(0), BlockIdx(1)));
    }

    #[test]
    fn test_zero_service_rate_rejected() {
        let week = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let settings = CraneSettings::default().with_service_rate(0);
        assert!(CraneInstance::new(week, Period(1), ids(2), 8, &settings).is_err());
    }
}
