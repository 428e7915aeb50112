//! 規劃配置模型

use crate::{Result, YardError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 載入記錄時對格式錯誤資料列的處理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrictnessPolicy {
    /// 任何錯誤資料列都使整週載入失敗
    Strict,
    /// 丟棄錯誤資料列並記錄於載入報告
    #[default]
    Lenient,
}

/// 堆場分配模型參數
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YardSettings {
    /// 完整求解時間上限（秒）
    pub time_limit_secs: u64,

    /// 佔用比例尺度（OS）
    pub occupancy_scale: f64,

    /// 最小佔用比例（OI）
    pub min_occupancy: f64,

    /// 同一時段各區塊工作量差的容許上限（r）
    pub spread_tolerance: u32,

    /// 裝船距離權重
    pub load_weight: f64,

    /// 提櫃距離權重
    pub deliver_weight: f64,
}

impl Default for YardSettings {
    fn default() -> Self {
        Self {
            time_limit_secs: 60,
            occupancy_scale: 1.0,
            min_occupancy: 0.0204081632653061,
            spread_tolerance: 348,
            load_weight: 1.0,
            deliver_weight: 1.0,
        }
    }
}

impl YardSettings {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    /// 建構器模式：設置求解時間上限
    pub fn with_time_limit_secs(mut self, secs: u64) -> Self {
        self.time_limit_secs = secs;
        self
    }

    /// 建構器模式：設置工作量差容許上限
    pub fn with_spread_tolerance(mut self, r: u32) -> Self {
        self.spread_tolerance = r;
        self
    }
}

/// 吊機排程求解參數
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraneSolveSettings {
    /// 每個班次的求解時間上限（秒）
    pub time_limit_secs: u64,

    /// 每個班次切分的子時段（小時）數
    pub hourly_periods: u32,

    /// 子時段權重；為空時平均分配
    pub hourly_profile: Option<Vec<u32>>,
}

impl Default for CraneSolveSettings {
    fn default() -> Self {
        Self {
            time_limit_secs: 3600,
            hourly_periods: 8,
            hourly_profile: None,
        }
    }
}

impl CraneSolveSettings {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    /// 建構器模式：設置子時段權重
    pub fn with_hourly_profile(mut self, profile: Vec<u32>) -> Self {
        self.hourly_profile = Some(profile);
        self
    }
}

/// 不可行診斷參數
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisSettings {
    /// 是否在不可行時計算最小不可行子集
    pub enabled: bool,

    /// 最多可行性探測次數；用盡時回報非最小結果
    pub max_probes: usize,

    /// 單次探測時間上限（秒）
    pub probe_time_limit_secs: u64,
}

impl Default for DiagnosisSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_probes: 500,
            probe_time_limit_secs: 10,
        }
    }
}

impl DiagnosisSettings {
    pub fn probe_time_limit(&self) -> Duration {
        Duration::from_secs(self.probe_time_limit_secs)
    }
}

/// 週批次規劃配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub yard: YardSettings,
    pub crane: CraneSolveSettings,
    pub diagnosis: DiagnosisSettings,
    pub strictness: StrictnessPolicy,
}

impl PlannerConfig {
    /// 從 JSON 檔案讀取配置（缺少的欄位使用預設值）
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PlannerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// 建構器模式：設置堆場參數
    pub fn with_yard(mut self, yard: YardSettings) -> Self {
        self.yard = yard;
        self
    }

    /// 建構器模式：設置吊機求解參數
    pub fn with_crane(mut self, crane: CraneSolveSettings) -> Self {
        self.crane = crane;
        self
    }

    /// 建構器模式：設置診斷參數
    pub fn with_diagnosis(mut self, diagnosis: DiagnosisSettings) -> Self {
        self.diagnosis = diagnosis;
        self
    }

    /// 建構器模式：設置資料列處理策略
    pub fn with_strictness(mut self, strictness: StrictnessPolicy) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let yard = &self.yard;
        if !(yard.occupancy_scale.is_finite() && yard.occupancy_scale > 0.0) {
            return Err(YardError::InvalidParameter(format!(
                "佔用比例尺度必須為正數: {}",
                yard.occupancy_scale
            )));
        }
        if !(yard.min_occupancy.is_finite() && (0.0..=1.0).contains(&yard.min_occupancy)) {
            return Err(YardError::InvalidParameter(format!(
                "最小佔用比例必須介於 0 與 1: {}",
                yard.min_occupancy
            )));
        }
        if !(yard.load_weight.is_finite() && yard.deliver_weight.is_finite()) {
            return Err(YardError::InvalidParameter("目標權重必須為有限數".to_string()));
        }
        if self.crane.hourly_periods == 0 {
            return Err(YardError::InvalidParameter("子時段數必須大於 0".to_string()));
        }
        if let Some(profile) = &self.crane.hourly_profile {
            if profile.len() != self.crane.hourly_periods as usize {
                return Err(YardError::InvalidParameter(format!(
                    "子時段權重長度 {} 與子時段數 {} 不符",
                    profile.len(),
                    self.crane.hourly_periods
                )));
            }
            if profile.iter().all(|w| *w == 0) {
                return Err(YardError::InvalidParameter("子時段權重不可全為 0".to_string()));
            }
        }
        Ok(())
    }
}
