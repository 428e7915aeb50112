//! 實例資料來源

use crate::{PlannerError, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use yard_core::calendar::week_label;
use yard_core::{WeekRecords, YardError};

/// 依 (評估準則, 參與率, 週) 提供原始記錄
///
/// 找不到該週時回傳 `Ok(None)`；資料來源本身無法使用時回傳
/// [`PlannerError::RepositoryUnavailable`]。
pub trait InstanceRepository {
    fn week_records(
        &self,
        criterion: &str,
        participation: u32,
        week: NaiveDate,
    ) -> Result<Option<WeekRecords>>;
}

/// 記憶體資料來源
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    records: HashMap<(String, u32, NaiveDate), WeekRecords>,
    offline: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, criterion: &str, participation: u32, records: WeekRecords) {
        self.records
            .insert((criterion.to_string(), participation, records.week), records);
    }

    /// 模擬資料來源中斷
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl InstanceRepository for InMemoryRepository {
    fn week_records(
        &self,
        criterion: &str,
        participation: u32,
        week: NaiveDate,
    ) -> Result<Option<WeekRecords>> {
        if self.offline {
            return Err(PlannerError::RepositoryUnavailable("記憶體資料來源已離線".to_string()));
        }
        Ok(self
            .records
            .get(&(criterion.to_string(), participation, week))
            .cloned())
    }
}

/// JSON 目錄資料來源
///
/// 檔案佈局：`<root>/<criterion>/<yyyy-mm-dd>/instance_<participation>.json`
#[derive(Debug, Clone)]
pub struct JsonDirectoryRepository {
    root: PathBuf,
}

impl JsonDirectoryRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, criterion: &str, participation: u32, week: NaiveDate) -> PathBuf {
        self.root
            .join(criterion)
            .join(week_label(week))
            .join(format!("instance_{}.json", participation))
    }

    /// 寫入一週的記錄（會建立缺少的目錄）
    pub fn save(&self, criterion: &str, participation: u32, records: &WeekRecords) -> Result<PathBuf> {
        let path = self.path_for(criterion, participation, records.week);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(YardError::from)?;
        }
        let json = serde_json::to_string_pretty(records).map_err(YardError::from)?;
        fs::write(&path, json).map_err(YardError::from)?;
        Ok(path)
    }
}

impl InstanceRepository for JsonDirectoryRepository {
    fn week_records(
        &self,
        criterion: &str,
        participation: u32,
        week: NaiveDate,
    ) -> Result<Option<WeekRecords>> {
        if !self.root.is_dir() {
            return Err(PlannerError::RepositoryUnavailable(format!(
                "目錄不存在: {}",
                self.root.display()
            )));
        }

        let path = self.path_for(criterion, participation, week);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("找不到 {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(YardError::from(e).into()),
        };

        let records: WeekRecords = serde_json::from_str(&content).map_err(YardError::from)?;
        if records.week != week {
            return Err(YardError::MalformedRecord(format!(
                "{} 的週為 {}，預期 {}",
                path.display(),
                records.week,
                week
            ))
            .into());
        }
        Ok(Some(records))
    }
}
