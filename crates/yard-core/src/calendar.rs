//! 週曆

use crate::{Result, YardError};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// 要處理的週
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekSelection {
    /// 一整年的所有 ISO 週（以週一表示）
    Year(i32),
    /// 明確指定的週起始日（必須是週一）
    Explicit(Vec<NaiveDate>),
}

impl WeekSelection {
    /// 展開為週一日期列表（保留呼叫者順序）
    pub fn weeks(&self) -> Result<Vec<NaiveDate>> {
        match self {
            WeekSelection::Year(year) => iso_mondays(*year),
            WeekSelection::Explicit(dates) => {
                for date in dates {
                    if date.weekday() != Weekday::Mon {
                        return Err(YardError::InvalidDate(format!(
                            "{} 不是週一",
                            date
                        )));
                    }
                }
                Ok(dates.clone())
            }
        }
    }
}

/// 某 ISO 年的所有週一
pub fn iso_mondays(year: i32) -> Result<Vec<NaiveDate>> {
    // 12 月 28 日必定落在該 ISO 年的最後一週
    let last_week = NaiveDate::from_ymd_opt(year, 12, 28)
        .ok_or_else(|| YardError::InvalidDate(format!("年份 {}", year)))?
        .iso_week()
        .week();

    (1..=last_week)
        .map(|w| {
            NaiveDate::from_isoywd_opt(year, w, Weekday::Mon)
                .ok_or_else(|| YardError::InvalidDate(format!("{} 年第 {} 週", year, w)))
        })
        .collect()
}

/// 週的目錄名稱，例如 `2022-01-03`
pub fn week_label(week: NaiveDate) -> String {
    week.format("%Y-%m-%d").to_string()
}
