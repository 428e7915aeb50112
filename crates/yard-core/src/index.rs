//! 索引類型
//!
//! 模型內部一律使用稠密索引；字串識別碼只在載入與輸出時出現。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 分隔群組（segregation）索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegIdx(pub usize);

/// 堆場區塊索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockIdx(pub usize);

/// 吊機索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CraneIdx(pub usize);

/// 時段（從 1 開始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period(pub u32);

impl Period {
    /// 第一個時段
    pub const FIRST: Period = Period(1);

    /// 前一個時段；第一個時段沒有前一個
    pub fn previous(self) -> Option<Period> {
        if self.0 > 1 {
            Some(Period(self.0 - 1))
        } else {
            None
        }
    }

    /// 0 起算的位置
    pub fn offset(self) -> usize {
        (self.0 - 1) as usize
    }

    /// 迭代 1..=count
    pub fn range(count: u32) -> impl Iterator<Item = Period> + Clone {
        (1..=count).map(Period)
    }
}

impl fmt::Display for SegIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for BlockIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl fmt::Display for CraneIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_navigation() {
        assert_eq!(Period::FIRST.previous(), None);
        assert_eq!(Period(3).previous(), Some(Period(2)));
        assert_eq!(Period(3).offset(), 2);

        let all: Vec<_> = Period::range(3).collect();
        assert_eq!(all, vec![Period(1), Period(2), Period(3)]);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(SegIdx(0).to_string(), "s0");
        assert_eq!(BlockIdx(2).to_string(), "b2");
        assert_eq!(Period(4).to_string(), "t4");
    }
}
