//! 區塊排他關係
//!
//! 同一台吊機在一個班次內不能同時服務兩個互相排他的區塊。
//! 關係是對稱的；區塊與自身永遠相容。

use crate::index::BlockIdx;
use crate::{Result, YardError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 以區塊ID描述的排他設定（可序列化，來自資料來源）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "pairs")]
pub enum ExclusivitySpec {
    /// 列出的區塊對互相排他，其餘相容
    Excluding(Vec<(String, String)>),
    /// 只有列出的區塊對相容，其餘全部排他
    OnlyCompatible(Vec<(String, String)>),
}

impl Default for ExclusivitySpec {
    fn default() -> Self {
        ExclusivitySpec::Excluding(Vec::new())
    }
}

impl ExclusivitySpec {
    /// 碼頭現行佈局（b1..b9）的相容區塊對
    pub fn terminal_layout() -> Self {
        let pairs = [
            ("b1", "b3"),
            ("b2", "b4"),
            ("b6", "b3"),
            ("b7", "b4"),
            ("b5", "b8"),
        ];
        ExclusivitySpec::OnlyCompatible(
            pairs
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        )
    }

    /// 依區塊ID解析為索引關係；未知的區塊ID為錯誤
    pub fn resolve(&self, block_ids: &[String]) -> Result<ExclusivityRelation> {
        let lookup = |id: &str| -> Result<BlockIdx> {
            block_ids
                .iter()
                .position(|b| b == id)
                .map(BlockIdx)
                .ok_or_else(|| YardError::UnknownId {
                    kind: "區塊",
                    id: id.to_string(),
                })
        };

        let mut resolved = Vec::new();
        let pairs = match self {
            ExclusivitySpec::Excluding(p) | ExclusivitySpec::OnlyCompatible(p) => p,
        };
        for (a, b) in pairs {
            resolved.push((lookup(a)?, lookup(b)?));
        }

        Ok(match self {
            ExclusivitySpec::Excluding(_) => ExclusivityRelation::excluding(resolved),
            ExclusivitySpec::OnlyCompatible(_) => {
                ExclusivityRelation::only_compatible(block_ids.len(), resolved)
            }
        })
    }
}

/// 以區塊索引表示的排他關係
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusivityRelation {
    /// 排他的區塊對，正規化為 (小, 大)
    excluded: BTreeSet<(BlockIdx, BlockIdx)>,
}

impl ExclusivityRelation {
    /// 沒有任何排他
    pub fn none() -> Self {
        Self::default()
    }

    /// 列出的區塊對互相排他
    pub fn excluding(pairs: impl IntoIterator<Item = (BlockIdx, BlockIdx)>) -> Self {
        let excluded = pairs
            .into_iter()
            .filter(|(a, b)| a != b)
            .map(|(a, b)| normalize(a, b))
            .collect();
        Self { excluded }
    }

    /// 只有列出的區塊對相容；`block_count` 個區塊中其餘的區塊對全部排他
    pub fn only_compatible(
        block_count: usize,
        pairs: impl IntoIterator<Item = (BlockIdx, BlockIdx)>,
    ) -> Self {
        let compatible: BTreeSet<_> = pairs.into_iter().map(|(a, b)| normalize(a, b)).collect();
        let mut excluded = BTreeSet::new();
        for i in 0..block_count {
            for j in (i + 1)..block_count {
                let pair = (BlockIdx(i), BlockIdx(j));
                if !compatible.contains(&pair) {
                    excluded.insert(pair);
                }
            }
        }
        Self { excluded }
    }

    pub fn is_excluded(&self, a: BlockIdx, b: BlockIdx) -> bool {
        a != b && self.excluded.contains(&normalize(a, b))
    }

    /// 同一吊機可同時佔用兩區塊的上限：排他為 1，否則為 2
    pub fn allowance(&self, a: BlockIdx, b: BlockIdx) -> u32 {
        if self.is_excluded(a, b) {
            1
        } else {
            2
        }
    }

    /// 排他的區塊對（小索引在前，依序）
    pub fn excluded_pairs(&self) -> impl Iterator<Item = (BlockIdx, BlockIdx)> + '_ {
        self.excluded.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}

fn normalize(a: BlockIdx, b: BlockIdx) -> (BlockIdx, BlockIdx) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
