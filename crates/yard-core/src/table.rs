//! 參數表
//!
//! 以組合鍵索引的型別化參數表。缺少的鍵一律回傳零值（`V::default()`），
//! 每個鍵只允許一筆值。

use crate::{Result, YardError};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// 以組合鍵索引的參數表
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTable<K: Ord, V> {
    /// 表名（用於錯誤訊息）
    name: String,
    entries: BTreeMap<K, V>,
}

impl<K, V> ParamTable<K, V>
where
    K: Ord + Copy + Debug,
    V: Copy + Default,
{
    /// 創建空的參數表
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// 插入一筆值；鍵已存在時回傳 `DuplicateRecord`
    pub fn insert_unique(&mut self, key: K, value: V) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Err(YardError::DuplicateRecord(format!(
                "{} {:?}",
                self.name, key
            )));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// 插入或覆寫
    pub fn set(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// 讀取值；缺少時回傳零值
    pub fn get(&self, key: K) -> V {
        self.entries.get(&key).copied().unwrap_or_default()
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    /// 依鍵排序迭代已明確設定的值
    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BlockIdx, SegIdx};
    use rust_decimal::Decimal;

    #[test]
    fn test_missing_key_defaults_to_zero() {
        let table: ParamTable<(SegIdx, BlockIdx), Decimal> = ParamTable::new("load_cost");
        assert_eq!(table.get((SegIdx(0), BlockIdx(1))), Decimal::ZERO);
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut table: ParamTable<SegIdx, u32> = ParamTable::new("initial");
        table.insert_unique(SegIdx(0), 5).unwrap();

        let err = table.insert_unique(SegIdx(0), 7).unwrap_err();
        assert!(matches!(err, YardError::DuplicateRecord(_)));
        assert_eq!(table.get(SegIdx(0)), 5);
    }

    #[test]
    fn test_iteration_is_ordered() {
        let mut table: ParamTable<(SegIdx, BlockIdx), u32> = ParamTable::new("t");
        table.set((SegIdx(1), BlockIdx(0)), 3);
        table.set((SegIdx(0), BlockIdx(2)), 1);
        table.set((SegIdx(0), BlockIdx(1)), 2);

        let keys: Vec<_> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                (SegIdx(0), BlockIdx(1)),
                (SegIdx(0), BlockIdx(2)),
                (SegIdx(1), BlockIdx(0)),
            ]
        );
    }
}
