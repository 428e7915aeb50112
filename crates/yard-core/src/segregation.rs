//! 分隔群組（segregation）模型

use serde::{Deserialize, Serialize};

/// 作業方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// 出口：收櫃（receive）進場，裝船（load）出場
    Export,
    /// 進口：卸船（discharge）進場，提櫃（deliver）出場
    Import,
}

impl Direction {
    /// 從分隔群組標籤推斷方向（標籤含 "expo" 或 "impo"）
    pub fn infer_from_label(label: &str) -> Option<Self> {
        let lower = label.to_lowercase();
        match (lower.contains("expo"), lower.contains("impo")) {
            (true, false) => Some(Direction::Export),
            (false, true) => Some(Direction::Import),
            _ => None,
        }
    }
}

/// 貨櫃尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerSize {
    /// 20 呎
    Twenty,
    /// 40 呎
    Forty,
}

impl ContainerSize {
    /// 每個貨櫃的 TEU 數
    pub fn teu(self) -> u32 {
        match self {
            ContainerSize::Twenty => 1,
            ContainerSize::Forty => 2,
        }
    }

    /// 從標籤第三段解析尺寸，例如 `expo-dry-20-...`
    pub fn infer_from_label(label: &str) -> Option<Self> {
        match label.split('-').nth(2)?.trim().parse::<u32>().ok()? {
            20 => Some(ContainerSize::Twenty),
            40 => Some(ContainerSize::Forty),
            _ => None,
        }
    }
}

/// 分隔群組
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segregation {
    /// 分隔群組ID（小寫正規化）
    pub id: String,

    /// 原始標籤
    pub label: String,

    /// 作業方向；出口與進口互斥
    pub direction: Direction,

    /// 每個槽位佔用的 TEU 數
    pub teu: u32,

    /// 正面吊作業倍率（R_s）
    pub reach_factor: u32,

    /// 一週內至少使用的區塊數（KI_s）
    pub min_blocks: u32,

    /// 一週內最多使用的區塊數（KS_s）
    pub max_blocks: u32,
}

impl Segregation {
    /// 創建新的分隔群組
    pub fn new(id: String, direction: Direction) -> Self {
        Self {
            label: id.clone(),
            id: id.to_lowercase(),
            direction,
            teu: 1,
            reach_factor: 1,
            min_blocks: 1,
            max_blocks: 1,
        }
    }

    /// 建構器模式：設置標籤
    pub fn with_label(mut self, label: String) -> Self {
        self.label = label;
        self
    }

    /// 建構器模式：設置 TEU
    pub fn with_teu(mut self, teu: u32) -> Self {
        self.teu = teu;
        self
    }

    /// 建構器模式：設置正面吊倍率
    pub fn with_reach_factor(mut self, factor: u32) -> Self {
        self.reach_factor = factor;
        self
    }

    /// 建構器模式：設置區塊數上下限
    pub fn with_block_spread(mut self, min_blocks: u32, max_blocks: u32) -> Self {
        self.min_blocks = min_blocks;
        self.max_blocks = max_blocks;
        self
    }

    pub fn is_export(&self) -> bool {
        self.direction == Direction::Export
    }

    pub fn is_import(&self) -> bool {
        self.direction == Direction::Import
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("expo-dry-20-asia", Some(Direction::Export))]
    #[case("IMPO-reefer-40", Some(Direction::Import))]
    #[case("transbordo-20", None)]
    #[case("expo-impo-20", None)]
    fn test_infer_direction(#[case] label: &str, #[case] expected: Option<Direction>) {
        assert_eq!(Direction::infer_from_label(label), expected);
    }

    #[rstest]
    #[case("expo-dry-20-asia", Some(ContainerSize::Twenty))]
    #[case("impo-reefer-40", Some(ContainerSize::Forty))]
    #[case("impo-reefer-45", None)]
    #[case("impo", None)]
    fn test_infer_size(#[case] label: &str, #[case] expected: Option<ContainerSize>) {
        assert_eq!(ContainerSize::infer_from_label(label), expected);
    }

    #[test]
    fn test_segregation_builder() {
        let seg = Segregation::new("EXPO-DRY-40".to_string(), Direction::Export)
            .with_teu(2)
            .with_reach_factor(3)
            .with_block_spread(1, 4);

        assert_eq!(seg.id, "expo-dry-40");
        assert_eq!(seg.label, "EXPO-DRY-40");
        assert_eq!(seg.teu, 2);
        assert_eq!((seg.min_blocks, seg.max_blocks), (1, 4));
        assert!(seg.is_export());
        assert!(!seg.is_import());
    }
}
