// ==========================================
// 库存对账回填系统 - 库存明细实体
// ==========================================
// 每条库存明细在加载阶段创建一次,之后只读
// ==========================================

use crate::domain::types::{Degree, MetricLabel};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 三种口径的库存数量（精确十进制）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricValues {
    pub sellable: Decimal,
    pub reserved: Decimal,
    pub physical: Decimal,
}

impl MetricValues {
    /// 构造;实物数量缺失时取 可售 + 预留
    pub fn new(sellable: Decimal, reserved: Decimal, physical: Option<Decimal>) -> Self {
        Self {
            sellable,
            reserved,
            physical: physical.unwrap_or(sellable + reserved),
        }
    }

    pub fn get(&self, label: MetricLabel) -> Decimal {
        match label {
            MetricLabel::Physical => self.physical,
            MetricLabel::Sellable => self.sellable,
            MetricLabel::Reserved => self.reserved,
        }
    }
}

/// 库存明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub metrics: MetricValues,
    /// 名称的查询形式（仅用于比较）
    pub name_norm: String,
    pub degree: Degree,
    /// 色号（大写规范化,可能为空）
    pub tonality: String,
    /// 从编码文本中提取的最后一段数字
    pub code_any: Option<u64>,
    /// 编码原始文本
    pub code_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_defaults_to_sellable_plus_reserved() {
        let values = MetricValues::new(Decimal::new(12, 0), Decimal::new(35, 1), None);
        assert_eq!(values.physical, Decimal::new(155, 1));
        assert_eq!(values.get(MetricLabel::Physical), Decimal::new(155, 1));
    }

    #[test]
    fn test_supplied_physical_is_kept() {
        let values = MetricValues::new(Decimal::ONE, Decimal::ONE, Some(Decimal::ZERO));
        assert_eq!(values.physical, Decimal::ZERO);
    }
}
