// ==========================================
// 库存对账回填系统 - 计划行实体
// ==========================================
// PlanRow: 对账用的计划行（身份字段只读）
// MetricSummary: 单行单口径的临时汇总结果
// PlanRowRecord: 计划行维护用的展示记录
// ==========================================

use crate::domain::cell::CellValue;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 计划表数据行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    /// 工作表行号（1 起,表头为第 1 行）
    pub row: usize,
    pub name: String,
    pub code: Option<u64>,
    /// 托盘折算系数（缺失或非法时为 0）
    pub divisor: Decimal,
}

/// 单个计划行在某一口径下的汇总
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub a2_meter: Decimal,
    pub c3_meter: Decimal,
    pub total_meter: Decimal,
    pub per_tonality_avg: Decimal,
    pub per_tonality_map: BTreeMap<String, Decimal>,
    /// 平均值是否有意义（至少一个色号数量为正）
    pub has_pallets: bool,
}

/// 计划行维护记录（原始值 + 展示值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRowRecord {
    pub row: usize,
    pub code_raw: CellValue,
    pub name_raw: CellValue,
    pub size_raw: CellValue,
    pub divisor_raw: CellValue,
    pub code_display: String,
    pub name_display: String,
    pub size_display: String,
    pub divisor_display: String,
}

impl PlanRowRecord {
    /// 列表/按钮使用的标签: "名称 (编码)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.name_display, self.code_display)
    }
}

/// 新增/修改计划行时提交的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRowValues {
    pub code: String,
    pub name: String,
    pub size: String,
    pub divisor: Decimal,
}

/// 输出表中某一列的明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDetail {
    pub header: String,
    pub value: String,
    /// 拆分后的数量部分
    pub meter: Option<String>,
    /// 拆分后的托盘数部分
    pub pallets: Option<String>,
}
