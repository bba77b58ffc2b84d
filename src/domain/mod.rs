// ==========================================
// 库存对账回填系统 - 领域模型层
// ==========================================
// 职责: 定义库存明细、计划行、列语义键、汇总结果
// 红线: 不含文件读写逻辑,不含匹配/汇总逻辑
// ==========================================

pub mod cell;
pub mod inventory;
pub mod plan;
pub mod report;
pub mod types;

// 重导出核心类型
pub use cell::CellValue;
pub use inventory::{InventoryEntry, MetricValues};
pub use plan::{MetricSummary, PlanRow, PlanRowRecord, PlanRowValues, RowDetail};
pub use report::{ReconcileReport, UnmatchedRow};
pub use types::{
    BaseColumn, Degree, LabelKey, MatchOutcome, MetricBase, MetricLabel, UnsupportedMetric,
};
