// ==========================================
// 库存对账回填系统 - 引擎层
// ==========================================
// 职责: 表头解析 → 匹配 → 汇总 → 格式化回填
// 红线: 匹配/汇总只依赖语义键,不直接判断表头文本
// ==========================================

pub mod aggregator;
pub mod error;
pub mod formatter;
pub mod header_schema;
pub mod matcher;
pub mod orchestrator;
pub mod writer;

// 重导出核心引擎
pub use aggregator::summarize;
pub use error::{EngineError, EngineResult};
pub use formatter::{format_decimal, format_meter_with_pallets};
pub use header_schema::{
    bootstrap_headers, classify_header, collect_tonalities, resolve_schema, ColumnSchema,
    HeaderKey,
};
pub use matcher::{MatchResult, Matcher, PlanCodeIndex};
pub use orchestrator::{ReconcileEngine, ReconcileJob};
pub use writer::write_summary;
