// ==========================================
// 库存对账回填系统 - 核心库
// ==========================================
// 职责: 库存明细（表格/文档）与计划表对账,回填汇总列
// 技术栈: calamine + zip/quick-xml + rust_decimal + tokio
// 系统定位: 拒绝猜测的对账工具（证据冲突时不回填）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 导入层 - 库存明细加载
pub mod importer;

// 数据仓储层 - 计划表读写
pub mod repository;

// 引擎层 - 表头解析/匹配/汇总/回填
pub mod engine;

// 配置层 - 运行配置
pub mod config;

// 日志系统
pub mod logging;

// API 层 - 调用契约
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Degree, LabelKey, MatchOutcome, MetricBase, MetricLabel};

// 领域实体
pub use domain::{InventoryEntry, MetricSummary, PlanRow, ReconcileReport, UnmatchedRow};

// 引擎
pub use engine::{ColumnSchema, Matcher, ReconcileEngine, ReconcileJob};

// 仓储
pub use repository::{PlanDocumentStore, PlanWorkbook};

// 配置
pub use config::ReconcileConfig;

// API
pub use api::{ApiError, ApiResult, ProcessRequest, ReconcileApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "库存对账回填系统";
