// ==========================================
// 库存对账回填系统 - 数据仓储层
// ==========================================
// 职责: 计划表工作簿读写、文档锁、计划行维护
// 存储: 计划表工作簿本身是唯一的持久化状态
// ==========================================

pub mod document_lock;
pub mod error;
pub mod plan_rows;
pub mod plan_workbook;
pub mod xlsx_patch;

// 重导出核心类型
pub use document_lock::{DocumentLease, PlanDocumentStore};
pub use error::{RepositoryError, RepositoryResult};
pub use plan_rows::PlanRowRepository;
pub use plan_workbook::{is_writable_workbook, PlanWorkbook, Sheet};
pub use xlsx_patch::SheetEdits;
