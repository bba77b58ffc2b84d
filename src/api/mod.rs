// ==========================================
// 库存对账回填系统 - API 层
// ==========================================
// 职责: 对外调用契约（对账处理 + 计划行维护）
// 约束: 计划表读写统一经由文档库租约串行化
// ==========================================

pub mod error;
pub mod reconcile_api;

pub use error::{ApiError, ApiResult};
pub use reconcile_api::{
    parse_divisor, ProcessRequest, ReconcileApi, DEFAULT_INPUT, DEFAULT_OUTPUT, DEFAULT_PLAN,
};
