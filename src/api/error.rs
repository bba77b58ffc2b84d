// ==========================================
// 库存对账回填系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型,把引擎/仓储错误转换为调用方可处理的错误
// 说明: 计划行未匹配不是错误,只体现在运行报告中
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用参数错误（不发生任何 I/O）
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 文档错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("文档读写失败: {0}")]
    DocumentError(String),

    // ==========================================
    // 并发与超时
    // ==========================================
    /// 超时后后台任务可能仍在执行,文档最终状态未知
    #[error("处理超时（{millis}ms）,文档最终状态未知")]
    Timeout { millis: u128 },

    #[error("文档锁获取失败: {0}")]
    LockError(String),

    // ==========================================
    // 引擎
    // ==========================================
    #[error("对账处理失败: {0}")]
    Engine(EngineError),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(path) => ApiError::NotFound(format!("文档{}不存在", path)),
            RepositoryError::SheetNotFound(name) => {
                ApiError::NotFound(format!("工作表{}不存在", name))
            }
            err @ RepositoryError::UnsupportedFormat(_) => ApiError::InvalidInput(err.to_string()),
            RepositoryError::ReadError(msg)
            | RepositoryError::WriteError(msg)
            | RepositoryError::PackageError(msg) => ApiError::DocumentError(msg),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Repository(inner) => ApiError::from(inner),
            err @ EngineError::LeaseMismatch(_) => ApiError::LockError(err.to_string()),
            err if err.is_not_found() => ApiError::NotFound(err.to_string()),
            err => ApiError::Engine(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
