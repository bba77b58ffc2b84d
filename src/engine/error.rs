// ==========================================
// 库存对账回填系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 未匹配的计划行不是错误,只进入运行报告
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("文档不存在: {0}")]
    NotFound(String),

    #[error("租约不属于文档库{0}")]
    LeaseMismatch(String),

    #[error("库存明细加载失败: {0}")]
    Import(#[from] ImportError),

    #[error("计划表读写失败: {0}")]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    /// 是否为文档缺失类错误（含导入/仓储层的缺失）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_)
                | EngineError::Import(ImportError::FileNotFound(_))
                | EngineError::Import(ImportError::SheetNotFound(_))
                | EngineError::Repository(RepositoryError::NotFound(_))
                | EngineError::Repository(RepositoryError::SheetNotFound(_))
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
