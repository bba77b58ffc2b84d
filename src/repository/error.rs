// ==========================================
// 库存对账回填系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::importer::error::ImportError;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 文档错误 =====
    #[error("文档不存在: {0}")]
    NotFound(String),

    #[error("工作表不存在: {0}")]
    SheetNotFound(String),

    #[error("工作簿读取失败: {0}")]
    ReadError(String),

    #[error("工作簿写入失败: {0}")]
    WriteError(String),

    // ===== 包结构错误 =====
    #[error("仅支持写入 xlsx/xlsm 工作簿: {0}")]
    UnsupportedFormat(String),

    #[error("xlsx 包结构错误: {0}")]
    PackageError(String),
}

// 实现 From<ImportError>（读取复用导入层的网格读取）
impl From<ImportError> for RepositoryError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => RepositoryError::NotFound(path),
            ImportError::SheetNotFound(name) => RepositoryError::SheetNotFound(name),
            other => RepositoryError::ReadError(other.to_string()),
        }
    }
}

// 实现 From<zip::result::ZipError>
impl From<zip::result::ZipError> for RepositoryError {
    fn from(err: zip::result::ZipError) -> Self {
        RepositoryError::PackageError(err.to_string())
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::WriteError(err.to_string())
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
