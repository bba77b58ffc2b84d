// ==========================================
// 库存对账回填系统 - 导入层
// ==========================================
// 职责: 库存明细文件 → 统一的库存明细序列
// 支持: Excel, CSV, 文本型文档（PDF 表格）
// ==========================================

// 模块声明
pub mod document_parser;
pub mod error;
pub mod excel_grid;
pub mod field_mapper;
pub mod file_parser;
pub mod inventory_loader;
pub mod text_normalizer;

// 重导出核心类型
pub use document_parser::{PdftotextExtractor, TableExtractor, TextTable};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{InputField, InputFieldMap, RawInventoryFields};
pub use file_parser::{
    CsvParser, DocumentParser, ExcelParser, FileParser, ParsedSource, RawTable, SourceKind,
    UniversalFileParser,
};
pub use inventory_loader::InventoryLoader;
