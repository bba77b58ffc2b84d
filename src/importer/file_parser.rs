// ==========================================
// 库存对账回填系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xlsm/.xls/.ods) / CSV (.csv) / 文档 (.pdf)
// 输出: 统一的原始表格（表头行 + 数据行）
// ==========================================

use crate::domain::cell::CellValue;
use crate::importer::document_parser::{fix_rtl_text, PdftotextExtractor, TableExtractor};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::excel_grid::read_sheet_grid;
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

/// 来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Spreadsheet,
    Csv,
    Document,
}

impl SourceKind {
    /// 按扩展名判断来源类型
    pub fn from_path(path: &Path) -> ImportResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "pdf" => Ok(SourceKind::Document),
            "csv" => Ok(SourceKind::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceKind::Spreadsheet),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }

    /// 表头未识别的字段是否按固定列位回退
    pub fn positional_fallback(&self) -> bool {
        !matches!(self, SourceKind::Document)
    }

    /// 是否需要修复视觉顺序文本
    pub fn repairs_rtl(&self) -> bool {
        matches!(self, SourceKind::Document)
    }
}

/// 原始表格
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSource {
    pub kind: SourceKind,
    pub tables: Vec<RawTable>,
}

// ==========================================
// FileParser Trait
// ==========================================
pub trait FileParser: Send + Sync {
    /// 解析文件为原始表格
    fn parse_tables(&self, file_path: &Path, sheet: Option<&str>) -> ImportResult<Vec<RawTable>>;
}

fn check_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_blank)
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_tables(&self, file_path: &Path, sheet: Option<&str>) -> ImportResult<Vec<RawTable>> {
        check_exists(file_path)?;

        let (_, grid) = read_sheet_grid(file_path, sheet)?;
        let mut rows = grid.into_iter();
        let headers = rows
            .next()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();

        Ok(vec![RawTable {
            headers,
            rows: rows.filter(|r| !is_blank_row(r)).collect(),
        }])
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_tables(&self, file_path: &Path, _sheet: Option<&str>) -> ImportResult<Vec<RawTable>> {
        check_exists(file_path)?;

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row: Vec<CellValue> = record
                .iter()
                .map(|v| {
                    let trimmed = v.trim();
                    if trimmed.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(trimmed.to_string())
                    }
                })
                .collect();
            if is_blank_row(&row) {
                continue;
            }
            rows.push(row);
        }

        Ok(vec![RawTable { headers, rows }])
    }
}

// ==========================================
// 文档 Parser 实现
// ==========================================
pub struct DocumentParser<E: TableExtractor> {
    extractor: E,
}

impl<E: TableExtractor> DocumentParser<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }
}

impl<E: TableExtractor> FileParser for DocumentParser<E> {
    fn parse_tables(&self, file_path: &Path, _sheet: Option<&str>) -> ImportResult<Vec<RawTable>> {
        check_exists(file_path)?;

        let tables = self
            .extractor
            .extract_tables(file_path)?
            .into_iter()
            .filter_map(|table| {
                let mut rows = table.into_iter();
                let header_row = rows.next()?;
                let headers = header_row.iter().map(|h| fix_rtl_text(h)).collect();
                let rows = rows
                    .map(|row| {
                        row.into_iter()
                            .map(|cell| {
                                if cell.trim().is_empty() {
                                    CellValue::Empty
                                } else {
                                    CellValue::Text(cell)
                                }
                            })
                            .collect::<Vec<_>>()
                    })
                    .filter(|r| !is_blank_row(r))
                    .collect();
                Some(RawTable { headers, rows })
            })
            .collect();

        Ok(tables)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser {
    document_parser: Box<dyn FileParser>,
}

impl UniversalFileParser {
    /// 使用 pdftotext 作为文档提取器
    pub fn new(pdftotext_bin: impl Into<String>) -> Self {
        Self::with_document_parser(Box::new(DocumentParser::new(PdftotextExtractor::new(
            pdftotext_bin,
        ))))
    }

    /// 注入自定义文档解析器
    pub fn with_document_parser(document_parser: Box<dyn FileParser>) -> Self {
        Self { document_parser }
    }

    pub fn parse<P: AsRef<Path>>(&self, file_path: P, sheet: Option<&str>) -> ImportResult<ParsedSource> {
        let path = file_path.as_ref();
        check_exists(path)?;
        let kind = SourceKind::from_path(path)?;
        let tables = match kind {
            SourceKind::Spreadsheet => ExcelParser.parse_tables(path, sheet)?,
            SourceKind::Csv => CsvParser.parse_tables(path, sheet)?,
            SourceKind::Document => self.document_parser.parse_tables(path, sheet)?,
        };
        Ok(ParsedSource { kind, tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    struct FixedExtractor(Vec<Vec<Vec<String>>>);

    impl TableExtractor for FixedExtractor {
        fn extract_tables(&self, _path: &Path) -> ImportResult<Vec<Vec<Vec<String>>>> {
            Ok(self.0.clone())
        }
    }

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_source_kind_from_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a.PDF")).unwrap(), SourceKind::Document);
        assert_eq!(SourceKind::from_path(Path::new("a.xlsx")).unwrap(), SourceKind::Spreadsheet);
        assert_eq!(SourceKind::from_path(Path::new("a.csv")).unwrap(), SourceKind::Csv);
        assert!(SourceKind::from_path(Path::new("a.txt")).is_err());
    }

    #[test]
    fn test_csv_parser_skip_empty_rows() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "نام کالا,درجه").unwrap();
        writeln!(temp_file, "Foo,A/2").unwrap();
        writeln!(temp_file, ",").unwrap(); // 空行
        writeln!(temp_file, "Bar,C/3").unwrap();

        let tables = CsvParser.parse_tables(temp_file.path(), None).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, strings(&["نام کالا", "درجه"]));
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1][0], CellValue::from("Bar"));
    }

    #[test]
    fn test_parser_file_not_found() {
        let parser = UniversalFileParser::new("pdftotext");
        let result = parser.parse("non_existent.xlsx", None);
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_document_parser_repairs_headers() {
        let extractor = FixedExtractor(vec![vec![
            strings(&["الاک مان", "هجرد"]),
            strings(&["Foo", "A/2"]),
            strings(&["", " "]),
        ]]);
        let temp_file = NamedTempFile::new().unwrap();
        let tables = DocumentParser::new(extractor)
            .parse_tables(temp_file.path(), None)
            .unwrap();
        assert_eq!(tables[0].headers, strings(&["نام کالا", "درجه"]));
        assert_eq!(tables[0].rows.len(), 1);
    }
}
