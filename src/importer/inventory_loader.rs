// ==========================================
// 库存对账回填系统 - 库存明细加载器
// ==========================================
// 流程: 解析文件 → 表头映射 → 逐行构造库存明细
// 表格类来源: 未识别字段按固定列位回退
// 文档来源: 表头未识别任何字段的表格整体跳过,名称做从右到左修复
// ==========================================

use crate::domain::cell::CellValue;
use crate::domain::inventory::InventoryEntry;
use crate::importer::document_parser::fix_rtl_text;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::{build_entry, InputFieldMap, RawInventoryFields};
use crate::importer::file_parser::UniversalFileParser;
use std::path::Path;
use tracing::{debug, info, instrument};

pub struct InventoryLoader {
    parser: UniversalFileParser,
}

impl InventoryLoader {
    pub fn new(parser: UniversalFileParser) -> Self {
        Self { parser }
    }

    /// 加载库存明细
    ///
    /// # 参数
    /// - file_path: 库存文件路径（表格或文档）
    /// - sheet: 工作表名称（仅表格类来源使用,缺省为第一个工作表）
    #[instrument(skip(self, file_path), fields(file = %file_path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(
        &self,
        file_path: P,
        sheet: Option<&str>,
    ) -> ImportResult<Vec<InventoryEntry>> {
        let parsed = self.parser.parse(file_path.as_ref(), sheet)?;
        let fallback = parsed.kind.positional_fallback();

        let mut entries = Vec::new();
        for (table_idx, table) in parsed.tables.iter().enumerate() {
            let map = InputFieldMap::from_headers(&table.headers);
            if map.is_empty() && !fallback {
                debug!(table = table_idx, "表头未识别,跳过表格");
                continue;
            }
            for row in &table.rows {
                let mut raw = RawInventoryFields::from_row(row, &map, fallback);
                if parsed.kind.repairs_rtl() {
                    raw.name = match raw.name.as_text() {
                        Some(text) => CellValue::Text(fix_rtl_text(&text)),
                        None => CellValue::Empty,
                    };
                }
                entries.push(build_entry(&raw));
            }
        }

        info!(kind = ?parsed.kind, entries = entries.len(), "库存明细加载完成");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Degree;
    use crate::importer::document_parser::TableExtractor;
    use crate::importer::file_parser::DocumentParser;
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::Builder;

    struct FixedExtractor(Vec<Vec<Vec<String>>>);

    impl TableExtractor for FixedExtractor {
        fn extract_tables(&self, _path: &Path) -> ImportResult<Vec<Vec<Vec<String>>>> {
            Ok(self.0.clone())
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_load_csv_with_headers() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "کد کالا,نام کالا,درجه,تنالیته,موجودی قابل فروش,موجودی رزرو,موجودی فیزیکی").unwrap();
        writeln!(file, "X-100,Foo Tile,A/2,t1,12,3,").unwrap();
        writeln!(file, ",Bar Tile,گرید C,T2,1٫5,,").unwrap();

        let loader = InventoryLoader::new(UniversalFileParser::new("pdftotext"));
        let entries = loader.load(file.path(), None).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name_norm, "foo tile");
        assert_eq!(entries[0].code_any, Some(100));
        assert_eq!(entries[0].metrics.physical, Decimal::new(15, 0));
        assert_eq!(entries[1].degree, Degree::C3);
        assert_eq!(entries[1].code_text, "");
        assert_eq!(entries[1].metrics.sellable, Decimal::new(15, 1));
        assert_eq!(entries[1].metrics.physical, Decimal::new(15, 1));
    }

    #[test]
    fn test_load_csv_positional_fallback() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "a,b,c,d,e,f,g,h,i,j").unwrap();
        writeln!(file, "5,1,,x,x,Foo,A/2,T1,x,100").unwrap();

        let loader = InventoryLoader::new(UniversalFileParser::new("pdftotext"));
        let entries = loader.load(file.path(), None).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name_norm, "foo");
        assert_eq!(entries[0].degree, Degree::A2);
        assert_eq!(entries[0].tonality, "T1");
        assert_eq!(entries[0].code_any, Some(100));
        assert_eq!(entries[0].metrics.physical, Decimal::new(6, 0));
    }

    #[test]
    fn test_load_document_skips_unrecognized_tables() {
        let extractor = FixedExtractor(vec![
            vec![row(&["x", "y"]), row(&["1", "2"])],
            vec![
                row(&["الاک مان", "هجرد", "یکیزیف یدوجوم"]),
                row(&["حرط ولیف", "A/2", "۲۰"]),
            ],
        ]);
        let parser = UniversalFileParser::with_document_parser(Box::new(DocumentParser::new(extractor)));
        let file = Builder::new().suffix(".pdf").tempfile().unwrap();

        let entries = InventoryLoader::new(parser).load(file.path(), None).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name_norm, "فیلو طرح");
        assert_eq!(entries[0].metrics.physical, Decimal::new(20, 0));
        assert_eq!(entries[0].metrics.sellable, Decimal::ZERO);
    }
}
