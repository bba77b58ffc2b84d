// ==========================================
// 库存对账回填系统 - 文档表格解析
// ==========================================
// 职责: 从文本型文档（PDF）中提取页面表格
// 默认提取器: pdftotext -layout,按换页符分页,
//             连续的多列行（列间距 ≥2 空格）视为一个表格
// 修复: 提取工具按视觉顺序输出从右到左文本时,
//       反转词序并反转阿拉伯字母词内字符
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::text_normalizer::{clean_text, contains_arabic};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::Command;
use tracing::debug;

static COLUMN_GAP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("静态正则"));

/// 单个表格: 行 → 单元格文本
pub type TextTable = Vec<Vec<String>>;

/// 文档表格提取接口
pub trait TableExtractor: Send + Sync {
    /// 提取文档中所有页面的表格（按页面顺序）
    fn extract_tables(&self, path: &Path) -> ImportResult<Vec<TextTable>>;
}

// ==========================================
// pdftotext 提取器
// ==========================================
pub struct PdftotextExtractor {
    bin: String,
}

impl PdftotextExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn run(&self, path: &Path) -> ImportResult<String> {
        let bin = which::which(&self.bin).map_err(|_| {
            ImportError::DocumentExtractError(format!("未找到 {}（需安装 poppler-utils）", self.bin))
        })?;

        let output = Command::new(bin)
            .arg("-layout")
            .arg(path)
            .arg("-")
            .output()
            .map_err(|e| ImportError::DocumentExtractError(format!("启动 pdftotext 失败: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ImportError::DocumentExtractError(format!(
                "pdftotext 退出码 {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl TableExtractor for PdftotextExtractor {
    fn extract_tables(&self, path: &Path) -> ImportResult<Vec<TextTable>> {
        let text = self.run(path)?;
        let tables = split_layout_tables(&text);
        debug!(tables = tables.len(), "文档表格提取完成");
        Ok(tables)
    }
}

/// 将版式文本切分为表格
///
/// 每页独立处理;表格由连续的、可切分出至少两列的行组成,
/// 空行或单列行结束当前表格
pub fn split_layout_tables(text: &str) -> Vec<TextTable> {
    let mut tables = Vec::new();
    for page in text.split('\u{000C}') {
        let mut current: TextTable = Vec::new();
        for line in page.lines() {
            let cells: Vec<String> = COLUMN_GAP_RE
                .split(line.trim())
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if cells.len() >= 2 {
                current.push(cells);
            } else if !current.is_empty() {
                tables.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            tables.push(current);
        }
    }
    tables
}

/// 修复视觉顺序输出的从右到左文本
///
/// 超过一半的词含阿拉伯字母时: 反转词序,并反转这些词内部的字符顺序;
/// 否则原样返回
pub fn fix_rtl_text(value: &str) -> String {
    let text = clean_text(value);
    let tokens: Vec<&str> = text.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.is_empty() {
        return text;
    }
    let arabic_tokens = tokens.iter().filter(|t| contains_arabic(t)).count();
    if arabic_tokens * 2 <= tokens.len() {
        return text;
    }
    tokens
        .iter()
        .rev()
        .map(|token| {
            if contains_arabic(token) {
                token.chars().rev().collect::<String>()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_rtl_text_reverses_visual_order() {
        // "الاک مان" 为 "نام کالا" 的视觉顺序输出
        assert_eq!(fix_rtl_text("الاک مان"), "نام کالا");
    }

    #[test]
    fn test_fix_rtl_text_keeps_latin_tokens() {
        assert_eq!(fix_rtl_text("T1 دیرگ"), "T1 دیرگ");
        assert_eq!(fix_rtl_text("100 طرح دیرگ"), "گرید حرط 100");
    }

    #[test]
    fn test_fix_rtl_text_passes_latin_lines() {
        assert_eq!(fix_rtl_text("Foo Bar 12"), "Foo Bar 12");
        assert_eq!(fix_rtl_text(""), "");
    }

    #[test]
    fn test_split_layout_tables() {
        let text = "Report title\n\
                    code    name     qty\n\
                    100     Foo      12\n\
                    \n\
                    footer\n\
                    \u{000C}a   b\n\
                    1   2\n";
        let tables = split_layout_tables(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].len(), 2);
        assert_eq!(tables[0][0], vec!["code", "name", "qty"]);
        assert_eq!(tables[0][1], vec!["100", "Foo", "12"]);
        assert_eq!(tables[1], vec![vec!["a", "b"], vec!["1", "2"]]);
    }
}
