// ==========================================
// 库存对账回填系统 - 字段映射器实现
// ==========================================
// 职责: 库存表头 → 标准字段映射 + 明细构造
// 规则: 表头按固定词表识别;表格类来源未识别的字段按固定列位回退
// ==========================================

use crate::domain::cell::CellValue;
use crate::domain::inventory::{InventoryEntry, MetricValues};
use crate::domain::types::Degree;
use crate::importer::text_normalizer::{
    cell_decimal, clean_text, header_form, normalize_digits, query_form, tonality_form,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("静态正则"));

const DEGREE_KEYWORDS: [&str; 2] = ["گرید", "grade"];

/// 库存明细标准字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputField {
    Sellable,
    Reserved,
    Physical,
    Name,
    Degree,
    Tonality,
    Code,
}

impl InputField {
    /// 表头未识别时的固定列位（0 起）
    pub fn default_index(&self) -> usize {
        match self {
            InputField::Sellable => 0,
            InputField::Reserved => 1,
            InputField::Physical => 2,
            InputField::Name => 5,
            InputField::Degree => 6,
            InputField::Tonality => 7,
            InputField::Code => 9,
        }
    }
}

// 表头词表（含导出工具常见的错拼写法）
static INPUT_HEADERS: Lazy<HashMap<String, InputField>> = Lazy::new(|| {
    [
        ("موجودی قابل فروش", InputField::Sellable),
        ("موجودی رزرو", InputField::Reserved),
        ("موجودی فیزیکی", InputField::Physical),
        ("نام کالا", InputField::Name),
        ("نام کاال", InputField::Name),
        ("درجه", InputField::Degree),
        ("تنالیته", InputField::Tonality),
        ("کد کالا", InputField::Code),
        ("کد کاال", InputField::Code),
    ]
    .into_iter()
    .map(|(header, field)| (header_form(header), field))
    .collect()
});

/// 表头 → 列位映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputFieldMap {
    cols: HashMap<InputField, usize>,
}

impl InputFieldMap {
    /// 从表头行构建;同一字段出现多次时保留第一列
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut cols = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(field) = INPUT_HEADERS.get(&header_form(header.as_ref())) {
                cols.entry(*field).or_insert(idx);
            }
        }
        Self { cols }
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// 字段列位;positional_fallback 为真时未识别字段回退到固定列位
    pub fn column(&self, field: InputField, positional_fallback: bool) -> Option<usize> {
        match self.cols.get(&field) {
            Some(idx) => Some(*idx),
            None if positional_fallback => Some(field.default_index()),
            None => None,
        }
    }
}

/// 一行库存的原始字段值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInventoryFields {
    pub name: CellValue,
    pub code: CellValue,
    pub degree: CellValue,
    pub tonality: CellValue,
    pub sellable: CellValue,
    pub reserved: CellValue,
    pub physical: CellValue,
}

impl RawInventoryFields {
    /// 按映射从一行中取值,越界视为空
    pub fn from_row(row: &[CellValue], map: &InputFieldMap, positional_fallback: bool) -> Self {
        let value = |field: InputField| -> CellValue {
            map.column(field, positional_fallback)
                .and_then(|idx| row.get(idx))
                .cloned()
                .unwrap_or_default()
        };
        Self {
            name: value(InputField::Name),
            code: value(InputField::Code),
            degree: value(InputField::Degree),
            tonality: value(InputField::Tonality),
            sellable: value(InputField::Sellable),
            reserved: value(InputField::Reserved),
            physical: value(InputField::Physical),
        }
    }
}

/// 构造库存明细
pub fn build_entry(raw: &RawInventoryFields) -> InventoryEntry {
    let sellable = cell_decimal(&raw.sellable);
    let reserved = cell_decimal(&raw.reserved);
    let physical = if raw.physical.is_blank() {
        None
    } else {
        Some(cell_decimal(&raw.physical))
    };
    let code_text = raw.code.as_text().unwrap_or_default();

    InventoryEntry {
        metrics: MetricValues::new(sellable, reserved, physical),
        name_norm: query_form(&raw.name.to_string()),
        degree: normalize_degree(&raw.degree.to_string()),
        tonality: tonality_form(&raw.tonality.to_string()),
        code_any: extract_code_any(&code_text),
        code_text,
    }
}

/// 等级规范化
///
/// - "A/2" / "C/3" 原样
/// - 含等级关键词的自由文本: 关键词之后含 A → A/2,含 C → C/3
/// - 其余原样保留
pub fn normalize_degree(value: &str) -> Degree {
    let text = clean_text(value);
    match text.as_str() {
        "A/2" => return Degree::A2,
        "C/3" => return Degree::C3,
        _ => {}
    }
    let lower = text.to_lowercase();
    for keyword in DEGREE_KEYWORDS {
        if let Some(pos) = lower.find(keyword) {
            let rest = lower[pos + keyword.len()..].to_uppercase();
            if rest.contains('A') {
                return Degree::A2;
            }
            if rest.contains('C') {
                return Degree::C3;
            }
        }
    }
    Degree::Other(text)
}

/// 编码文本中的全部数字串（已归一为 ASCII）
pub fn digit_runs(code_text: &str) -> Vec<String> {
    let text = normalize_digits(code_text);
    DIGIT_RUN_RE
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// 取最后一段数字作为推测编码（溢出视为无）
pub fn extract_code_any(code_text: &str) -> Option<u64> {
    digit_runs(code_text).last().and_then(|run| run.parse::<u64>().ok())
}

/// 编码文本中是否存在与计划编码数值和位数都一致的数字串
pub fn code_matches(plan_code: u64, code_text: &str) -> bool {
    let plan_text = plan_code.to_string();
    digit_runs(code_text).iter().any(|run| *run == plan_text)
}
