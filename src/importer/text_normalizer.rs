// ==========================================
// 库存对账回填系统 - 文本规范化
// ==========================================
// 职责: 空白折叠 / 字形统一 / 数字归一 / 宽松数值解析
// 两种输出形式:
// - clean: 展示用,保留大小写与原始数字
// - query: 仅用于比较（ASCII 数字 + 小写）
// ==========================================

use crate::domain::cell::CellValue;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

// 零宽字符与方向标记统一视为分隔符
const SEPARATOR_CHARS: [char; 5] = ['\u{200C}', '\u{200D}', '\u{200E}', '\u{200F}', '\u{FEFF}'];

static PALLET_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\(([^)]+)\)\s*([0-9.,]+)\s*$").expect("静态正则"));

/// 统一两种字形变体（阿拉伯 ي/ى → ی,ك → ک）
fn unify_letterform(c: char) -> char {
    match c {
        '\u{064A}' | '\u{0649}' => '\u{06CC}',
        '\u{0643}' => '\u{06A9}',
        other => other,
    }
}

/// 波斯数字与阿拉伯-印度数字转为 ASCII
fn ascii_digit(c: char) -> char {
    match c {
        '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
        '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
        other => other,
    }
}

/// 展示形式: 折叠空白、统一字形、去首尾空白
pub fn clean_text(value: &str) -> String {
    let mapped: String = value
        .chars()
        .map(|c| {
            if SEPARATOR_CHARS.contains(&c) {
                ' '
            } else {
                unify_letterform(c)
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_digits(value: &str) -> String {
    value.chars().map(ascii_digit).collect()
}

/// 查询形式（比较专用）
pub fn query_form(value: &str) -> String {
    normalize_digits(&clean_text(value)).to_lowercase()
}

/// 表头形式,与查询形式一致
pub fn header_form(value: &str) -> String {
    query_form(value)
}

/// 色号形式: 大写
pub fn tonality_form(value: &str) -> String {
    normalize_digits(&clean_text(value)).to_uppercase()
}

/// 宽松数值解析,非法文本按 0 处理
pub fn parse_decimal(value: &str) -> Decimal {
    try_parse_decimal(value).unwrap_or(Decimal::ZERO)
}

/// 严格数值解析,非法文本返回 None
pub fn try_parse_decimal(value: &str) -> Option<Decimal> {
    let text: String = normalize_digits(value)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{066C}')
        .map(|c| match c {
            '\u{066B}' | ',' => '.',
            other => other,
        })
        .collect();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(&text).ok()
}

/// 单元格数值,非法或空值按 0 处理
pub fn cell_decimal(value: &CellValue) -> Decimal {
    match value {
        CellValue::Int(i) => Decimal::from(*i),
        CellValue::Number(n) => parse_decimal(&n.to_string()),
        CellValue::Text(s) => parse_decimal(s),
        CellValue::Empty | CellValue::Bool(_) => Decimal::ZERO,
    }
}

/// 编码单元格解析为非负整数
/// 文本只接受整数字面量（数字归一后）,"1,000"、"100.0" 等不是编码
pub fn cell_code(value: &CellValue) -> Option<u64> {
    match value {
        CellValue::Text(s) => normalize_digits(&clean_text(s)).parse::<u64>().ok(),
        other => other.as_integer().and_then(|i| u64::try_from(i).ok()),
    }
}

/// 编码/系数的展示形式: 整数值去掉小数部分,非数值原样保留
pub fn normalize_code_value(value: &CellValue) -> String {
    let text = match value {
        CellValue::Empty => return String::new(),
        CellValue::Int(i) => return i.to_string(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Text(s) => normalize_digits(&clean_text(s)),
        CellValue::Bool(_) => return query_form(&value.to_string()),
    };
    match Decimal::from_str(&text) {
        Ok(dec) => dec.normalize().to_string(),
        Err(_) => text,
    }
}

/// 拆分 "(托盘数) 数量" 形式的单元格文本
pub fn split_meter_pallet(value: &str) -> (Option<String>, Option<String>) {
    let text = value.trim();
    if text.is_empty() {
        return (None, None);
    }
    match PALLET_VALUE_RE.captures(text) {
        Some(caps) => (
            Some(caps[2].trim().to_string()),
            Some(caps[1].trim().to_string()),
        ),
        None => (Some(text.to_string()), None),
    }
}

/// 是否包含阿拉伯字母区段字符
pub fn contains_arabic(value: &str) -> bool {
    value.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c))
}
