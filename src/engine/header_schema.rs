// ==========================================
// 库存对账回填系统 - 计划表表头解析
// ==========================================
// 职责: 表头行 → 列语义映射（基础列 / 指标列 / 色号列）
//       指标列为空时引导建列
// 红线: 表头文本判断只在本模块出现,下游只依赖语义键
// ==========================================

use crate::domain::cell::CellValue;
use crate::domain::inventory::InventoryEntry;
use crate::domain::types::{BaseColumn, LabelKey, MetricBase, MetricLabel};
use crate::importer::text_normalizer::{clean_text, header_form, tonality_form};
use crate::repository::plan_workbook::Sheet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

// "<base> (<label>)": 标签取最后一组括号
static LABELED_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(([^()]*)\)\s*$").expect("静态正则"));

// 可选的 "متراژ" 前缀 + 色号标记词 + 色号
static TONALITY_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:متراژ\s*)?تنالیته\s*(.+)$").expect("静态正则"));

const TONALITY_MARKER: &str = "تنالیته";

static BASE_HEADERS: Lazy<HashMap<String, BaseColumn>> = Lazy::new(|| {
    [
        ("کد محصول", BaseColumn::Code),
        ("نام طرح", BaseColumn::Name),
        ("سایز محصول", BaseColumn::Size),
        ("عنوان برای محصول", BaseColumn::Size),
        ("مقدار تقسیم پالت", BaseColumn::PalletDivisor),
    ]
    .into_iter()
    .map(|(text, col)| (header_form(text), col))
    .collect()
});

static METRIC_BASE_HEADERS: Lazy<HashMap<String, MetricBase>> = Lazy::new(|| {
    [
        ("A/2", MetricBase::A2Meter),
        ("متراژ A/2", MetricBase::A2Meter),
        ("C/3", MetricBase::C3Meter),
        ("متراژ C/3", MetricBase::C3Meter),
        ("مجموع طرح", MetricBase::TotalMeter),
        ("مجموع متراژ طرح", MetricBase::TotalMeter),
        ("متراژ در هر تنالینه", MetricBase::PerTonalityAvg),
    ]
    .into_iter()
    .map(|(text, base)| (header_form(text), base))
    .collect()
});

static METRIC_LABELS: Lazy<HashMap<String, MetricLabel>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for label in MetricLabel::ALL {
        map.insert(header_form(label.display_label()), label);
        map.insert(header_form(label.as_str()), label);
    }
    map
});

// ==========================================
// HeaderKey - 单个表头的语义
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderKey {
    Base(BaseColumn),
    Metric(LabelKey, MetricBase),
    Tonality(MetricLabel, String),
}

/// 解析单个表头单元格;无法识别返回 None
pub fn classify_header(raw: &str) -> Option<HeaderKey> {
    let header_norm = header_form(raw);
    if header_norm.is_empty() {
        return None;
    }
    if let Some(col) = BASE_HEADERS.get(&header_norm) {
        return Some(HeaderKey::Base(*col));
    }

    let clean = clean_text(raw);
    if let Some(caps) = LABELED_HEADER_RE.captures(&clean) {
        let base_text = caps.get(1).map_or("", |m| m.as_str());
        let label_text = caps.get(2).map_or("", |m| m.as_str());

        let Some(label) = METRIC_LABELS.get(&header_form(label_text)).copied() else {
            return None;
        };
        if let Some(tonality) = TONALITY_PREFIX_RE.captures(base_text) {
            let key = tonality_form(tonality.get(1).map_or("", |m| m.as_str()));
            if key.is_empty() {
                return None;
            }
            return Some(HeaderKey::Tonality(label, key));
        }
        return METRIC_BASE_HEADERS
            .get(&header_form(base_text))
            .map(|base| HeaderKey::Metric(LabelKey::Metric(label), *base));
    }

    METRIC_BASE_HEADERS
        .get(&header_norm)
        .map(|base| HeaderKey::Metric(LabelKey::Default, *base))
}

// ==========================================
// ColumnSchema - 列语义映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    base: BTreeMap<BaseColumn, usize>,
    metrics: BTreeMap<LabelKey, BTreeMap<MetricBase, usize>>,
    tonalities: BTreeMap<MetricLabel, BTreeMap<String, usize>>,
}

impl ColumnSchema {
    /// 解析表头行（列号 0 起）;同一语义键以第一列为准
    pub fn parse(headers: &[CellValue]) -> Self {
        let mut schema = ColumnSchema::default();
        for (col, cell) in headers.iter().enumerate() {
            let Some(text) = cell.as_text() else {
                continue;
            };
            let Some(key) = classify_header(&text) else {
                continue;
            };
            if !schema.claim(key.clone(), col) {
                warn!(column = col + 1, header = %text, ?key, "表头语义重复,忽略该列");
            }
        }
        debug!(
            base = schema.base.len(),
            metric_labels = schema.metrics.len(),
            tonality_labels = schema.tonalities.len(),
            "表头解析完成"
        );
        schema
    }

    fn claim(&mut self, key: HeaderKey, col: usize) -> bool {
        match key {
            HeaderKey::Base(base) => claim_slot(&mut self.base, base, col),
            HeaderKey::Metric(label, base) => {
                claim_slot(self.metrics.entry(label).or_default(), base, col)
            }
            HeaderKey::Tonality(label, tonality) => {
                claim_slot(self.tonalities.entry(label).or_default(), tonality, col)
            }
        }
    }

    pub fn base_column(&self, col: BaseColumn) -> Option<usize> {
        self.base.get(&col).copied()
    }

    /// 表头缺失时退回计划行维护布局
    pub fn base_column_or_fallback(&self, col: BaseColumn) -> usize {
        self.base_column(col).unwrap_or(col.fallback_index())
    }

    pub fn has_metric_columns(&self) -> bool {
        self.metrics.values().any(|cols| !cols.is_empty())
    }

    pub fn metric_columns(&self) -> &BTreeMap<LabelKey, BTreeMap<MetricBase, usize>> {
        &self.metrics
    }

    pub fn tonality_columns(&self, label: MetricLabel) -> Option<&BTreeMap<String, usize>> {
        self.tonalities.get(&label)
    }
}

fn claim_slot<K: Ord>(slots: &mut BTreeMap<K, usize>, key: K, col: usize) -> bool {
    if slots.contains_key(&key) {
        return false;
    }
    slots.insert(key, col);
    true
}

// ==========================================
// 引导建列
// ==========================================

/// 本次加载中出现过的色号（去重、排序、非空）
pub fn collect_tonalities(entries: &[InventoryEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| !e.tonality.is_empty())
        .map(|e| e.tonality.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 引导建列的表头文本,按标签顺序 physical/sellable/reserved
pub fn bootstrap_headers(tonalities: &[String]) -> Vec<String> {
    let mut headers = Vec::new();
    for label in MetricLabel::ALL {
        let display = label.display_label();
        for base in MetricBase::BOOTSTRAP {
            if let Some(text) = base.bootstrap_header() {
                headers.push(format!("{} ({})", text, display));
            }
        }
        for tonality in tonalities {
            headers.push(format!("{} {} ({})", TONALITY_MARKER, tonality, display));
        }
    }
    headers
}

/// 解析表头;指标列为空时在末列之后追加引导列并重新解析
///
/// 返回 (列映射, 是否执行了引导)
pub fn resolve_schema(sheet: &mut Sheet, entries: &[InventoryEntry]) -> (ColumnSchema, bool) {
    let schema = ColumnSchema::parse(sheet.header_row());
    if schema.has_metric_columns() {
        return (schema, false);
    }

    let tonalities = collect_tonalities(entries);
    let start = sheet.column_count();
    let headers = bootstrap_headers(&tonalities);
    info!(
        start_column = start + 1,
        added = headers.len(),
        tonalities = tonalities.len(),
        "计划表无指标列,引导建列"
    );
    for (offset, text) in headers.into_iter().enumerate() {
        sheet.set_cell(0, start + offset, CellValue::Text(text));
    }
    (ColumnSchema::parse(sheet.header_row()), true)
}
